// ABOUTME: Runs stage commands as host processes inside the shared workspace.
// ABOUTME: A command's whole process group is killed when the exec future is dropped.

use super::error::{ExecError, ProvisionError, UnavailableSnafu, UnknownEnvironmentSnafu};
use super::output::{OutputBuffer, OutputStream};
use super::traits::{ExecutionHandle, Invocation, Provisioner};
use crate::config::LocalEnvironment;
use crate::types::{EnvironmentName, HandleId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

const LOCAL_SHELL: &str = "sh";

/// Provisioner for `provider: local` environments.
pub struct LocalProvisioner {
    workspace: PathBuf,
    environments: BTreeMap<EnvironmentName, LocalEnvironment>,
    next_handle: AtomicU64,
}

impl LocalProvisioner {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            environments: BTreeMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn with_environment(mut self, name: EnvironmentName, env: LocalEnvironment) -> Self {
        self.environments.insert(name, env);
        self
    }

    fn environment(&self, name: &EnvironmentName) -> Result<&LocalEnvironment, ProvisionError> {
        self.environments.get(name).ok_or_else(|| {
            UnknownEnvironmentSnafu {
                environment: name.as_str(),
            }
            .build()
        })
    }

    fn workdir(&self, env: &LocalEnvironment) -> PathBuf {
        match &env.workdir {
            Some(dir) => self.workspace.join(dir),
            None => self.workspace.clone(),
        }
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    async fn acquire(
        &self,
        environment: &EnvironmentName,
    ) -> Result<ExecutionHandle, ProvisionError> {
        let env = self.environment(environment)?;
        let workdir = self.workdir(env);

        tokio::fs::create_dir_all(&workdir).await.map_err(|e| {
            UnavailableSnafu {
                environment: environment.as_str(),
                reason: format!("cannot create {}: {}", workdir.display(), e),
            }
            .build()
        })?;

        let seq = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let id = HandleId::new(format!("local-{}-{}", environment, seq));
        tracing::debug!(handle = %id, workdir = %workdir.display(), "acquired local environment");
        Ok(ExecutionHandle::new(id, environment.clone()))
    }

    async fn exec(
        &self,
        handle: &ExecutionHandle,
        invocation: &Invocation,
        output: &OutputBuffer,
    ) -> Result<i32, ExecError> {
        let env = self
            .environment(handle.environment())
            .map_err(|e| ExecError::Failed(e.to_string()))?;
        let argv = invocation.argv(LOCAL_SHELL);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ExecError::Spawn("empty command".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(self.workdir(env))
            .envs(&env.env)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {}", program, e)))?;
        let mut group = ProcessGroup::new(child.id());

        tokio::join!(
            pump(child.stdout.take(), OutputStream::Stdout, output),
            pump(child.stderr.take(), OutputStream::Stderr, output),
        );

        let status = child
            .wait()
            .await
            .map_err(|e| ExecError::Failed(e.to_string()))?;
        group.disarm();
        status.code().ok_or(ExecError::Terminated)
    }

    async fn release(&self, handle: ExecutionHandle) -> Result<(), ProvisionError> {
        tracing::debug!(handle = %handle.id(), "released local environment");
        Ok(())
    }
}

/// Kills every process in a command's group unless the command was waited
/// for. `kill_on_drop` alone reaches only the shell, not the tools it started.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let target = format!("-{}", pgid);
    let killed = std::process::Command::new("kill")
        .args(["-KILL", "--", target.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match killed {
        Ok(status) => tracing::debug!(pgid, %status, "killed process group"),
        Err(e) => tracing::warn!(pgid, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Copy a child stream into the buffer line by line.
async fn pump<R>(reader: Option<R>, stream: OutputStream, output: &OutputBuffer)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => output.push_chunk(stream, &line),
            Err(e) => {
                tracing::debug!(error = %e, "stopped reading command output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::CommandLine;

    fn name(s: &str) -> EnvironmentName {
        EnvironmentName::new(s).unwrap()
    }

    fn script(s: &str) -> Invocation {
        Invocation {
            command: CommandLine::Script(s.to_string()),
            env: BTreeMap::from([("IMAGE_TAG".to_string(), "42".to_string())]),
        }
    }

    #[tokio::test]
    async fn runs_in_workspace_with_exported_params() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            LocalProvisioner::new(dir.path()).with_environment(name("git"), Default::default());

        let handle = provisioner.acquire(&name("git")).await.unwrap();
        let output = OutputBuffer::new();
        let code = provisioner
            .exec(&handle, &script("echo tag=$IMAGE_TAG; pwd -P"), &output)
            .await
            .unwrap();
        provisioner.release(handle).await.unwrap();

        assert_eq!(code, 0);
        let captured = output.snapshot();
        assert_eq!(captured.lines()[0].text, "tag=42");
        let canonical = dir.path().canonicalize().unwrap();
        assert!(captured.stdout().contains(canonical.to_str().unwrap()));
    }

    #[tokio::test]
    async fn nonzero_exit_is_returned_as_data() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            LocalProvisioner::new(dir.path()).with_environment(name("git"), Default::default());

        let handle = provisioner.acquire(&name("git")).await.unwrap();
        let output = OutputBuffer::new();
        let code = provisioner
            .exec(&handle, &script("echo broken >&2; exit 3"), &output)
            .await
            .unwrap();

        assert_eq!(code, 3);
        assert_eq!(output.snapshot().stderr(), "broken");
    }

    #[tokio::test]
    async fn dropping_exec_kills_background_tools() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            LocalProvisioner::new(dir.path()).with_environment(name("git"), Default::default());
        let handle = provisioner.acquire(&name("git")).await.unwrap();

        let output = OutputBuffer::new();
        let late_script = script("(sleep 1; touch late) ; true");
        let exec = provisioner.exec(&handle, &late_script, &output);
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(200), exec).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!dir.path().join("late").exists());
    }

    #[tokio::test]
    async fn unknown_environment_is_rejected() {
        let provisioner = LocalProvisioner::new("/tmp");
        let err = provisioner.acquire(&name("missing")).await.unwrap_err();
        assert_eq!(
            err.kind(),
            crate::provision::ProvisionErrorKind::UnknownEnvironment
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            LocalProvisioner::new(dir.path()).with_environment(name("git"), Default::default());
        let handle = provisioner.acquire(&name("git")).await.unwrap();

        let invocation = Invocation {
            command: CommandLine::Argv(vec!["halyard-no-such-program".to_string()]),
            env: BTreeMap::new(),
        };
        let err = provisioner
            .exec(&handle, &invocation, &OutputBuffer::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn(_)));
    }
}
