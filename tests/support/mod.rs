// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted in-memory provisioner and sample pipeline stages.

use async_trait::async_trait;
use halyard::pipeline::{CancelHandle, Stage};
use halyard::provision::{
    ExecError, ExecutionHandle, Invocation, OutputBuffer, OutputStream, ProvisionError,
    Provisioner,
};
use halyard::resolve::PipelineConfig;
use halyard::types::{ConfigKey, EnvironmentName, HandleId, StageName};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("halyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// What the fake does when asked to run a stage's command.
#[derive(Clone)]
#[allow(dead_code)]
pub enum Behavior {
    Exit(i32),
    /// Print the lines on stdout, then exit with the code.
    Print(Vec<String>, i32),
    /// Never finish.
    Hang,
    /// Trigger cancellation, then never finish.
    CancelAndHang(CancelHandle),
    Error(ExecError),
}

/// Provisioner that records every call and follows a per-stage script.
///
/// Stages are identified by the `HALYARD_STAGE` variable of the invocation.
/// Stages without a behavior exit 0.
#[derive(Default)]
pub struct FakeProvisioner {
    behaviors: HashMap<String, Behavior>,
    unavailable: BTreeSet<String>,
    sticky: BTreeSet<String>,
    cancel_on_acquire: HashMap<String, CancelHandle>,
    seq: AtomicU64,
    pub calls: Mutex<Vec<String>>,
    pub invocations: Mutex<Vec<Invocation>>,
}

#[allow(dead_code)]
impl FakeProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, stage: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(stage.to_string(), behavior);
        self
    }

    pub fn unavailable(mut self, environment: &str) -> Self {
        self.unavailable.insert(environment.to_string());
        self
    }

    /// Acquiring this environment triggers cancellation and then takes a while.
    pub fn cancel_on_acquire(mut self, environment: &str, handle: CancelHandle) -> Self {
        self.cancel_on_acquire.insert(environment.to_string(), handle);
        self
    }

    /// Releasing this environment fails.
    pub fn sticky(mut self, environment: &str) -> Self {
        self.sticky.insert(environment.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn acquire(
        &self,
        environment: &EnvironmentName,
    ) -> Result<ExecutionHandle, ProvisionError> {
        self.calls.lock().push(format!("acquire {environment}"));
        if self.unavailable.contains(environment.as_str()) {
            return Err(ProvisionError::Unavailable {
                environment: environment.to_string(),
                reason: "runtime not reachable".to_string(),
            });
        }
        if let Some(handle) = self.cancel_on_acquire.get(environment.as_str()) {
            handle.cancel();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionHandle::new(
            HandleId::new(format!("fake-{environment}-{seq}")),
            environment.clone(),
        ))
    }

    async fn exec(
        &self,
        _handle: &ExecutionHandle,
        invocation: &Invocation,
        output: &OutputBuffer,
    ) -> Result<i32, ExecError> {
        let stage = invocation
            .env
            .get("HALYARD_STAGE")
            .cloned()
            .unwrap_or_default();
        self.calls.lock().push(format!("exec {stage}"));
        self.invocations.lock().push(invocation.clone());

        match self.behaviors.get(&stage).cloned() {
            None => Ok(0),
            Some(Behavior::Exit(code)) => Ok(code),
            Some(Behavior::Print(lines, code)) => {
                for line in lines {
                    output.push_line(OutputStream::Stdout, line);
                }
                Ok(code)
            }
            Some(Behavior::Hang) => std::future::pending().await,
            Some(Behavior::CancelAndHang(handle)) => {
                handle.cancel();
                std::future::pending().await
            }
            Some(Behavior::Error(e)) => Err(e),
        }
    }

    async fn release(&self, handle: ExecutionHandle) -> Result<(), ProvisionError> {
        self.calls
            .lock()
            .push(format!("release {}", handle.environment()));
        if self.sticky.contains(handle.environment().as_str()) {
            return Err(ProvisionError::Release {
                handle: handle.id().to_string(),
                reason: "container is still running".to_string(),
            });
        }
        Ok(())
    }
}

#[allow(dead_code)]
pub fn config_with(pairs: &[(&str, &str)]) -> PipelineConfig {
    PipelineConfig::from_pairs(pairs.iter().copied()).unwrap()
}

/// Resolved configuration for the sample build-push-deploy pipeline.
#[allow(dead_code)]
pub fn sample_config() -> PipelineConfig {
    config_with(&[
        ("image_repository", "registry.example.com/acme/app"),
        ("image_tag", "42"),
        ("app_repo_url", "https://git.example.com/acme/app.git"),
        ("chart_repo_url", "https://git.example.com/acme/chart.git"),
        ("namespace", "apps"),
    ])
}

fn names(stage: &str, environment: &str) -> (StageName, EnvironmentName) {
    (
        StageName::new(stage).unwrap(),
        EnvironmentName::new(environment).unwrap(),
    )
}

#[allow(dead_code)]
pub fn script_stage(stage: &str, environment: &str) -> Stage {
    let (name, env) = names(stage, environment);
    Stage::script(name, env, "true")
}

/// Checkout, build, fetch-chart and deploy.
#[allow(dead_code)]
pub fn sample_stages() -> Vec<Stage> {
    let argv = |stage: &str, environment: &str, args: &[&str]| {
        let (name, env) = names(stage, environment);
        Stage::argv(name, env, args).unwrap()
    };
    vec![
        argv("checkout", "git", &["git", "clone", "${app_repo_url}", "app"]),
        argv(
            "build",
            "kaniko",
            &[
                "/kaniko/executor",
                "--context=/workspace/app",
                "--destination=${image_repository}:${image_tag}",
            ],
        ),
        argv("fetch-chart", "git", &["git", "clone", "${chart_repo_url}", "chart"]),
        argv(
            "deploy",
            "tools",
            &["helm", "upgrade", "--install", "--namespace", "${namespace}", "app", "./chart"],
        )
        .with_override("image.tag", ConfigKey::new("image_tag").unwrap())
        .unwrap(),
    ]
}
