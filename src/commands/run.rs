// ABOUTME: The run command: resolve configuration, execute stages, report.
// ABOUTME: Wires the resolver, environment router, executor, hooks and report sinks.

use halyard::config::PipelineFile;
use halyard::diagnostics::Warning;
use halyard::error::{Error, Result};
use halyard::hooks::{HookContext, HookPoint, HookRunner};
use halyard::output::{Output, OutputMode};
use halyard::pipeline::{
    CancelHandle, Executor, ExecutorOptions, PipelineRun, PlannedStage, RunStatus, StageFailure,
};
use halyard::provision::EnvironmentRouter;
use halyard::report::{ConsoleSink, FileSink, ReportSink, Reporter, TracingSink, publish};
use halyard::resolve::{ConfigError, ConfigSource, Resolver, parse_override};
use halyard::types::RunId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub dry_run: bool,
    pub stage: Option<String>,
    pub set: Vec<String>,
    pub report: Option<PathBuf>,
}

pub async fn run(args: RunArgs, output: &Output) -> Result<()> {
    let path = match args.config {
        Some(path) => path,
        None => PipelineFile::discover(&env::current_dir()?)?,
    };
    let file = PipelineFile::load(&path)?;
    let stages = file.stages()?;

    let overrides = args
        .set
        .iter()
        .map(|s| parse_override(s))
        .collect::<std::result::Result<BTreeMap<_, _>, ConfigError>>()?;
    let source = ConfigSource::capture(file.values.clone(), overrides);
    let config = Resolver::standard()
        .with_defaults(&file.defaults)
        .resolve(&source)?;
    tracing::debug!(keys = config.len(), "configuration resolved");

    let options = ExecutorOptions {
        default_timeout: file.settings.stage_timeout,
        only: args.stage,
    };
    let workspace = std::path::absolute(file.workspace_dir())?;
    let router = EnvironmentRouter::new(&file, &workspace);

    if args.dry_run {
        let executor = Executor::new(router).with_options(options);
        let planned = executor.plan(&stages, &config)?;
        print_plan(&planned, output.mode());
        return Ok(());
    }

    std::fs::create_dir_all(&workspace).map_err(|source| Error::CannotCreate {
        path: workspace.clone(),
        source,
    })?;

    let run_id = RunId::generate();
    let reporter = Reporter::new(file.settings.output_tail).with_pipeline(file.pipeline.clone());
    let hooks = HookRunner::new(file.base_dir());
    let mut context = HookContext::new(file.pipeline.clone(), run_id.clone(), reporter.host());
    context.image = config.image();

    if let Some(result) = hooks.run(HookPoint::PreRun, &context).await
        && !result.success
    {
        return Err(Error::Hook(format!(
            "pre-run hook failed: {}",
            result.stderr.trim()
        )));
    }

    let cancel = CancelHandle::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            signal.cancel();
        }
    });

    output.progress(&format!(
        "Running {} ({} stage(s)), run {}",
        file.pipeline,
        stages.len(),
        run_id
    ));

    let executor = Executor::new(router)
        .with_options(options)
        .with_cancel(cancel.token())
        .with_observer(Arc::new(Output::new(output.mode())))
        .with_run_id(run_id);
    let run = executor.run(&stages, &config).await?;

    let mut summary = reporter.report(&run);

    let point = HookPoint::after(summary.status);
    let completion = context.with_summary(&summary);
    if let Some(result) = hooks.run(point, &completion).await
        && !result.success
    {
        summary.warnings.push(Warning::hook_failed(format!(
            "{} hook exited with {}",
            point.filename(),
            result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "no status".to_string())
        )));
    }

    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if let Some(path) = args.report {
        sinks.push(Box::new(FileSink::new(path)));
    }
    sinks.push(Box::new(TracingSink));
    sinks.push(Box::new(ConsoleSink::new(output.mode())));
    publish(&mut summary, &sinks);

    outcome(&run)
}

/// Map a finished run onto the command result.
fn outcome(run: &PipelineRun) -> Result<()> {
    match run.status() {
        RunStatus::Succeeded => Ok(()),
        RunStatus::Cancelled => Err(Error::Cancelled),
        RunStatus::Failed => {
            let Some(failed) = run.first_failure() else {
                return Err(Error::StageFailed {
                    stage: "unknown".to_string(),
                    reason: "run failed".to_string(),
                });
            };
            let stage = failed.stage().to_string();
            match failed.failure() {
                Some(StageFailure::Provision(e)) => Err(Error::Provision {
                    stage,
                    reason: e.to_string(),
                }),
                other => Err(Error::StageFailed {
                    stage,
                    reason: other
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "failed".to_string()),
                }),
            }
        }
    }
}

#[derive(Serialize)]
struct PlanLine<'a> {
    event: &'static str,
    stage: &'a str,
    environment: &'a str,
    command: String,
    env: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

fn print_plan(planned: &[PlannedStage<'_>], mode: OutputMode) {
    for step in planned {
        let stage = step.stage;
        match mode {
            OutputMode::Json => {
                let line = PlanLine {
                    event: "planned_stage",
                    stage: stage.name().as_str(),
                    environment: stage.environment().as_str(),
                    command: step.invocation.display(),
                    env: step.invocation.env.keys().map(String::as_str).collect(),
                    timeout_secs: step.timeout.map(|t| t.as_secs()),
                };
                if let Ok(json) = serde_json::to_string(&line) {
                    println!("{json}");
                }
            }
            OutputMode::Normal | OutputMode::Quiet => {
                let timeout = step
                    .timeout
                    .map(|t| format!(" [timeout {t:?}]"))
                    .unwrap_or_default();
                println!(
                    "{} ({}){}: {}",
                    stage.name(),
                    stage.environment(),
                    timeout,
                    step.invocation.display()
                );
            }
        }
    }
}
