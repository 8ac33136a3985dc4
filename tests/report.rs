// ABOUTME: Integration tests for run summaries and report sinks.
// ABOUTME: Builds runs with a scripted provisioner and checks text, JSON, and sink failures.

mod support;

use halyard::diagnostics::WarningKind;
use halyard::output::OutputMode;
use halyard::pipeline::{CancelHandle, Executor, PipelineRun, RunStatus, StageStatus};
use halyard::report::{ConsoleSink, FileSink, ReportSink, Reporter, Summary, publish};
use halyard::types::PipelineName;
use support::{Behavior, FakeProvisioner, sample_config, sample_stages};

async fn run_with(fake: FakeProvisioner) -> PipelineRun {
    Executor::new(fake)
        .run(&sample_stages(), &sample_config())
        .await
        .unwrap()
}

fn reporter() -> Reporter {
    Reporter::new(3)
        .with_pipeline(PipelineName::new("sample-app").unwrap())
        .with_host("ci-01")
}

fn build_failure() -> FakeProvisioner {
    let log = (1..=5).map(|i| format!("step {i}")).collect();
    FakeProvisioner::new().on("build", Behavior::Print(log, 1))
}

#[tokio::test]
async fn successful_run_summary() {
    let run = run_with(FakeProvisioner::new()).await;
    let summary = reporter().report(&run);

    assert_eq!(summary.status, RunStatus::Succeeded);
    assert_eq!(summary.host, "ci-01");
    assert_eq!(summary.stages.len(), 4);
    assert!(summary.failure.is_none());
    assert!(summary.headline().starts_with(&format!("sample-app {} succeeded", run.id())));

    let text = summary.render_text();
    assert!(text.contains("SUCCEEDED"));
    assert!(text.contains("fetch-chart"));
    assert!(!text.contains("First failure"));
}

#[tokio::test]
async fn failure_summary_keeps_output_tail() {
    let run = run_with(build_failure()).await;
    let summary = reporter().report(&run);

    assert_eq!(summary.status, RunStatus::Failed);
    let failure = summary.failure.as_ref().unwrap();
    assert_eq!(failure.stage, "build");
    assert_eq!(failure.exit_code, Some(1));
    assert_eq!(failure.reason, "command exited with status 1");
    assert_eq!(failure.output_tail, ["step 3", "step 4", "step 5"]);

    let statuses: Vec<_> = summary.stages.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        [
            StageStatus::Succeeded,
            StageStatus::Failed,
            StageStatus::Skipped,
            StageStatus::Skipped,
        ]
    );

    let text = summary.render_text();
    assert!(text.contains("First failure: build"));
    assert!(text.contains("  | step 5"));
    assert!(!text.contains("  | step 2"));
}

#[tokio::test]
async fn summary_serializes_to_json() {
    let run = run_with(build_failure()).await;
    let summary = reporter().report(&run);

    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["pipeline"], "sample-app");
    assert_eq!(json["stages"][1]["name"], "build");
    assert_eq!(json["stages"][2]["status"], "skipped");
    assert_eq!(json["failure"]["output_tail"][2], "step 5");
}

#[tokio::test]
async fn file_sink_writes_pretty_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports/run.json");
    let run = run_with(FakeProvisioner::new()).await;
    let mut summary = reporter().report(&run);

    let sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(FileSink::new(&path))];
    publish(&mut summary, &sinks);

    assert!(summary.warnings.is_empty());
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("\n  \"run_id\""));
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed["run_id"], run.id().as_str());
}

/// A sink that always fails.
struct Broken;

impl ReportSink for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn emit(&self, _summary: &Summary) -> Result<(), halyard::report::ReportError> {
        Err(halyard::report::ReportError::Io {
            path: "/dev/full".into(),
            source: std::io::Error::other("disk full"),
        })
    }
}

#[tokio::test]
async fn failing_sink_becomes_a_warning() {
    let run = run_with(FakeProvisioner::new()).await;
    let mut summary = reporter().report(&run);

    let sinks: Vec<Box<dyn ReportSink>> =
        vec![Box::new(Broken), Box::new(ConsoleSink::new(OutputMode::Quiet))];
    publish(&mut summary, &sinks);

    assert_eq!(summary.warnings.len(), 1);
    assert_eq!(summary.warnings[0].kind, WarningKind::ReportSink);
    assert!(summary.warnings[0].message.contains("broken sink"));
    assert!(summary.render_text().contains("Warnings:"));
    // The run outcome is unchanged.
    assert_eq!(summary.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn cancelled_headline_names_the_interrupted_stage() {
    let cancel = CancelHandle::new();
    let run = Executor::new(
        FakeProvisioner::new().on("fetch-chart", Behavior::CancelAndHang(cancel.clone())),
    )
    .with_cancel(cancel.token())
    .run(&sample_stages(), &sample_config())
    .await
    .unwrap();
    let summary = reporter().report(&run);

    assert_eq!(summary.status, RunStatus::Cancelled);
    let headline = summary.headline();
    assert!(headline.contains("cancelled"));
    assert!(headline.contains("stage 'fetch-chart'"));
}
