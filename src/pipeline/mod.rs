// ABOUTME: Stages, their lifecycle, and the executor that runs them.
// ABOUTME: A run executes stages sequentially and fails fast.

mod cancel;
mod execution;
mod executor;
mod failure;
mod run;
mod stage;
mod state;
mod template;

pub use cancel::{CancelHandle, CancelToken};
pub use execution::StageExecution;
pub use executor::{Executor, ExecutorOptions, PlannedStage, RunObserver};
pub use failure::StageFailure;
pub use run::{PipelineRun, RunStatus, StageResult, StageStatus};
pub use stage::{DEFAULT_SET_FLAG, STAGE_ENV_VAR, Stage, StageCommand};
pub use state::{Pending, Running};
pub use template::{Template, TemplateError};
