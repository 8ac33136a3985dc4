// ABOUTME: Execution environments for stages: host processes and containers.
// ABOUTME: The Provisioner trait is the seam the executor depends on.

mod container;
mod detection;
mod error;
mod local;
mod output;
mod router;
mod traits;
mod types;

pub use container::{ContainerProvisioner, LABEL_ENVIRONMENT, LABEL_MANAGED};
pub use detection::{DetectionError, detect_local};
pub use error::{ExecError, ProvisionError, ProvisionErrorKind};
pub use local::LocalProvisioner;
pub use output::{
    CapturedOutput, MAX_CAPTURED_LINES, MAX_PARTIAL_BYTES, OutputBuffer, OutputLine, OutputStream,
};
pub use router::EnvironmentRouter;
pub use traits::{CommandLine, ExecutionHandle, Invocation, Provisioner};
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
