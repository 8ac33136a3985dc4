// ABOUTME: Compile-fail test verifying a stage cannot succeed before it starts.
// ABOUTME: This test should fail to compile, validating state machine safety.

use halyard::pipeline::{Stage, StageExecution};
use halyard::provision::CapturedOutput;
use halyard::types::{EnvironmentName, StageName};

fn main() {
    let stage = Stage::script(
        StageName::new("build").unwrap(),
        EnvironmentName::new("tools").unwrap(),
        "make",
    );
    let pending = StageExecution::new(&stage);

    // ERROR: succeed() only exists on StageExecution<Running>
    let _ = pending.succeed(CapturedOutput::default());
}
