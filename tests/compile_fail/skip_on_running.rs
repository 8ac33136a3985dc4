// ABOUTME: Compile-fail test verifying a running stage cannot be skipped.
// ABOUTME: This test should fail to compile, validating state machine safety.

use halyard::pipeline::{Stage, StageExecution};
use halyard::types::{EnvironmentName, StageName};

fn main() {
    let stage = Stage::script(
        StageName::new("build").unwrap(),
        EnvironmentName::new("tools").unwrap(),
        "make",
    );
    let running = StageExecution::new(&stage).start();

    // ERROR: skip() only exists on StageExecution<Pending>
    let _ = running.skip();
}
