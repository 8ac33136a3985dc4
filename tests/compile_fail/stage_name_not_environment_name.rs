// ABOUTME: Compile-fail test verifying stage and environment names are distinct types.
// ABOUTME: This test should fail to compile, validating type safety.

use halyard::types::{EnvironmentName, StageName};

fn takes_environment(_name: &EnvironmentName) {}

fn main() {
    let stage = StageName::new("build").unwrap();
    takes_environment(&stage); // ERROR: expected EnvironmentName, found StageName
}
