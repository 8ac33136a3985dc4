// ABOUTME: Compile-fail test verifying HandleId and ContainerId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use halyard::types::{ContainerId, HandleId};

fn takes_container_id(_id: ContainerId) {}

fn main() {
    let handle_id = HandleId::new("local-git-1");
    takes_container_id(handle_id); // ERROR: expected ContainerId, found HandleId
}
