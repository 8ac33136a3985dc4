// ABOUTME: Stage lifecycle marker types for the type state pattern.
// ABOUTME: Only Pending and Running are live states; terminal states are StageResults.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Not started yet.
/// Available actions: `start()`, `skip()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Command in flight.
/// Available actions: `succeed()`, `fail()`
#[derive(Debug, Clone, Copy)]
pub struct Running {
    pub(super) started_at: DateTime<Utc>,
    pub(super) clock: Instant,
}
