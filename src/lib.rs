// ABOUTME: Library root for halyard - exposes the pipeline engine for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod output;
pub mod pipeline;
pub mod provision;
pub mod report;
pub mod resolve;
pub mod types;
