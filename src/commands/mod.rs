// ABOUTME: Command module aggregator for the halyard CLI.
// ABOUTME: Re-exports the init and run command handlers.

mod init;
mod run;

pub use init::init;
pub use run::{RunArgs, run};
