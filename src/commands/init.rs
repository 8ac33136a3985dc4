// ABOUTME: The init command.
// ABOUTME: Writes a starter halyard.yml into the current directory.

use halyard::config;
use halyard::error::Result;
use halyard::output::Output;
use std::env;

pub fn init(pipeline: Option<&str>, force: bool, output: &Output) -> Result<()> {
    let cwd = env::current_dir()?;
    config::init_config(&cwd, pipeline, force)?;
    output.success("Created halyard.yml");
    Ok(())
}
