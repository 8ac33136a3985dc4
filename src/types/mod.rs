// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent name and ID confusion at compile time.

mod config_key;
mod id;
mod image_ref;
mod name;

pub use config_key::{ConfigKey, ConfigKeyError};
pub use id::{ContainerId, HandleId, Id, RunId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use name::{EnvironmentName, Name, NameError, PipelineName, StageName};
