pub mod config;
pub mod error;
pub mod process;

pub use config::{PipelineConfig, SnapshotFormat};
pub use error::{PipelineError, Result};
