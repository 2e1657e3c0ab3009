use std::{io, path::PathBuf};

use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure the pipeline can surface. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load: cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("load: malformed CSV in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },

    #[error("transform: required column `{column}` not found")]
    MissingColumn { column: String },

    #[error("transform: cannot derive column `{column}`: {source}")]
    Transform {
        column: String,
        #[source]
        source: ArrowError,
    },

    #[error("snapshot: cannot create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot: failed writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("config: {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn write(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        PipelineError::Write {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Short stage name, used as a structured logging field.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::FileAccess { .. } | PipelineError::Parse { .. } => "load",
            PipelineError::MissingColumn { .. } | PipelineError::Transform { .. } => "transform",
            PipelineError::DirectoryCreation { .. } | PipelineError::Write { .. } => "snapshot",
            PipelineError::Config { .. } => "config",
        }
    }
}
