use std::path::PathBuf;

use jl_frame::FrameError;
use jl_io::IoError;
use jl_join::{JoinError, VariantParseError};
use thiserror::Error;

/// Coarse classification used for exit codes and user-facing prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidKey,
    MalformedInput,
    MissingInput,
    Config,
    Usage,
    Io,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error("could not load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("could not export to {}: {source}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("no data for {sides}: upload both tables or turn sample data on")]
    MissingInput { sides: String },
    #[error("could not read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error(transparent)]
    Variant(#[from] VariantParseError),
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Json(serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Join(JoinError::InvalidKey { .. }) => ErrorKind::InvalidKey,
            Self::Join(_) | Self::Frame(_) => ErrorKind::MalformedInput,
            Self::Load {
                source: IoError::Io(_),
                ..
            } => ErrorKind::Io,
            Self::Load { .. } => ErrorKind::MalformedInput,
            Self::MissingInput { .. } => ErrorKind::MissingInput,
            Self::ConfigRead { .. } | Self::ConfigParse(_) => ErrorKind::Config,
            Self::Variant(_) | Self::Usage(_) => ErrorKind::Usage,
            Self::Export { .. } | Self::Json(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}
