use std::{io, path::PathBuf};
use thiserror::Error;

/// Fatal build failures. None of these are retried.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The load-and-transform step failed for one URL. Output already
    /// written by the current pass stays on disk.
    #[error("failed to load {url}")]
    Load {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("package install failed")]
    Install(#[source] anyhow::Error),

    #[error("failed to {action} {}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{step} step failed")]
    Pipeline {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BuildError {
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::Filesystem { action, path: path.into(), source }
    }
}
