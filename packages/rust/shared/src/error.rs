//! Error types for diagramlens.
//!
//! Library crates return [`DiagramLensError`]; the CLI reports it through
//! `color-eyre`. Most page-level failures (engine errors, sidebar fetches)
//! never surface as `Err` to the caller: the pipeline logs them and carries on.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DiagramLensError {
    /// Config file missing a home directory, unreadable TOML, bad values.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP failure talking to the render service or the wiki.
    #[error("network error: {0}")]
    Network(String),

    /// A selector that does not parse.
    #[error("selector error: {0}")]
    Selector(String),

    /// The diagram engine rejected or failed a render.
    #[error("render error: {0}")]
    Render(String),

    /// The editor page cannot be augmented.
    #[error("augment error: {0}")]
    Augment(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Bad regex in a rule or site pattern.
    #[error("validation error: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, DiagramLensError>;

impl DiagramLensError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
