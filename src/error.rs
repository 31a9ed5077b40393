use std::path::PathBuf;

use thiserror::Error;

use crate::tabs::TabId;

/// Violations of the tab synchronization contract on the editing side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// An edit or switch addressed a tab the session never created.
    #[error("unknown tab id {0}")]
    UnknownTab(TabId),
}

/// Failures reported by a [`crate::renderer::DiagramRenderer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The renderer rejected the diagram source.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The renderer could not be reached at all (missing program, broken pipe).
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

/// Failures writing to an external sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("failed to write {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {url}: {source}")]
    Browser {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing is displayed; the export request is ignored.
    #[error("no drawing is currently displayed")]
    NoDrawing,

    #[error("failed to prepare SVG: {0}")]
    Svg(String),

    #[error("failed to rasterize: {0}")]
    Raster(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Failures at the message bus boundary.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("malformed payload on '{channel}': {reason}")]
    Malformed { channel: String, reason: String },

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
}

/// Failures loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config as TOML or YAML: {0}")]
    Parse(String),
}
