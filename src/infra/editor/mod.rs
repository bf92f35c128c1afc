//! Editor bridge: the capability surface of the external design application.

mod memory;
mod script;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

pub use memory::{InMemoryEditor, MemoryLayer};
pub use script::ScriptEditor;

/// Errors raised by an editor bridge.
///
/// `Layer` carries the bridge's own message verbatim; it is surfaced to API
/// callers as the per-layer failure text.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("editor bridge unavailable: {0}")]
    Unavailable(String),
    #[error("failed to open document `{}`: {message}", path.display())]
    Open { path: PathBuf, message: String },
    #[error("{0}")]
    Layer(String),
    #[error("failed to export document: {0}")]
    Export(String),
    #[error("failed to close document: {0}")]
    Close(String),
    #[error("editor bridge protocol error: {0}")]
    Protocol(String),
    #[error("editor bridge i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Kind of an art layer as reported by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    Text,
    Other(String),
}

impl LayerKind {
    pub fn from_bridge(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Other(kind.to_string())
        }
    }
}

/// Entry point into the editor application.
pub trait EditorBridge: Send + Sync {
    /// Start a session and open the document at `path` as the active document.
    fn open(&self, path: &Path) -> Result<Box<dyn EditorDocument>, EditorError>;
}

/// The active document of an editor session.
pub trait EditorDocument: Send {
    /// Find an art layer by exact name and report its kind.
    fn layer_kind(&mut self, name: &str) -> Result<LayerKind, EditorError>;

    /// Replace the string contents of a text layer.
    fn set_text(&mut self, name: &str, text: &str) -> Result<(), EditorError>;

    /// Save a JPEG copy of the document; the open document keeps its format.
    fn export_jpeg(&mut self, output: &Path, quality: u8) -> Result<(), EditorError>;

    /// Close the document without saving and end the session.
    fn close(&mut self) -> Result<(), EditorError>;
}

/// An open document that is closed on every exit path.
///
/// Call [`OpenDocument::close`] to observe close failures; a guard dropped
/// without it closes the document and logs any error.
pub struct OpenDocument {
    inner: Box<dyn EditorDocument>,
    path: PathBuf,
    closed: bool,
}

impl OpenDocument {
    pub fn open(bridge: &dyn EditorBridge, path: &Path) -> Result<Self, EditorError> {
        let inner = bridge.open(path)?;
        Ok(Self {
            inner,
            path: path.to_path_buf(),
            closed: false,
        })
    }

    pub fn layer_kind(&mut self, name: &str) -> Result<LayerKind, EditorError> {
        self.inner.layer_kind(name)
    }

    pub fn set_text(&mut self, name: &str, text: &str) -> Result<(), EditorError> {
        self.inner.set_text(name, text)
    }

    pub fn export_jpeg(&mut self, output: &Path, quality: u8) -> Result<(), EditorError> {
        self.inner.export_jpeg(output, quality)
    }

    pub fn close(mut self) -> Result<(), EditorError> {
        self.closed = true;
        self.inner.close()
    }
}

impl Drop for OpenDocument {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.inner.close() {
            warn!(
                target = "infra::editor",
                op = "editor::close",
                result = "error",
                path = %self.path.display(),
                error = %err,
                "Failed to close document after an aborted session"
            );
        }
    }
}
