use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{EditorBridge, EditorDocument, EditorError, LayerKind};

/// Smallest byte stream JPEG readers accept as an empty image (SOI + EOI).
const EMPTY_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

/// A layer of an in-memory document.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    name: String,
    kind: LayerKind,
    contents: String,
}

impl MemoryLayer {
    pub fn text(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Text,
            contents: contents.into(),
        }
    }

    pub fn pixel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Other("pixel".to_string()),
            contents: String::new(),
        }
    }
}

#[derive(Default)]
struct EditorState {
    documents: HashMap<PathBuf, Vec<MemoryLayer>>,
    open_failure: Option<String>,
    export_failure: Option<String>,
    opened: usize,
    closed: usize,
    edits: Vec<(String, String)>,
    exports: Vec<(PathBuf, u8)>,
}

/// Editor bridge backed by documents registered in memory.
///
/// Every session works on a copy of the registered layers, so edits never
/// leak into later sessions. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryEditor {
    state: Arc<Mutex<EditorState>>,
}

impl InMemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(
        self,
        path: impl Into<PathBuf>,
        layers: impl IntoIterator<Item = MemoryLayer>,
    ) -> Self {
        self.lock()
            .documents
            .insert(path.into(), layers.into_iter().collect());
        self
    }

    /// Make every following `open` fail as if the application were unreachable.
    pub fn fail_open(self, message: impl Into<String>) -> Self {
        self.lock().open_failure = Some(message.into());
        self
    }

    pub fn fail_export(self, message: impl Into<String>) -> Self {
        self.lock().export_failure = Some(message.into());
        self
    }

    pub fn open_count(&self) -> usize {
        self.lock().opened
    }

    pub fn close_count(&self) -> usize {
        self.lock().closed
    }

    /// `(layer, text)` pairs applied across all sessions, in order.
    pub fn edits(&self) -> Vec<(String, String)> {
        self.lock().edits.clone()
    }

    /// `(output path, quality)` of every export, in order.
    pub fn exports(&self) -> Vec<(PathBuf, u8)> {
        self.lock().exports.clone()
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EditorBridge for InMemoryEditor {
    fn open(&self, path: &Path) -> Result<Box<dyn EditorDocument>, EditorError> {
        let mut state = self.lock();
        if let Some(message) = state.open_failure.clone() {
            return Err(EditorError::Unavailable(message));
        }
        let layers = state
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| EditorError::Open {
                path: path.to_path_buf(),
                message: "document is not registered".to_string(),
            })?;
        state.opened += 1;

        Ok(Box::new(MemoryDocument {
            layers,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryDocument {
    layers: Vec<MemoryLayer>,
    state: Arc<Mutex<EditorState>>,
}

impl MemoryDocument {
    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&mut self, name: &str) -> Result<&mut MemoryLayer, EditorError> {
        self.layers
            .iter_mut()
            .find(|layer| layer.name == name)
            .ok_or_else(|| EditorError::Layer(format!("Layer `{name}` not found")))
    }
}

impl EditorDocument for MemoryDocument {
    fn layer_kind(&mut self, name: &str) -> Result<LayerKind, EditorError> {
        Ok(self.find(name)?.kind.clone())
    }

    fn set_text(&mut self, name: &str, text: &str) -> Result<(), EditorError> {
        let layer = self.find(name)?;
        if layer.kind != LayerKind::Text {
            return Err(EditorError::Layer(format!(
                "Layer `{name}` has no text contents"
            )));
        }
        layer.contents = text.to_string();
        self.lock().edits.push((name.to_string(), text.to_string()));
        Ok(())
    }

    fn export_jpeg(&mut self, output: &Path, quality: u8) -> Result<(), EditorError> {
        if let Some(message) = self.lock().export_failure.clone() {
            return Err(EditorError::Export(message));
        }
        fs::write(output, EMPTY_JPEG)?;
        self.lock().exports.push((output.to_path_buf(), quality));
        Ok(())
    }

    fn close(&mut self) -> Result<(), EditorError> {
        self.lock().closed += 1;
        Ok(())
    }
}
