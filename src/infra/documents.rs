//! Filesystem layout of source documents and their exported renders.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::warn;

use crate::domain::documents::PsdId;

/// Directory holding `<psd_id>.psd` sources and transient `<psd_id>_output.jpg`
/// renders.
#[derive(Debug, Clone)]
pub struct DocumentDirectory {
    root: PathBuf,
}

impl DocumentDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_path(&self, id: &PsdId) -> PathBuf {
        self.root.join(id.source_file_name())
    }

    pub fn artifact_path(&self, id: &PsdId) -> PathBuf {
        self.root.join(id.artifact_file_name())
    }

    /// Whether the source document exists as a regular file.
    pub async fn source_exists(&self, id: &PsdId) -> Result<bool, std::io::Error> {
        match fs::metadata(self.source_path(id)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// A render that may exist on disk and must not outlive the request.
///
/// [`PendingArtifact::remove`] reports removal failures; a guard dropped
/// without it removes the file best-effort.
#[derive(Debug)]
pub struct PendingArtifact {
    path: PathBuf,
    removed: bool,
}

impl PendingArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Bytes, std::io::Error> {
        fs::read(&self.path).await.map(Bytes::from)
    }

    /// Keep the file on disk and hand back its path.
    pub fn keep(mut self) -> PathBuf {
        self.removed = true;
        std::mem::take(&mut self.path)
    }

    /// Delete the file. A file that was never written counts as removed.
    pub async fn remove(mut self) -> Result<(), std::io::Error> {
        self.removed = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                target = "infra::documents",
                op = "artifact::remove",
                result = "error",
                path = %self.path.display(),
                error = %err,
                "Failed to remove render after an aborted request"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn resolves_paths_inside_the_root() {
        let dir = TempDir::new().expect("temp dir");
        let documents = DocumentDirectory::new(dir.path().to_path_buf());
        let id = PsdId::parse("1").expect("id");

        assert_eq!(documents.source_path(&id), dir.path().join("1.psd"));
        assert_eq!(documents.artifact_path(&id), dir.path().join("1_output.jpg"));
        assert!(!documents.source_exists(&id).await.expect("metadata"));

        std::fs::write(dir.path().join("1.psd"), b"8BPS").expect("write");
        assert!(documents.source_exists(&id).await.expect("metadata"));
    }

    #[tokio::test]
    async fn directories_are_not_sources() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir(dir.path().join("folder.psd")).expect("mkdir");
        let documents = DocumentDirectory::new(dir.path().to_path_buf());
        let id = PsdId::parse("folder").expect("id");

        assert!(!documents.source_exists(&id).await.expect("metadata"));
    }

    #[tokio::test]
    async fn dropped_artifact_is_removed() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("1_output.jpg");
        std::fs::write(&path, b"jpeg").expect("write");

        drop(PendingArtifact::new(path.clone()));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn kept_artifact_survives_the_guard() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("1_output.jpg");
        std::fs::write(&path, b"jpeg").expect("write");

        let kept = PendingArtifact::new(path.clone()).keep();
        assert_eq!(kept, path);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn removing_an_unwritten_artifact_succeeds() {
        let dir = TempDir::new().expect("temp dir");
        let artifact = PendingArtifact::new(dir.path().join("never.jpg"));
        artifact.remove().await.expect("remove");
    }
}
