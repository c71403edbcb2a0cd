//! Filesystem artifact store: deterministic paths and all-or-nothing writes.
//!
//! There is no manifest. A file at [`ArtifactStore::path_for`] *is* the
//! record that the artifact is complete, which only holds if a file never
//! appears there half-written. Writes therefore go to a hidden temp file in
//! the same directory and are renamed into place once fully flushed; a crash
//! mid-write leaves at most a `.{id}*.part` file that never matches an
//! artifact path.

use crate::error::{FetchError, HarvestError};
use crate::output::ArtifactKind;
use crate::pipeline::normalize::Identifier;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory of artifacts keyed by identifier and kind.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory if it is missing.
    pub async fn ensure_root(&self) -> Result<(), HarvestError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| HarvestError::OutputDirFailed {
                path: self.root.clone(),
                source: e,
            })
    }

    /// `{root}/{identifier}{suffix}`: e.g. `PDFs/US-1.pdf`, `PDFs/US-1_html.pdf`.
    pub fn path_for(&self, id: &Identifier, kind: ArtifactKind) -> PathBuf {
        self.root.join(format!("{}{}", id.as_str(), kind.file_suffix()))
    }

    /// Whether the artifact is already recorded as complete.
    ///
    /// A directory at the artifact path does not count.
    pub fn contains(&self, id: &Identifier, kind: ArtifactKind) -> bool {
        self.path_for(id, kind)
            .metadata()
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Persist `bytes` at `path` atomically. Returns the number of bytes written.
    ///
    /// Empty payloads are refused: a zero-byte file would be mistaken for a
    /// completed artifact on the next run.
    pub async fn write_atomic(&self, path: &Path, bytes: Vec<u8>) -> Result<u64, FetchError> {
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomic_blocking(&dir, &target, &bytes))
            .await
            .map_err(|e| FetchError::WriteFailed {
                detail: format!("write task panicked: {e}"),
            })?
    }
}

/// Blocking implementation of the temp-then-rename write.
fn write_atomic_blocking(dir: &Path, target: &Path, bytes: &[u8]) -> Result<u64, FetchError> {
    let write_failed = |e: std::io::Error| FetchError::WriteFailed {
        detail: format!("{}: {e}", target.display()),
    };

    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{stem}."))
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(write_failed)?;

    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;

    // On any error above `tmp` is dropped and the temp file removed.
    tmp.persist(target).map_err(|e| write_failed(e.error))?;

    debug!("Persisted {} bytes → {}", bytes.len(), target.display());
    Ok(bytes.len() as u64)
}
