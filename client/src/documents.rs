//! Scanned document archive.
//!
//! Documents are ordinary records whose payload points at an image file
//! copied into the documents directory. Deleting a document removes the
//! record and its file; a missing file is not an error. A deleted document
//! stays deleted even if its remote copy is still served.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ledger_engine::{Document, Record};

use crate::error::Result;
use crate::ledger::{AddOutcome, Ledger};

/// Title used when a scan is saved without one.
pub const DEFAULT_TITLE: &str = "Untitled Document";

pub struct DocumentArchive {
    ledger: Ledger<Document>,
    dir: PathBuf,
}

impl DocumentArchive {
    pub fn new(ledger: Ledger<Document>, dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger,
            dir: dir.into(),
        }
    }

    pub fn ledger(&self) -> &Ledger<Document> {
        &self.ledger
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy a captured image into the archive and record it.
    pub async fn scan(&self, source: impl AsRef<Path>, title: &str) -> Result<AddOutcome<Document>> {
        let now = self.ledger.collection().now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let target = self.dir.join(format!("document_{now}_{}.jpg", &suffix[..7]));

        if let Err(e) = self.copy_image(source.as_ref(), &target).await {
            tracing::error!(source = %source.as_ref().display(), error = %e, "Failed to store scanned image");
            self.ledger
                .collection()
                .set_error(Some(format!("Could not save document image: {e}")));
            return Err(e);
        }

        let title = match title.trim() {
            "" => DEFAULT_TITLE,
            trimmed => trimmed,
        };
        let date = chrono::DateTime::from_timestamp_millis(now as i64)
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();

        let document = Document::new(title, target.to_string_lossy(), date);
        self.ledger.add(document).await
    }

    async fn copy_image(&self, source: &Path, target: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::copy(source, target).await?;
        Ok(())
    }

    /// Documents of the current view.
    pub async fn get_all(&self) -> std::sync::Arc<Vec<Record<Document>>> {
        self.ledger.get_all().await
    }

    /// Remove a document and its image. Returns whether it existed locally.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = match self.ledger.collection().remove(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to delete document");
                self.ledger
                    .collection()
                    .set_error(Some(format!("Could not delete document: {e}")));
                return false;
            }
        };

        let uri = &removed.payload.image_uri;
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if !path.is_empty() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path, "Document image already gone");
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "Could not remove document image"),
            }
        }

        tracing::info!(id = %id, "Document deleted");
        true
    }
}
