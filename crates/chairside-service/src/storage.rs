use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk storage for handwritten-note PNGs. Filenames are opaque
/// `{uuid}.png` tokens; everything else is rejected to block traversal.
#[derive(Clone)]
pub struct HandwritingStore {
    dir: PathBuf,
}

impl HandwritingStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Handwriting storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// True for `{uuid}.png` and nothing else.
    pub fn is_valid_filename(filename: &str) -> bool {
        filename
            .strip_suffix(".png")
            .is_some_and(|stem| stem.parse::<Uuid>().is_ok())
    }

    /// Store PNG bytes under a fresh opaque filename.
    pub async fn store(&self, bytes: &[u8]) -> Result<String> {
        let filename = format!("{}.png", Uuid::new_v4());
        fs::write(self.file_path(&filename), bytes).await?;
        Ok(filename)
    }

    pub async fn read(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        if !Self::is_valid_filename(filename) {
            anyhow::bail!("invalid handwriting filename: {}", filename);
        }
        match fs::read(self.file_path(filename)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal: an already-absent file is silently fine, any
    /// other failure is logged and swallowed. Never fails the caller.
    pub async fn remove(&self, filename: &str) {
        if !Self::is_valid_filename(filename) {
            warn!("Refusing to remove suspicious handwriting filename: {}", filename);
            return;
        }
        match fs::remove_file(self.file_path(filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove handwriting file {}: {}", filename, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (HandwritingStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = HandwritingStore::new(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn rejects_traversal_filenames() {
        assert!(!HandwritingStore::is_valid_filename("../etc/passwd"));
        assert!(!HandwritingStore::is_valid_filename("note.png.exe"));
        assert!(!HandwritingStore::is_valid_filename("not-a-uuid.png"));
        assert!(HandwritingStore::is_valid_filename(
            "6fa459ea-ee8a-3ca4-894e-db77e160355e.png"
        ));

        let (store, _dir) = test_store().await;
        assert!(store.read("../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn remove_of_missing_file_is_silent() {
        let (store, _dir) = test_store().await;
        // Must not panic or error — the reservation record is the authority.
        store.remove("6fa459ea-ee8a-3ca4-894e-db77e160355e.png").await;
    }

    #[tokio::test]
    async fn store_then_remove_deletes_from_disk() {
        let (store, _dir) = test_store().await;
        let filename = store.store(b"png bytes").await.unwrap();
        assert!(store.file_path(&filename).exists());

        store.remove(&filename).await;
        assert!(!store.file_path(&filename).exists());
        assert!(store.read(&filename).await.unwrap().is_none());
    }
}
