use crate::error::{Result, VectorStoreError};
use std::path::{Path, PathBuf};

pub const DEFAULT_PERSIST_DIR: &str = "data/document_store";
pub const INDEX_FILE_NAME: &str = "index.flat";
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// File layout of a persisted store directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    dir: PathBuf,
}

impl StoreLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE_NAME)
    }

    /// Both files of a saved store are present
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.index_path().is_file() && self.metadata_path().is_file()
    }

    pub async fn create_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| VectorStoreError::persistence("create store directory", &self.dir, err))
    }
}

/// Write `bytes` to a temporary sibling, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8], operation: &'static str) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|err| VectorStoreError::persistence(operation, &tmp, err))?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(VectorStoreError::persistence(operation, path, err));
    }
    Ok(())
}

pub(crate) async fn read_file(path: &Path, operation: &'static str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|err| VectorStoreError::persistence(operation, path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout::new("/tmp/store");
        assert_eq!(layout.index_path(), PathBuf::from("/tmp/store/index.flat"));
        assert_eq!(
            layout.metadata_path(),
            PathBuf::from("/tmp/store/metadata.json")
        );
    }

    #[tokio::test]
    async fn test_write_atomic_overwrites_and_leaves_no_tmp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");

        write_atomic(&path, b"first", "write test").await.unwrap();
        write_atomic(&path, b"second", "write test").await.unwrap();

        assert_eq!(read_file(&path, "read test").await.unwrap(), b"second");
        assert!(!temp.path().join("data.bin.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_file_reports_operation_and_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.json");

        let err = read_file(&path, "load metadata").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("load metadata"), "{message}");
        assert!(message.contains("missing.json"), "{message}");
    }

    #[test]
    fn test_is_persisted_requires_both_files() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        assert!(!layout.is_persisted());

        std::fs::write(layout.index_path(), b"x").unwrap();
        assert!(!layout.is_persisted());

        std::fs::write(layout.metadata_path(), b"[]").unwrap();
        assert!(layout.is_persisted());
    }
}
