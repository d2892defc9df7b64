//! Directory-backed [`FileStore`].

use std::{
  io,
  path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use dash_core::{ServiceError, service::FileStore};

/// Serves files from a single directory. Names are plain file names; anything
/// that would resolve outside `root` is treated as missing.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
  root: PathBuf,
}

impl LocalFileStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  fn resolve(&self, name: &str) -> Result<PathBuf, ServiceError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
      (Some(Component::Normal(file)), None) => Ok(self.root.join(file)),
      _ => {
        tracing::warn!(name, "rejected file name outside storage root");
        Err(ServiceError::NotFound)
      }
    }
  }
}

fn io_error(e: io::Error) -> ServiceError {
  match e.kind() {
    io::ErrorKind::NotFound => ServiceError::NotFound,
    _ => ServiceError::Transport(e.to_string()),
  }
}

#[async_trait]
impl FileStore for LocalFileStore {
  async fn fetch(&self, name: &str) -> Result<Vec<u8>, ServiceError> {
    tokio::fs::read(self.resolve(name)?).await.map_err(io_error)
  }

  async fn size(&self, name: &str) -> Result<u64, ServiceError> {
    let meta = tokio::fs::metadata(self.resolve(name)?).await.map_err(io_error)?;
    if !meta.is_file() {
      return Err(ServiceError::NotFound);
    }
    Ok(meta.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store_with(name: &str, bytes: &[u8]) -> (tempfile::TempDir, LocalFileStore) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(name), bytes).unwrap();
    let store = LocalFileStore::new(dir.path());
    (dir, store)
  }

  #[tokio::test]
  async fn fetch_and_size_existing_file() {
    let (_dir, store) = store_with("chart.png", b"\x89PNG....");
    assert_eq!(store.size("chart.png").await.unwrap(), 8);
    assert_eq!(store.fetch("chart.png").await.unwrap(), b"\x89PNG....");
  }

  #[tokio::test]
  async fn missing_files_are_not_found() {
    let (_dir, store) = store_with("chart.png", b"x");
    assert_eq!(store.size("other.png").await.unwrap_err(), ServiceError::NotFound);
    assert_eq!(store.fetch("other.png").await.unwrap_err(), ServiceError::NotFound);
  }

  #[tokio::test]
  async fn names_cannot_escape_the_root() {
    let (dir, store) = store_with("chart.png", b"x");
    let nested = dir.path().join("inner");
    std::fs::create_dir(&nested).unwrap();
    let inner = LocalFileStore::new(&nested);

    assert_eq!(inner.size("../chart.png").await.unwrap_err(), ServiceError::NotFound);
    assert_eq!(store.size("/etc/passwd").await.unwrap_err(), ServiceError::NotFound);
    assert_eq!(store.size("").await.unwrap_err(), ServiceError::NotFound);
    // Directories are not files.
    assert_eq!(store.size("inner").await.unwrap_err(), ServiceError::NotFound);
  }
}
