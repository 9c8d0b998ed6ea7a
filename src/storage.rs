use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{info, instrument, warn};
use uuid::Uuid;

const SCAN_DIR: &str = "documents";

/// Where document scans live. Keys are opaque to callers and are what the
/// `documents.scan` column stores.
#[rocket::async_trait]
pub trait ScanStorage: Send + Sync {
    async fn store(&self, file_name: &str, contents: &[u8]) -> io::Result<String>;

    async fn exists(&self, key: &str) -> io::Result<bool>;

    /// Removing a key that is already gone is not an error.
    async fn delete(&self, key: &str) -> io::Result<()>;
}

pub struct LocalScanStorage {
    root: PathBuf,
}

impl LocalScanStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        (safe && relative.starts_with(SCAN_DIR)).then(|| self.root.join(relative))
    }
}

pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "scan".to_string()
    } else {
        cleaned.to_string()
    }
}

#[rocket::async_trait]
impl ScanStorage for LocalScanStorage {
    #[instrument(skip(self, contents), fields(size = contents.len()))]
    async fn store(&self, file_name: &str, contents: &[u8]) -> io::Result<String> {
        let key = format!(
            "{}/{}_{}",
            SCAN_DIR,
            Uuid::new_v4().simple(),
            sanitize_file_name(file_name)
        );

        tokio::fs::create_dir_all(self.root.join(SCAN_DIR)).await?;
        tokio::fs::write(self.root.join(&key), contents).await?;

        info!(key = %key, "Stored document scan");
        Ok(key)
    }

    async fn exists(&self, key: &str) -> io::Result<bool> {
        match self.resolve(key) {
            Some(path) => tokio::fs::try_exists(path).await,
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> io::Result<()> {
        let Some(path) = self.resolve(key) else {
            warn!(key = %key, "Refusing to delete scan outside the media root");
            return Ok(());
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!(key = %key, "Deleted document scan");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
