use super::KeyValueStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;

/// Key-value store keeping each key in its own JSON file under one directory.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the target, so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Keys become file names, so only a conservative character set is allowed.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(anyhow::anyhow!("storage key cannot be empty"));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow::anyhow!(
            "storage key {:?} may only contain letters, digits, '-' and '_'",
            key
        ));
    }

    Ok(())
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        let dir = self.dir.clone();

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create storage directory: {:?}", dir))?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut staged = tempfile::Builder::new()
                .prefix(".clipdeck-")
                .suffix(".tmp")
                .tempfile_in(&dir)
                .context("Failed to create staging file")?;

            staged
                .write_all(value.as_bytes())
                .context("Failed to write staging file")?;
            staged
                .as_file()
                .sync_all()
                .context("Failed to sync staging file")?;

            staged
                .persist(&path)
                .with_context(|| format!("Failed to replace {:?}", path))?;
            Ok(())
        })
        .await
        .context("Storage writer task panicked")?
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert_eq!(store.get("recordings").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        store.set("recordings", "[1]".to_string()).await.unwrap();
        store.set("recordings", "[1,2]".to_string()).await.unwrap();
        assert_eq!(store.get("recordings").await.unwrap().as_deref(), Some("[1,2]"));
        assert!(dir.path().join("nested").join("recordings.json").exists());

        store.remove("recordings").await.unwrap();
        assert_eq!(store.get("recordings").await.unwrap(), None);

        // Removing twice is fine
        store.remove("recordings").await.unwrap();
    }

    #[tokio::test]
    async fn test_no_staging_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.set("recordings", "{}".to_string()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["recordings.json".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.get("../escape").await.is_err());
        assert!(store.set("", "x".to_string()).await.is_err());
        assert!(validate_key("recordings_v1-a").is_ok());
    }
}
