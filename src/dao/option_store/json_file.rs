//! Flat JSON document backend for the option list.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::debug;

use super::OptionStore;
use crate::dao::storage::{StorageError, StorageResult};

/// Stores the option list as a JSON array of strings on disk.
#[derive(Debug, Clone)]
pub struct JsonFileOptionStore {
    path: Arc<PathBuf>,
}

impl JsonFileOptionStore {
    /// Create a store backed by the document at `path`. The file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OptionStore for JsonFileOptionStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let path = self.path.clone();
        Box::pin(async move { read_document(&path).await })
    }

    fn save(&self, options: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move { write_document(&path, &options).await })
    }
}

async fn read_document(path: &Path) -> StorageResult<Vec<String>> {
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "option document absent; starting empty");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(StorageError::unavailable(
                format!("failed to read `{}`", path.display()),
                err,
            ));
        }
    };

    serde_json::from_slice::<Vec<String>>(&contents).map_err(|err| {
        StorageError::malformed(
            format!("`{}` is not a list of strings", path.display()),
            err,
        )
    })
}

/// Write to a sibling temporary file then rename it over the target so readers
/// only ever see a complete document.
async fn write_document(path: &Path, options: &[String]) -> StorageResult<()> {
    let payload = serde_json::to_vec_pretty(options).map_err(|err| {
        StorageError::malformed("failed to encode option list".into(), err)
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|err| {
            StorageError::unavailable(format!("failed to create `{}`", parent.display()), err)
        })?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, &payload).await.map_err(|err| {
        StorageError::unavailable(format!("failed to write `{}`", tmp_path.display()), err)
    })?;
    fs::rename(&tmp_path, path).await.map_err(|err| {
        StorageError::unavailable(
            format!("failed to replace `{}`", path.display()),
            err,
        )
    })?;

    debug!(path = %path.display(), count = options.len(), "option document saved");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "options.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
