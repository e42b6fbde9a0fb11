use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use super::OptionStore;
use crate::dao::storage::StorageResult;

/// Volatile backend keeping the option list in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryOptionStore {
    options: Arc<RwLock<Vec<String>>>,
}

impl MemoryOptionStore {
    /// Start from a pre-populated list.
    pub fn with_options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: Arc::new(RwLock::new(options.into_iter().map(Into::into).collect())),
        }
    }
}

impl OptionStore for MemoryOptionStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let options = self.options.clone();
        Box::pin(async move { Ok(options.read().await.clone()) })
    }

    fn save(&self, next: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let options = self.options.clone();
        Box::pin(async move {
            *options.write().await = next;
            Ok(())
        })
    }
}
