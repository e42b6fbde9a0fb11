use std::{collections::HashSet, sync::Arc};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    dao::{
        option_store::OptionStore,
        storage::{StorageError, StorageResult},
    },
    state::poll::is_sentinel,
};

/// Upper bound on stored labels: a poll holds ten answers and two are sentinels.
pub const MAX_STORED_OPTIONS: usize = 8;

/// Failures raised while editing the option list.
#[derive(Debug, Error)]
pub enum OptionError {
    /// The label is already stored, or is one of the sentinel answers.
    #[error("option `{0}` already exists")]
    Duplicate(String),
    /// The label is not part of the stored list.
    #[error("option `{0}` does not exist")]
    Unknown(String),
    /// The list already holds [`MAX_STORED_OPTIONS`] labels.
    #[error("option list is full ({max} entries)")]
    LimitReached { max: usize },
    /// The backend could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Data Access Object enforcing uniqueness and ordering on top of an [`OptionStore`].
///
/// Read-modify-write cycles are serialized so concurrent edits never lose an update.
#[derive(Clone)]
pub struct OptionRepository {
    store: Arc<dyn OptionStore>,
    edit_gate: Arc<Mutex<()>>,
}

impl OptionRepository {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self {
            store,
            edit_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Load the stored labels, dropping entries that break the store invariants.
    pub async fn load(&self) -> StorageResult<Vec<String>> {
        let raw = self.store.load().await?;
        Ok(sanitize(raw))
    }

    /// Overwrite the stored labels.
    pub async fn save(&self, options: Vec<String>) -> StorageResult<()> {
        let _gate = self.edit_gate.lock().await;
        self.store.save(sanitize(options)).await
    }

    /// Append `label` and persist, returning the new list.
    pub async fn add(&self, label: &str) -> Result<Vec<String>, OptionError> {
        let _gate = self.edit_gate.lock().await;
        let mut options = self.load().await?;

        if is_sentinel(label) || options.iter().any(|existing| existing == label) {
            return Err(OptionError::Duplicate(label.to_owned()));
        }
        if options.len() >= MAX_STORED_OPTIONS {
            return Err(OptionError::LimitReached {
                max: MAX_STORED_OPTIONS,
            });
        }

        options.push(label.to_owned());
        self.store.save(options.clone()).await?;
        info!(label, count = options.len(), "poll option added");
        Ok(options)
    }

    /// Remove `label` and persist, returning the new list.
    pub async fn remove(&self, label: &str) -> Result<Vec<String>, OptionError> {
        let _gate = self.edit_gate.lock().await;
        let mut options = self.load().await?;

        let Some(position) = options.iter().position(|existing| existing == label) else {
            return Err(OptionError::Unknown(label.to_owned()));
        };

        options.remove(position);
        self.store.save(options.clone()).await?;
        info!(label, count = options.len(), "poll option removed");
        Ok(options)
    }
}

fn sanitize(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|label| {
            if label.trim().is_empty() {
                warn!("dropping empty stored option");
                return false;
            }
            if is_sentinel(label) {
                warn!(label = %label, "dropping sentinel label found in option store");
                return false;
            }
            if !seen.insert(label.clone()) {
                warn!(label = %label, "dropping duplicate stored option");
                return false;
            }
            true
        })
        .collect()
}
