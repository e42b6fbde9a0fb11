pub mod json_file;
pub mod memory;

use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use self::{json_file::JsonFileOptionStore, memory::MemoryOptionStore};

/// Abstraction over where the ordered option list is persisted.
///
/// Implementations only read and overwrite whole documents; uniqueness and
/// ordering rules live in [`crate::dao::options::OptionRepository`].
pub trait OptionStore: Send + Sync {
    /// Return the persisted labels, or an empty list when nothing was saved yet.
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    /// Replace the persisted labels with `options`.
    fn save(&self, options: Vec<String>) -> BoxFuture<'static, StorageResult<()>>;
}
