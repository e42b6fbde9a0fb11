/// Option list storage backends.
pub mod option_store;
/// Option list repository enforcing label invariants.
pub mod options;
/// Storage abstraction layer errors.
pub mod storage;
