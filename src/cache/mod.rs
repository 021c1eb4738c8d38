mod fetch;
mod store;

pub use fetch::{CacheEntry, CachePhase, DataFetchCache};
pub use store::CacheStore;

#[cfg(test)]
pub(crate) use fetch::tests as fetch_tests;
