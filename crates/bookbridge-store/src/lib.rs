//! Storage layer: a generic string key/value boundary and the namespaced cache built on it.

mod error;
pub use error::StoreError;

pub mod cache;
pub mod kv;

pub use cache::{Cache, CacheEntry, Namespace};
pub use kv::{JsonFileStore, KvStore, MemoryStore};
