//! Cache Module
//!
//! Generational response storage with relaxed (query-insensitive) matching.

mod disk;
mod entry;
pub mod key;
mod stats;
mod storage;
mod store;


// Re-export public types
pub use disk::DiskCacheStore;
pub use entry::{is_hop_by_hop, CacheEntry, CachedResponse};
pub use stats::AgentStats;
pub use storage::{
    CacheStorage, GenerationHandle, GenerationInfo, MatchOptions, MatchScope, SharedStorage,
};
pub use store::MemoryCacheStore;
