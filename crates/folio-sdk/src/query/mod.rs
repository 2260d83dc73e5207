//! Keyed asynchronous query cache
//!
//! Shared by every consumer in the SDK:
//! - Structured keys compared structurally ([`QueryKey`])
//! - One in-flight fetch per key, concurrent readers attach to it
//! - Enable gating, staleness, prefix invalidation and direct writes
//! - A version channel so derived views know when to recompute

mod cache;
mod key;
mod state;

pub use cache::{QueryCache, QueryCacheConfig, QueryCacheStats};
pub use key::{KeyPart, QueryKey};
pub use state::{QueryState, QueryStatus};
