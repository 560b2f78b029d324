//! Concurrent state stores backing the dispatch engine.
//!
//! Each store owns its map exclusively behind its own lock; the dispatch
//! engine only ever coordinates them, one lock at a time.

pub mod blocklist;
pub mod cache;
pub mod performance;

pub use blocklist::Blocklist;
pub use cache::ResponseCache;
pub use performance::PerfRegistry;
