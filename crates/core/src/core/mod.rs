//! Simulation engine.
//!
//! The single-core [`system::CacheSystem`] and multi-core
//! [`system::multicore::MultiCoreCacheSystem`] hierarchies, built from the
//! [`units`] they're assembled from.

/// The three/four-level cache hierarchy, single- and multi-core.
pub mod system;

/// Cache levels, replacement policies, prefetchers, coherence, TLB.
pub mod units;

pub use self::system::CacheSystem;
pub use self::system::multicore::MultiCoreCacheSystem;
