//! Hardware prefetcher implementations.
//!
//! Every prefetcher is triggered once per demand miss via
//! [`Prefetcher::on_miss`] and returns the (possibly empty) list of line
//! addresses it wants fetched. Usefulness is not something the prefetcher
//! can know on its own — the cache system calls [`Prefetcher::record_useful`]
//! when a demand access later lands on one of its predictions.

/// ADAPTIVE / INTEL: stride first, stream fallback.
pub mod adaptive;
/// Sequential next-`degree`-lines prefetcher.
pub mod next_line;
/// Ascending/descending stream detector.
pub mod stream;
/// Per-PC constant-stride detector.
pub mod stride;

pub use adaptive::AdaptivePrefetcher;
pub use next_line::NextLinePrefetcher;
pub use stream::StreamPrefetcher;
pub use stride::StridePrefetcher;

/// Issued/useful/useless counters for a [`Prefetcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStats {
    /// Total addresses emitted across all `on_miss` calls.
    pub issued: u64,
    /// Predictions later touched by a demand access before eviction.
    pub useful: u64,
    /// Predictions evicted or never touched.
    pub useless: u64,
}

impl PrefetchStats {
    /// `useful / issued`, `0.0` if nothing has been issued.
    pub fn accuracy(&self) -> f64 {
        if self.issued == 0 {
            0.0
        } else {
            self.useful as f64 / self.issued as f64
        }
    }
}

/// A hardware prefetcher triggered on cache-level demand misses.
pub trait Prefetcher: Send + Sync {
    /// Called on a demand miss for `addr` made by the instruction at `pc`.
    /// Returns line addresses to prefetch, most-confident first.
    fn on_miss(&mut self, addr: u64, pc: u64) -> Vec<u64>;

    /// Current issued/useful/useless counters.
    fn stats(&self) -> PrefetchStats;

    /// Records that one previously issued prediction was touched by a
    /// demand access before being evicted.
    fn record_useful(&mut self);

    /// Records that one previously issued prediction was evicted (or the
    /// run ended) without ever being touched by a demand access.
    fn record_useless(&mut self);
}
