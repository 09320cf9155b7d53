//! Common utilities and types shared across the cache simulator.
//!
//! 1. **Address arithmetic:** offset/index/tag decomposition shared by every
//!    cache level and the TLB.
//! 2. **Error taxonomy:** [`error::ConfigError`], [`error::ParseError`],
//!    [`error::DimensionError`].

/// Address decomposition (offset/index/tag splits).
pub mod addr;

/// Error types: configuration, parsing, and dimension errors.
pub mod error;

pub use addr::{decompose, index_of, line_align, log2_exact, rebuild_address, tag_of, Decomposed};
pub use error::{ConfigError, DimensionError, ParseError};
