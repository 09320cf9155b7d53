//! Error taxonomy for the cache simulator.
//!
//! Three kinds of error cross the engine's boundary:
//! 1. [`ConfigError`] — invalid cache/TLB geometry, fatal at construction.
//! 2. [`ParseError`] — an unparseable trace line; non-fatal, the parser
//!    returns "no event" and the caller silently skips it.
//! 3. [`DimensionError`] — an unknown preset name or an invalid driver-level
//!    dimension (core count, prefetch degree); fatal at startup.

use thiserror::Error;

/// Invalid cache or TLB geometry, rejected at construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `size_bytes` was zero.
    #[error("cache size must be non-zero")]
    ZeroSize,

    /// `associativity` (ways) was zero.
    #[error("associativity must be non-zero")]
    ZeroAssociativity,

    /// `line_bytes` was not a power of two.
    #[error("line size {0} is not a power of two")]
    LineNotPowerOfTwo(usize),

    /// The derived set count (`size / (line * ways)`) was not a power of
    /// two, or did not divide evenly.
    #[error("derived set count {0} is not a power of two")]
    SetsNotPowerOfTwo(usize),

    /// `size_bytes` is not an exact multiple of `line_bytes * associativity`.
    #[error("cache size {size} is not a multiple of line_size ({line}) * ways ({ways})")]
    SizeNotDivisible {
        /// The offending total size in bytes.
        size: usize,
        /// The line size in bytes.
        line: usize,
        /// The associativity (number of ways).
        ways: usize,
    },

    /// A tree-PLRU cache was configured with an associativity that is not a
    /// power of two (required for the binary decision tree).
    #[error("tree-PLRU requires power-of-two associativity, got {0}")]
    PlruRequiresPowerOfTwoWays(usize),
}

/// An unparseable trace line.
///
/// Returned by [`crate::trace::parser::parse_line`]; the trace processor
/// treats this as "no event" and moves on to the next line rather than
/// aborting the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line had no recognizable event-type letter.
    #[error("unrecognized event type {0:?}")]
    UnknownEventType(char),

    /// A required address field was missing or not valid hexadecimal.
    #[error("missing or invalid address field")]
    InvalidAddress,

    /// `size` was missing, non-numeric, or zero.
    #[error("missing or invalid size field (must be >= 1)")]
    InvalidSize,

    /// A `memcpy`/`memmove` line was missing its source-address field.
    #[error("memcpy/memmove event missing source address")]
    MissingSourceAddress,

    /// The line was blank or a comment; never surfaced as a hard error but
    /// used internally to short-circuit parsing.
    #[error("line is blank or a comment")]
    Skippable,
}

/// A fatal configuration error at the driver/preset boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DimensionError {
    /// No hardware preset is registered under this name.
    #[error("unknown hardware preset {0:?}")]
    UnknownPreset(String),

    /// A negative or zero core count was requested where `0` does not mean
    /// "auto-detect".
    #[error("invalid core count {0}")]
    InvalidCoreCount(i64),

    /// A prefetch degree less than 1 was requested.
    #[error("prefetch degree must be >= 1, got {0}")]
    InvalidPrefetchDegree(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_are_stable() {
        assert_eq!(
            ConfigError::ZeroSize.to_string(),
            "cache size must be non-zero"
        );
        assert_eq!(
            ConfigError::LineNotPowerOfTwo(100).to_string(),
            "line size 100 is not a power of two"
        );
    }

    #[test]
    fn parse_error_unknown_event_type_reports_the_char() {
        let err = ParseError::UnknownEventType('Q');
        assert!(err.to_string().contains('Q'));
    }
}
