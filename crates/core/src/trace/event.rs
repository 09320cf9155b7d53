//! Wire-format-independent representation of one trace line.

/// One memory-access event read from the trace stream.
///
/// Exactly one "kind" applies to a given event: plain load/store, icache
/// fetch, software prefetch, vector access, atomic variant, or a memory
/// intrinsic (memcpy/memmove/memset). The flavor flags are mutually
/// exclusive in well-formed traces; the parser never sets more than one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Destination (or sole) address.
    pub address: u64,
    /// Source address, present only for `memcpy`/`memmove`.
    pub src_address: Option<u64>,
    /// Access size in bytes, always ≥ 1.
    pub size: u32,
    /// Thread that issued the access; defaults to 1 when unspecified.
    pub thread_id: u32,
    /// Source file, empty when the trace line carried none.
    pub file: String,
    /// Source line number, meaningless when `file` is empty.
    pub line: u32,
    /// Whether this access mutates the target line.
    pub is_write: bool,
    /// Instruction fetch (routes to L1i rather than L1d).
    pub is_icache: bool,
    /// Software prefetch hint (`P0`..`P3`).
    pub is_prefetch: bool,
    /// Prefetch hint level, `0..=3`, meaningless unless `is_prefetch`.
    pub prefetch_hint: u8,
    /// Vector (SIMD) load or store.
    pub is_vector: bool,
    /// Atomic load, RMW, or compare-and-swap.
    pub is_atomic: bool,
    /// Atomic read-modify-write (always also `is_atomic`).
    pub is_rmw: bool,
    /// Atomic compare-and-swap (always also `is_atomic`).
    pub is_cmpxchg: bool,
    /// `memset`: destination-only write intrinsic.
    pub is_memset: bool,
    /// `memcpy`: reads `src_address`, writes `address`.
    pub is_memcpy: bool,
    /// `memmove`: same shape as `memcpy`, overlap-safe in the source system.
    pub is_memmove: bool,
}

impl Default for TraceEvent {
    fn default() -> Self {
        Self {
            address: 0,
            src_address: None,
            size: 1,
            thread_id: 1,
            file: String::new(),
            line: 0,
            is_write: false,
            is_icache: false,
            is_prefetch: false,
            prefetch_hint: 0,
            is_vector: false,
            is_atomic: false,
            is_rmw: false,
            is_cmpxchg: false,
            is_memset: false,
            is_memcpy: false,
            is_memmove: false,
        }
    }
}

impl TraceEvent {
    /// The `"{file}:{line}"` key used for per-source-line aggregation, or
    /// `None` when the event carries no source location.
    pub fn source_key(&self) -> Option<String> {
        if self.file.is_empty() {
            None
        } else {
            Some(format!("{}:{}", self.file, self.line))
        }
    }
}
