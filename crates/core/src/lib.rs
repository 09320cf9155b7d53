//! Trace-driven CPU cache hierarchy simulator.
//!
//! This crate implements the simulation engine: the set-associative cache
//! level with pluggable replacement, the three-level hierarchy with
//! inclusion-policy-driven eviction cascades, the hardware prefetchers, the
//! MESI coherence controller with snoop/invalidate semantics and
//! false-sharing detection, and the trace processor that drives them.
//! 1. **Config:** cache/TLB geometry, inclusion policy, prefetcher tuning,
//!    per-level latencies ([`config`]).
//! 2. **Core:** set-associative cache levels with pluggable replacement
//!    policies, hardware prefetchers, a data TLB, and a MESI coherence
//!    controller, assembled into single- and multi-core hierarchies
//!    ([`core`]).
//! 3. **Trace:** the wire-format event type, its parser, and the processors
//!    that drive a hierarchy from a sequence of events ([`trace`]).
//! 4. **Stats:** serializable per-level, per-core, TLB, coherence, prefetch,
//!    timing, hot-line, and snapshot facades bundled into a [`stats::RunResult`]
//!    ([`stats`]).
//! 5. **Presets:** named hardware configurations for real CPU families
//!    ([`presets`]).
//!
//! The engine performs no I/O and never exits the process; it is driven
//! entirely by a caller (the `cachesim-cli` binary, or any other embedder)
//! feeding it trace events and reading back structured results.

/// Address arithmetic and the engine's error taxonomy.
pub mod common;
/// Cache/TLB geometry, inclusion policy, prefetcher and latency configuration.
pub mod config;
/// Cache levels, replacement policies, prefetchers, coherence, TLB, and the
/// single-/multi-core hierarchies built from them.
pub mod core;
/// Named hardware cache-hierarchy presets.
pub mod presets;
/// Statistics and snapshot facades bundled into a [`stats::RunResult`].
pub mod stats;
/// Streaming per-event progress callback.
pub mod streaming;
/// Trace event type, parser, and trace-driven processors.
pub mod trace;

/// Single-/multi-core hierarchy configuration; use
/// [`config::CacheHierarchyConfig::default`] or a [`presets`] builder.
pub use crate::config::CacheHierarchyConfig;
/// Single-core three-level hierarchy.
pub use crate::core::CacheSystem;
/// Multi-core hierarchy with MESI coherence.
pub use crate::core::MultiCoreCacheSystem;
/// Drives a [`MultiCoreCacheSystem`] from a sequence of
/// [`trace::event::TraceEvent`]s.
pub use crate::trace::processor::MultiCoreTraceProcessor;
/// Drives a [`CacheSystem`] from a sequence of [`trace::event::TraceEvent`]s.
pub use crate::trace::processor::TraceProcessor;

/// The full result bundle produced by a run.
pub use crate::stats::RunResult;
