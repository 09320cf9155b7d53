//! Command-line surface: flags and subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Trace-driven simulator of a multi-level, optionally multi-core CPU
/// cache hierarchy.
#[derive(Parser, Debug)]
#[command(
    name = "cachesim",
    author,
    version,
    about = "Trace-driven CPU cache hierarchy simulator",
    long_about = "Simulate a trace of memory-access events through a configurable \
multi-level cache hierarchy and report per-level hit/miss/writeback \
statistics, MESI coherence activity, false sharing, hot source lines, \
prefetcher effectiveness, and timing estimates.\n\n\
Examples:\n  \
cachesim trace.txt\n  \
cachesim run trace.txt --config zen3 --json\n  \
cachesim run --cores 4 --prefetch stride < trace.txt\n  \
cachesim presets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate a trace file (or stdin) through a configured cache hierarchy.
    Run(RunArgs),
    /// List built-in hardware presets, or print one preset's geometry.
    Presets {
        /// A specific preset name to describe; lists every name if omitted.
        name: Option<String>,
    },
}

/// Flags accepted by the `run` subcommand (and by bare invocation, which is
/// equivalent to `cachesim run ...`).
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Trace file to simulate; reads stdin if omitted or `-`.
    pub trace: Option<PathBuf>,

    /// Named hardware preset (see `cachesim presets`), or `custom` for the
    /// library default geometry.
    #[arg(long, default_value = "educational")]
    pub config: String,

    /// Core count for a multi-core run; `0` auto-detects via the host's
    /// available parallelism. Omit for a single-core run.
    #[arg(long)]
    pub cores: Option<i64>,

    /// Hardware prefetcher algorithm.
    #[arg(long, value_enum)]
    pub prefetch: Option<PrefetchArg>,

    /// Lines to prefetch per triggering miss.
    #[arg(long = "prefetch-degree")]
    pub prefetch_degree: Option<i64>,

    /// Enable verbose (`debug`-level) logging to stderr.
    #[arg(long)]
    pub verbose: bool,

    /// Print the result bundle as JSON instead of a human-readable report.
    #[arg(long)]
    pub json: bool,

    /// Print one progress line per trace event as it's processed.
    #[arg(long)]
    pub stream: bool,

    /// Write a folded-stack profile of hot source lines to this path,
    /// suitable for `inferno-flamegraph`/`flamegraph.pl`.
    #[arg(long)]
    pub flamegraph: Option<PathBuf>,

    /// Skip final cache-line snapshots to speed up large runs.
    #[arg(long)]
    pub fast: bool,

    /// L1 data+instruction cache size in KiB.
    #[arg(long = "l1-size")]
    pub l1_size: Option<usize>,
    /// L1 data+instruction associativity.
    #[arg(long = "l1-assoc")]
    pub l1_assoc: Option<usize>,
    /// Cache line size in bytes, applied to every level.
    #[arg(long = "l1-line")]
    pub l1_line: Option<usize>,

    /// L2 cache size in KiB.
    #[arg(long = "l2-size")]
    pub l2_size: Option<usize>,
    /// L2 associativity.
    #[arg(long = "l2-assoc")]
    pub l2_assoc: Option<usize>,

    /// L3 cache size in KiB; `0` removes L3 from the hierarchy.
    #[arg(long = "l3-size")]
    pub l3_size: Option<usize>,
    /// L3 associativity.
    #[arg(long = "l3-assoc")]
    pub l3_assoc: Option<usize>,

    /// Number of hot source lines to report.
    #[arg(long = "hot-lines", default_value_t = 10)]
    pub hot_lines: usize,
}

/// `--prefetch` values, mirroring [`cachesim_core::config::PrefetcherKind`].
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum PrefetchArg {
    /// No prefetching.
    None,
    /// Next-line prefetcher.
    Next,
    /// Stream prefetcher.
    Stream,
    /// Stride prefetcher.
    Stride,
    /// Adaptive (stride-then-stream) prefetcher.
    Adaptive,
    /// Alias for adaptive.
    Intel,
}
