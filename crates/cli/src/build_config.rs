//! Resolves a [`CacheHierarchyConfig`] from the `run` subcommand's flags:
//! a named preset (or `custom`, the library default) as a base, with any
//! `--l1-*`/`--l2-*`/`--l3-*`/`--cores`/`--prefetch*` flags overriding
//! individual fields on top.

use cachesim_core::common::error::DimensionError;
use cachesim_core::config::{CacheHierarchyConfig, PrefetchConfig, PrefetcherKind};
use cachesim_core::presets;

use crate::cli::{PrefetchArg, RunArgs};

impl From<PrefetchArg> for PrefetcherKind {
    fn from(arg: PrefetchArg) -> Self {
        match arg {
            PrefetchArg::None => PrefetcherKind::None,
            PrefetchArg::Next => PrefetcherKind::NextLine,
            PrefetchArg::Stream => PrefetcherKind::Stream,
            PrefetchArg::Stride => PrefetcherKind::Stride,
            PrefetchArg::Adaptive => PrefetcherKind::Adaptive,
            PrefetchArg::Intel => PrefetcherKind::Intel,
        }
    }
}

/// Builds a validated hierarchy configuration from `args`.
///
/// # Errors
///
/// Returns [`DimensionError`] for an unknown preset name, a core count that
/// isn't a positive integer (`0` means auto-detect), or a prefetch degree
/// below `1`.
pub fn resolve(args: &RunArgs) -> Result<CacheHierarchyConfig, DimensionError> {
    let mut config = if args.config.eq_ignore_ascii_case("custom") {
        CacheHierarchyConfig::default()
    } else {
        presets::by_name(&args.config)?
    };

    if let Some(kb) = args.l1_size {
        config.l1d.size_bytes = kb * 1024;
        config.l1i.size_bytes = kb * 1024;
    }
    if let Some(ways) = args.l1_assoc {
        config.l1d.ways = ways;
        config.l1i.ways = ways;
    }
    if let Some(line) = args.l1_line {
        config.l1d.line_bytes = line;
        config.l1i.line_bytes = line;
        config.l2.line_bytes = line;
        config.l3.line_bytes = line;
    }
    if let Some(kb) = args.l2_size {
        config.l2.size_bytes = kb * 1024;
    }
    if let Some(ways) = args.l2_assoc {
        config.l2.ways = ways;
    }
    if let Some(kb) = args.l3_size {
        config.l3.size_bytes = kb * 1024;
    }
    if let Some(ways) = args.l3_assoc {
        config.l3.ways = ways;
    }

    if let Some(prefetch) = args.prefetch {
        config.prefetch = PrefetchConfig {
            kind: prefetch.into(),
            ..config.prefetch
        };
    }
    if let Some(degree) = args.prefetch_degree {
        if degree < 1 {
            return Err(DimensionError::InvalidPrefetchDegree(degree));
        }
        config.prefetch.degree = degree as usize;
    }

    if let Some(cores) = args.cores {
        config.num_cores = resolve_core_count(cores)?;
    }

    Ok(config)
}

/// `0` means "auto-detect" via [`std::thread::available_parallelism`];
/// anything else must be a positive count.
fn resolve_core_count(requested: i64) -> Result<usize, DimensionError> {
    if requested == 0 {
        return Ok(std::thread::available_parallelism().map_or(1, |n| n.get()));
    }
    if requested < 0 {
        return Err(DimensionError::InvalidCoreCount(requested));
    }
    Ok(requested as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RunArgs;

    fn base_args() -> RunArgs {
        RunArgs {
            trace: None,
            config: "educational".to_string(),
            cores: None,
            prefetch: None,
            prefetch_degree: None,
            verbose: false,
            json: false,
            stream: false,
            flamegraph: None,
            fast: false,
            l1_size: None,
            l1_assoc: None,
            l1_line: None,
            l2_size: None,
            l2_assoc: None,
            l3_size: None,
            l3_assoc: None,
            hot_lines: 10,
        }
    }

    #[test]
    fn unknown_preset_is_a_dimension_error() {
        let mut args = base_args();
        args.config = "not-a-cpu".to_string();
        assert!(matches!(resolve(&args), Err(DimensionError::UnknownPreset(_))));
    }

    #[test]
    fn custom_keyword_falls_back_to_default_config() {
        let mut args = base_args();
        args.config = "custom".to_string();
        let cfg = resolve(&args).unwrap();
        assert_eq!(cfg.l1d.size_bytes, CacheHierarchyConfig::default().l1d.size_bytes);
    }

    #[test]
    fn l1_size_override_applies_in_bytes() {
        let mut args = base_args();
        args.l1_size = Some(64);
        let cfg = resolve(&args).unwrap();
        assert_eq!(cfg.l1d.size_bytes, 64 * 1024);
        assert_eq!(cfg.l1i.size_bytes, 64 * 1024);
    }

    #[test]
    fn zero_cores_resolves_to_available_parallelism() {
        let mut args = base_args();
        args.cores = Some(0);
        let cfg = resolve(&args).unwrap();
        assert!(cfg.num_cores >= 1);
    }

    #[test]
    fn negative_cores_is_a_dimension_error() {
        let mut args = base_args();
        args.cores = Some(-1);
        assert!(matches!(resolve(&args), Err(DimensionError::InvalidCoreCount(-1))));
    }

    #[test]
    fn zero_prefetch_degree_is_a_dimension_error() {
        let mut args = base_args();
        args.prefetch_degree = Some(0);
        assert!(matches!(resolve(&args), Err(DimensionError::InvalidPrefetchDegree(0))));
    }
}
