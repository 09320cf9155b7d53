//! Hardware preset builders.
//!
//! Each preset is a named, pre-populated [`CacheHierarchyConfig`] describing
//! a real (or close-to-real) CPU's cache geometry; none of these functions
//! contain behavior, only data. [`by_name`] backs the CLI's `--config
//! <preset>` flag and the `presets` subcommand.

use crate::common::error::DimensionError;
use crate::config::{
    CacheConfig, CacheHierarchyConfig, InclusionPolicy, LatencyConfig, PrefetchConfig,
    PrefetcherKind, ReplacementPolicy, TlbConfig, WritePolicy,
};

const KB: usize = 1024;
const MB: usize = 1024 * 1024;

fn l1i_of(l1d: CacheConfig) -> CacheConfig {
    l1d.with_write_policy(WritePolicy::ReadOnly)
}

fn hierarchy(
    l1d: CacheConfig,
    l2: CacheConfig,
    l3: CacheConfig,
    inclusion_policy: InclusionPolicy,
    prefetch: PrefetchConfig,
    latency: LatencyConfig,
) -> CacheHierarchyConfig {
    CacheHierarchyConfig {
        l1d,
        l1i: l1i_of(l1d),
        l2,
        l3,
        inclusion_policy,
        prefetch,
        latency,
        tlb: TlbConfig::default(),
        num_cores: 1,
    }
}

/// Tiny, hand-tuned geometry used throughout the test suite and docs:
/// L1d = 1 KiB 2-way, L2 = 4 KiB 4-way, L3 = 16 KiB 8-way, 64 B lines.
pub fn educational() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(1 * KB, 2, 64, 1),
        CacheConfig::new(4 * KB, 4, 64, 3),
        CacheConfig::new(16 * KB, 8, 64, 9),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::None, 1),
        LatencyConfig {
            l1_cycles: 1,
            l2_cycles: 3,
            l3_cycles: 9,
            memory_cycles: 40,
            tlb_miss_cycles: 5,
        },
    )
}

/// Intel Core (10th gen, Comet Lake): 32K/256K/shared L3, inclusive.
pub fn intel_10th_gen() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 8, 64, 4),
        CacheConfig::new(256 * KB, 4, 64, 12),
        CacheConfig::new(12 * MB, 16, 64, 38),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 2),
        LatencyConfig {
            l1_cycles: 4,
            l2_cycles: 12,
            l3_cycles: 38,
            memory_cycles: 190,
            tlb_miss_cycles: 20,
        },
    )
}

/// Intel Core (11th gen, Rocket/Tiger Lake): larger L2, NINE L3.
pub fn intel_11th_gen() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(48 * KB, 12, 64, 5),
        CacheConfig::new(1280 * KB, 10, 64, 14),
        CacheConfig::new(12 * MB, 12, 64, 42),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 2),
        LatencyConfig {
            l1_cycles: 5,
            l2_cycles: 14,
            l3_cycles: 42,
            memory_cycles: 200,
            tlb_miss_cycles: 22,
        },
    )
}

/// Intel Core (12th gen, Alder Lake P-core): hybrid-era L2 growth continues.
pub fn intel_12th_gen() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(48 * KB, 12, 64, 5),
        CacheConfig::new(1280 * KB, 10, 64, 13),
        CacheConfig::new(30 * MB, 12, 64, 42),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 3),
        LatencyConfig {
            l1_cycles: 5,
            l2_cycles: 13,
            l3_cycles: 42,
            memory_cycles: 195,
            tlb_miss_cycles: 22,
        },
    )
}

/// Intel Core (13th gen, Raptor Lake P-core).
pub fn intel_13th_gen() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(48 * KB, 12, 64, 5),
        CacheConfig::new(2 * MB, 16, 64, 16),
        CacheConfig::new(36 * MB, 12, 64, 44),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 3),
        LatencyConfig {
            l1_cycles: 5,
            l2_cycles: 16,
            l3_cycles: 44,
            memory_cycles: 195,
            tlb_miss_cycles: 22,
        },
    )
}

/// Intel Core (14th gen, Raptor Lake Refresh P-core): same geometry as 13th
/// gen, slightly tighter L3 latency from the higher ring clock.
pub fn intel_14th_gen() -> CacheHierarchyConfig {
    let mut cfg = intel_13th_gen();
    cfg.latency.l3_cycles = 42;
    cfg
}

/// Xeon Scalable (Ice Lake SP): large private L2, NINE L3 slice.
pub fn xeon_ice_lake() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(48 * KB, 12, 64, 5),
        CacheConfig::new(1280 * KB, 20, 64, 14),
        CacheConfig::new(1536 * KB, 12, 64, 45),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Stream, 2),
        LatencyConfig {
            l1_cycles: 5,
            l2_cycles: 14,
            l3_cycles: 45,
            memory_cycles: 210,
            tlb_miss_cycles: 24,
        },
    )
}

/// Xeon Scalable (Sapphire Rapids): even larger private mid-level cache.
pub fn xeon_sapphire_rapids() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(48 * KB, 12, 64, 5),
        CacheConfig::new(2 * MB, 16, 64, 17),
        CacheConfig::new(1920 * KB, 12, 64, 48),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Stream, 2),
        LatencyConfig {
            l1_cycles: 5,
            l2_cycles: 17,
            l3_cycles: 48,
            memory_cycles: 215,
            tlb_miss_cycles: 24,
        },
    )
}

/// AMD Zen 2 (Matisse/Rome): small exclusive L2, large victim-cache L3.
pub fn zen2() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 8, 64, 4),
        CacheConfig::new(512 * KB, 8, 64, 12),
        CacheConfig::new(16 * MB, 16, 64, 39),
        InclusionPolicy::Exclusive,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 2),
        LatencyConfig {
            l1_cycles: 4,
            l2_cycles: 12,
            l3_cycles: 39,
            memory_cycles: 200,
            tlb_miss_cycles: 20,
        },
    )
}

/// AMD Zen 3 (Vermeer/Milan): unified 32 MiB L3 per CCD, exclusive L2.
pub fn zen3() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 8, 64, 4),
        CacheConfig::new(512 * KB, 8, 64, 12),
        CacheConfig::new(32 * MB, 16, 64, 38),
        InclusionPolicy::Exclusive,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 3),
        LatencyConfig {
            l1_cycles: 4,
            l2_cycles: 12,
            l3_cycles: 38,
            memory_cycles: 195,
            tlb_miss_cycles: 20,
        },
    )
}

/// AMD Zen 4 (Raphael/Genoa): larger L2, same exclusive discipline.
pub fn zen4() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 8, 64, 4),
        CacheConfig::new(1 * MB, 8, 64, 13),
        CacheConfig::new(32 * MB, 16, 64, 40),
        InclusionPolicy::Exclusive,
        PrefetchConfig::new(PrefetcherKind::Adaptive, 3),
        LatencyConfig {
            l1_cycles: 4,
            l2_cycles: 13,
            l3_cycles: 40,
            memory_cycles: 190,
            tlb_miss_cycles: 20,
        },
    )
}

/// EPYC Milan (server Zen 3): same per-core geometry as desktop Zen 3 with
/// higher memory latency.
pub fn epyc_milan() -> CacheHierarchyConfig {
    let mut cfg = zen3();
    cfg.latency.memory_cycles = 230;
    cfg
}

/// EPYC Genoa (server Zen 4): same per-core geometry as desktop Zen 4 with
/// higher memory latency from the larger socket.
pub fn epyc_genoa() -> CacheHierarchyConfig {
    let mut cfg = zen4();
    cfg.latency.memory_cycles = 220;
    cfg
}

/// Apple M1: very large L1 and shared L2 ("system level cache" modeled as
/// L3), inclusive by design choice (Apple does not publish the discipline).
pub fn apple_m1() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(128 * KB, 8, 64, 3),
        CacheConfig::new(4 * MB, 12, 64, 16),
        CacheConfig::new(8 * MB, 16, 64, 30),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::Stream, 4),
        LatencyConfig {
            l1_cycles: 3,
            l2_cycles: 16,
            l3_cycles: 30,
            memory_cycles: 160,
            tlb_miss_cycles: 15,
        },
    )
}

/// Apple M2: incremental L2/SLC growth over M1.
pub fn apple_m2() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(128 * KB, 8, 64, 3),
        CacheConfig::new(4 * MB, 12, 64, 15),
        CacheConfig::new(8 * MB, 16, 64, 28),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::Stream, 4),
        LatencyConfig {
            l1_cycles: 3,
            l2_cycles: 15,
            l3_cycles: 28,
            memory_cycles: 155,
            tlb_miss_cycles: 15,
        },
    )
}

/// Apple M3: further SLC growth.
pub fn apple_m3() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(128 * KB, 8, 64, 3),
        CacheConfig::new(4 * MB, 12, 64, 14),
        CacheConfig::new(12 * MB, 16, 64, 27),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::Stream, 4),
        LatencyConfig {
            l1_cycles: 3,
            l2_cycles: 14,
            l3_cycles: 27,
            memory_cycles: 150,
            tlb_miss_cycles: 15,
        },
    )
}

/// AWS Graviton 3 (Neoverse V1): 64 KiB L1, large private L2, no true L3.
pub fn graviton3() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(64 * KB, 4, 64, 4),
        CacheConfig::new(1 * MB, 8, 64, 11),
        CacheConfig::absent(),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Stride, 2),
        LatencyConfig {
            l1_cycles: 4,
            l2_cycles: 11,
            l3_cycles: 0,
            memory_cycles: 170,
            tlb_miss_cycles: 18,
        },
    )
}

/// Raspberry Pi 4 (Cortex-A72): small L1, no private L2, shared L2 acts as
/// the last level.
pub fn raspberry_pi4() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 2, 64, 3),
        CacheConfig::new(1 * MB, 16, 64, 16),
        CacheConfig::absent(),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::NextLine, 1),
        LatencyConfig {
            l1_cycles: 3,
            l2_cycles: 16,
            l3_cycles: 0,
            memory_cycles: 120,
            tlb_miss_cycles: 12,
        },
    )
}

/// Cortex-A53 embedded configuration: small two-level hierarchy typical of
/// a microcontroller-class application core.
pub fn cortex_a53_embedded() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 2, 64, 2),
        CacheConfig::new(256 * KB, 8, 64, 10),
        CacheConfig::absent(),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::None, 1),
        LatencyConfig {
            l1_cycles: 2,
            l2_cycles: 10,
            l3_cycles: 0,
            memory_cycles: 90,
            tlb_miss_cycles: 10,
        },
    )
}

/// SiFive U74 (RISC-V, in-order-issue applications core): modest L1/L2.
pub fn sifive_u74() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(32 * KB, 8, 64, 3),
        CacheConfig::new(2 * MB, 16, 64, 15),
        CacheConfig::absent(),
        InclusionPolicy::Inclusive,
        PrefetchConfig::new(PrefetcherKind::NextLine, 1),
        LatencyConfig {
            l1_cycles: 3,
            l2_cycles: 15,
            l3_cycles: 0,
            memory_cycles: 110,
            tlb_miss_cycles: 12,
        },
    )
}

/// SiFive P670 (higher-performance out-of-order RISC-V core).
pub fn sifive_p670() -> CacheHierarchyConfig {
    hierarchy(
        CacheConfig::new(64 * KB, 8, 64, 4),
        CacheConfig::new(2 * MB, 16, 64, 14),
        CacheConfig::absent(),
        InclusionPolicy::Nine,
        PrefetchConfig::new(PrefetcherKind::Stride, 2),
        LatencyConfig {
            l1_cycles: 4,
            l2_cycles: 14,
            l3_cycles: 0,
            memory_cycles: 115,
            tlb_miss_cycles: 13,
        },
    )
}

/// Every preset's name, in the order they're matched by [`by_name`].
pub const PRESET_NAMES: &[&str] = &[
    "educational",
    "intel-10th-gen",
    "intel-11th-gen",
    "intel-12th-gen",
    "intel-13th-gen",
    "intel-14th-gen",
    "xeon-ice-lake",
    "xeon-sapphire-rapids",
    "zen2",
    "zen3",
    "zen4",
    "epyc-milan",
    "epyc-genoa",
    "apple-m1",
    "apple-m2",
    "apple-m3",
    "graviton3",
    "raspberry-pi4",
    "cortex-a53-embedded",
    "sifive-u74",
    "sifive-p670",
];

/// Looks up a preset by its kebab-case name.
///
/// # Errors
///
/// Returns [`DimensionError::UnknownPreset`] if `name` matches none of
/// [`PRESET_NAMES`].
pub fn by_name(name: &str) -> Result<CacheHierarchyConfig, DimensionError> {
    Ok(match name {
        "educational" => educational(),
        "intel-10th-gen" => intel_10th_gen(),
        "intel-11th-gen" => intel_11th_gen(),
        "intel-12th-gen" => intel_12th_gen(),
        "intel-13th-gen" => intel_13th_gen(),
        "intel-14th-gen" => intel_14th_gen(),
        "xeon-ice-lake" => xeon_ice_lake(),
        "xeon-sapphire-rapids" => xeon_sapphire_rapids(),
        "zen2" => zen2(),
        "zen3" => zen3(),
        "zen4" => zen4(),
        "epyc-milan" => epyc_milan(),
        "epyc-genoa" => epyc_genoa(),
        "apple-m1" => apple_m1(),
        "apple-m2" => apple_m2(),
        "apple-m3" => apple_m3(),
        "graviton3" => graviton3(),
        "raspberry-pi4" => raspberry_pi4(),
        "cortex-a53-embedded" => cortex_a53_embedded(),
        "sifive-u74" => sifive_u74(),
        "sifive-p670" => sifive_p670(),
        other => return Err(DimensionError::UnknownPreset(other.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_preset_resolves_and_validates() {
        for name in PRESET_NAMES {
            let cfg = by_name(name).unwrap_or_else(|_| panic!("preset {name} should resolve"));
            assert!(cfg.l1d.validate().is_ok(), "{name} l1d geometry");
            assert!(cfg.l1i.validate().is_ok(), "{name} l1i geometry");
            assert!(cfg.l2.validate().is_ok(), "{name} l2 geometry");
            if !cfg.l3.is_absent() {
                assert!(cfg.l3.validate().is_ok(), "{name} l3 geometry");
            }
        }
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert!(matches!(
            by_name("not-a-real-cpu"),
            Err(DimensionError::UnknownPreset(_))
        ));
    }

    #[test]
    fn educational_geometry_has_expected_l1_shape() {
        let cfg = educational();
        let l1_geom = cfg.l1d.validate().unwrap();
        assert_eq!(l1_geom.num_sets, 8);
        assert_eq!(cfg.l1d.ways, 2);
    }
}
