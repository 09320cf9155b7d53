//! Bimodal re-reference interval prediction (BRRIP).
//!
//! Shares SRRIP's eviction rule; differs only in the insert policy, which
//! predicts a long re-reference interval (RRPV=3) most of the time and a
//! short one (RRPV=2) with probability 1/32, so a thrashing working set
//! doesn't evict every other line before it can be reused.

use super::super::CacheLine;
use super::srrip::{select_victim_by_rrpv, MAX_RRPV, SRRIP_INSERT_RRPV};
use super::ReplacementPolicy;

/// `1` in `BIMODAL_DENOMINATOR` inserts use the short interval.
const BIMODAL_DENOMINATOR: u64 = 32;

/// BRRIP replacement policy.
pub struct BrripPolicy {
    state: u64,
}

impl BrripPolicy {
    /// Creates a BRRIP policy, seeded for its probabilistic insert.
    pub fn new(_sets: usize, _ways: usize) -> Self {
        Self {
            state: 0xD1B5_4A32_D192_ED03,
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl ReplacementPolicy for BrripPolicy {
    fn select_victim(&mut self, _set: usize, lines: &mut [CacheLine]) -> usize {
        select_victim_by_rrpv(lines)
    }

    fn on_access(&mut self, _set: usize, way: usize, lines: &mut [CacheLine], _clock: u64, is_insert: bool) {
        if !is_insert {
            lines[way].rrip_value = 0;
            return;
        }
        let short_interval = self.next() % BIMODAL_DENOMINATOR == 0;
        lines[way].rrip_value = if short_interval { SRRIP_INSERT_RRPV } else { MAX_RRPV };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_mostly_at_max_rrpv() {
        let mut lines = vec![CacheLine::default(); 1];
        let mut policy = BrripPolicy::new(1, 1);
        let mut long_interval_count = 0;
        for _ in 0..1000 {
            policy.on_access(0, 0, &mut lines, 0, true);
            if lines[0].rrip_value == MAX_RRPV {
                long_interval_count += 1;
            }
        }
        assert!(long_interval_count > 900);
    }

    #[test]
    fn hit_always_resets_to_zero() {
        let mut lines = vec![CacheLine::default(); 1];
        lines[0].rrip_value = MAX_RRPV;
        let mut policy = BrripPolicy::new(1, 1);
        policy.on_access(0, 0, &mut lines, 0, false);
        assert_eq!(lines[0].rrip_value, 0);
    }
}
