//! Static re-reference interval prediction (SRRIP).
//!
//! Each line carries a 2-bit RRPV (`CacheLine::rrip_value`, 0..=3). A hit
//! predicts near-immediate re-reference (RRPV=0); an insert predicts a
//! longer interval (RRPV=2). Eviction picks the first line already
//! predicted furthest away (RRPV=3); if none qualifies, every line ages by
//! one (saturating) and the search retries.

use super::super::CacheLine;
use super::ReplacementPolicy;

/// Insert value used by plain SRRIP.
pub const SRRIP_INSERT_RRPV: u8 = 2;
/// Maximum RRPV value (saturating).
pub const MAX_RRPV: u8 = 3;

/// SRRIP victim selection, reused by [`super::BrripPolicy`] which only
/// differs in its insert rule.
pub(super) fn select_victim_by_rrpv(lines: &mut [CacheLine]) -> usize {
    loop {
        if let Some(way) = lines.iter().position(|l| l.rrip_value >= MAX_RRPV) {
            return way;
        }
        for line in lines.iter_mut() {
            line.rrip_value = line.rrip_value.saturating_add(1).min(MAX_RRPV);
        }
    }
}

/// SRRIP replacement policy.
#[derive(Default)]
pub struct SrripPolicy;

impl SrripPolicy {
    /// Creates an SRRIP policy. State lives entirely on [`CacheLine`].
    pub fn new(_sets: usize, _ways: usize) -> Self {
        Self
    }
}

impl ReplacementPolicy for SrripPolicy {
    fn select_victim(&mut self, _set: usize, lines: &mut [CacheLine]) -> usize {
        select_victim_by_rrpv(lines)
    }

    fn on_access(&mut self, _set: usize, way: usize, lines: &mut [CacheLine], _clock: u64, is_insert: bool) {
        lines[way].rrip_value = if is_insert { SRRIP_INSERT_RRPV } else { 0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_the_line_with_max_rrpv() {
        let mut lines = vec![CacheLine::default(); 4];
        lines[2].rrip_value = MAX_RRPV;
        let mut policy = SrripPolicy::new(1, 4);
        assert_eq!(policy.select_victim(0, &mut lines), 2);
    }

    #[test]
    fn ages_every_line_when_none_at_max() {
        let mut lines = vec![CacheLine::default(); 2];
        lines[0].rrip_value = 1;
        lines[1].rrip_value = 1;
        let mut policy = SrripPolicy::new(1, 2);
        let victim = policy.select_victim(0, &mut lines);
        assert_eq!(victim, 0);
        assert_eq!(lines[1].rrip_value, MAX_RRPV);
    }

    #[test]
    fn hit_sets_rrpv_zero_insert_sets_two() {
        let mut lines = vec![CacheLine::default(); 2];
        let mut policy = SrripPolicy::new(1, 2);
        policy.on_access(0, 0, &mut lines, 0, true);
        assert_eq!(lines[0].rrip_value, SRRIP_INSERT_RRPV);
        policy.on_access(0, 0, &mut lines, 0, false);
        assert_eq!(lines[0].rrip_value, 0);
    }
}
