//! Human-readable report printing, mirroring the bracketed-section style
//! of a cache simulator's terminal summary.

use cachesim_core::stats::{CacheLevelStats, RunResult};

fn print_level(name: &str, stats: &CacheLevelStats) {
    let total = stats.hits + stats.misses;
    if total > 0 {
        println!(
            "  {:<20} {:.2}% hit rate ({} / {})",
            name,
            stats.hit_rate * 100.0,
            stats.hits,
            total
        );
        println!(
            "    {:<18} writebacks {:<8} compulsory {:<8} capacity {:<8} conflict {}",
            "", stats.writebacks, stats.compulsory, stats.capacity, stats.conflict
        );
    } else {
        println!("  {:<20} No accesses", name);
    }
}

/// Prints `result` as a sequence of bracketed sections to stdout.
pub fn print(result: &RunResult) {
    println!("\n=========================================================");

    println!("\n[Memory Hierarchy]");
    if let Some(single) = &result.single_core {
        print_level("L1 D-Cache:", &single.l1d);
        print_level("L1 I-Cache:", &single.l1i);
        print_level("L2 Cache:", &single.l2);
        if let Some(l3) = &single.l3 {
            print_level("L3 Cache:", l3);
        }
        if let Some(prefetch) = &single.prefetch {
            println!("\n[Prefetcher]");
            println!(
                "  Issued: {:<10} Useful: {:<10} Useless: {:<10} Accuracy: {:.2}%",
                prefetch.issued,
                prefetch.useful,
                prefetch.useless,
                prefetch.accuracy * 100.0
            );
        }
    } else if let Some(multi) = &result.multi_core {
        for (core, l1d) in multi.l1_per_core.iter().enumerate() {
            print_level(&format!("Core {core} L1 D-Cache:"), l1d);
        }
        print_level("L2 Cache:", &multi.l2);
        if let Some(l3) = &multi.l3 {
            print_level("L3 Cache:", l3);
        }
        println!("\n[Coherence]");
        println!("  Invalidations:        {}", multi.coherence_invalidations);
        println!("  False-sharing lines:  {}", multi.false_sharing_events);
        for (core, prefetch) in multi.prefetch_per_core.iter().enumerate() {
            if let Some(prefetch) = prefetch {
                println!(
                    "  Core {core} prefetcher:    issued {:<8} useful {:<8} accuracy {:.2}%",
                    prefetch.issued,
                    prefetch.useful,
                    prefetch.accuracy * 100.0
                );
            }
        }
    }

    println!("\n[TLB]");
    for (idx, tlb) in result.tlb.iter().enumerate() {
        let total = tlb.dtlb.hits + tlb.dtlb.misses;
        if total > 0 {
            println!(
                "  DTLB[{idx}]:             {:.2}% hit rate ({} / {})",
                tlb.dtlb.hit_rate * 100.0,
                tlb.dtlb.hits,
                total
            );
        } else {
            println!("  DTLB[{idx}]:             No accesses");
        }
    }

    if !result.false_sharing.is_empty() {
        println!("\n[False Sharing]");
        for report in &result.false_sharing {
            println!(
                "  0x{:<14x} threads {:<4} offsets {:<4} accesses {}",
                report.line_address, report.thread_count, report.offset_count, report.access_count
            );
        }
    }

    if !result.hot_lines.is_empty() {
        println!("\n[Hot Source Lines]");
        for line in &result.hot_lines {
            println!(
                "  {:<40} hits {:<8} misses {:<8} threads {}",
                format!("{}:{}", line.file, line.line),
                line.hits,
                line.misses,
                line.thread_count
            );
        }
    }

    println!("\n[Timing]");
    println!("  Total Cycles:         {}", result.timing.total_cycles);
    println!("  Average Latency:      {:.2} cycles/access", result.timing.avg_latency);
    println!(
        "    L1 {:<10} L2 {:<10} L3 {:<10} Memory {:<10} TLB-miss {}",
        result.timing.l1_cycles,
        result.timing.l2_cycles,
        result.timing.l3_cycles,
        result.timing.memory_cycles,
        result.timing.tlb_miss_cycles
    );

    println!("\n[Intrinsics]");
    println!(
        "  sw-prefetch {:<8} memcpy {:<8} memmove {:<8} memset {:<8} vector {:<8} cross-line {}",
        result.sw_prefetch_issued,
        result.memcpy_count,
        result.memmove_count,
        result.memset_count,
        result.vector_accesses,
        result.cross_line_accesses
    );
    println!(
        "  atomic-loads {:<8} atomic-rmw {:<8} atomic-cmpxchg {}",
        result.atomic_loads, result.atomic_rmw, result.atomic_cmpxchg
    );

    println!("=========================================================\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_does_not_panic_on_default_result() {
        print(&RunResult::default());
    }

    #[test]
    fn print_does_not_panic_on_populated_result() {
        let result = RunResult {
            single_core: Some(cachesim_core::stats::SingleCoreStats::default()),
            hot_lines: vec![cachesim_core::stats::HotLine {
                file: "a.c".to_string(),
                line: 12,
                hits: 9,
                misses: 1,
                thread_count: 1,
            }],
            ..RunResult::default()
        };
        print(&result);
    }
}
