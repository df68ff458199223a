//! Machine-wide performance counters.

use log::info;

/// Counters accumulated over one run of the machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// One tick per user memory access.
    pub total_ticks: u64,
    pub tlb_hits: u64,
    pub tlb_misses: u64,
    pub page_faults: u64,
    /// Pages removed from memory to make room.
    pub evictions: u64,
    /// Evicted pages that were dirty and written to swap.
    pub write_backs: u64,
}

impl Statistics {
    /// Fraction of translations served by the TLB.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tlb_hit_ratio(&self) -> f64 {
        let lookups = self.tlb_hits + self.tlb_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.tlb_hits as f64 / lookups as f64
    }

    /// Logs the counters.
    pub fn report(&self) {
        info!(
            "ticks {}, TLB hits {}, TLB misses {}, page faults {}, evictions {} ({} written back)",
            self.total_ticks,
            self.tlb_hits,
            self.tlb_misses,
            self.page_faults,
            self.evictions,
            self.write_backs
        );
    }
}
