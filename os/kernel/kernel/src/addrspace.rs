//! Per-program address-space bookkeeping.

use crate::swap::{SwapError, SwapStore};
use alloc::boxed::Box;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_vmem::SpaceId;

/// Distance kept between the initial stack pointer and the end of the space.
const STACK_MARGIN: u32 = 16;

/// A user program's virtual memory: its size, its swap store and the
/// fault counters charged to it.
#[derive(Debug)]
pub struct AddrSpace {
    id: SpaceId,
    num_pages: usize,
    swap: Box<dyn SwapStore>,
    pub(crate) tlb_miss_count: u64,
    pub(crate) page_fault_count: u64,
}

impl AddrSpace {
    /// A space as large as `swap`.
    #[must_use]
    pub fn new(id: SpaceId, swap: Box<dyn SwapStore>) -> Self {
        Self {
            id,
            num_pages: swap.num_pages(),
            swap,
            tlb_miss_count: 0,
            page_fault_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> SpaceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn num_pages(&self) -> usize {
        self.num_pages
    }

    #[inline]
    #[must_use]
    pub const fn tlb_miss_count(&self) -> u64 {
        self.tlb_miss_count
    }

    #[inline]
    #[must_use]
    pub const fn page_fault_count(&self) -> u64 {
        self.page_fault_count
    }

    #[inline]
    #[must_use]
    pub fn swap(&self) -> &dyn SwapStore {
        self.swap.as_ref()
    }

    pub(crate) fn swap_mut(&mut self) -> &mut dyn SwapStore {
        self.swap.as_mut()
    }

    /// Initial stack pointer: just below the end of the space.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn initial_stack_pointer(&self) -> VirtualAddress {
        VirtualAddress::new(
            (self.num_pages as u32)
                .saturating_mul(PAGE_SIZE)
                .saturating_sub(STACK_MARGIN),
        )
    }

    /// Gives up the swap store.
    pub(crate) fn release(&mut self) -> Result<(), SwapError> {
        self.swap.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::MemorySwap;

    #[test]
    fn sized_by_swap() {
        let space = AddrSpace::new(SpaceId::new(3), Box::new(MemorySwap::zeroed(4)));
        assert_eq!(space.num_pages(), 4);
        assert_eq!(
            space.initial_stack_pointer().as_u32(),
            4 * PAGE_SIZE - STACK_MARGIN
        );
        assert_eq!(space.tlb_miss_count(), 0);
        assert_eq!(space.page_fault_count(), 0);
    }
}
