//! User memory access through the MMU.
//!
//! Every access first tries the TLB. A miss falls back to the page table and
//! refills the TLB on success; a page fault loads the page and retries once.
//! Any other fault ends the access with [`KernelError::Fault`].

use crate::error::KernelError;
use crate::kernel::Kernel;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::{AccessSize, ExceptionType, Lookup};
use log::trace;

impl Kernel {
    /// Loads `size` bytes at `va` in the running space.
    ///
    /// # Errors
    /// [`KernelError::Fault`] for unrecoverable translation faults; paging
    /// failures.
    pub fn read_mem(&mut self, va: VirtualAddress, size: AccessSize) -> Result<u32, KernelError> {
        let pa = self.resolve(va, size, false)?;
        let value = self.machine.memory.read(pa, size)?;
        trace!("read {value:#x} from {va}");
        Ok(value)
    }

    /// Stores the low `size` bytes of `value` at `va` in the running space.
    ///
    /// # Errors
    /// [`KernelError::Fault`] for unrecoverable translation faults; paging
    /// failures.
    pub fn write_mem(
        &mut self,
        va: VirtualAddress,
        size: AccessSize,
        value: u32,
    ) -> Result<(), KernelError> {
        let pa = self.resolve(va, size, true)?;
        self.machine.memory.write(pa, size, value)?;
        trace!("wrote {value:#x} to {va}");
        Ok(())
    }

    fn resolve(
        &mut self,
        va: VirtualAddress,
        size: AccessSize,
        writing: bool,
    ) -> Result<PhysicalAddress, KernelError> {
        let owner = self.current()?;
        let now = self.machine.tick();
        let fault = move |kind| KernelError::Fault {
            space: owner,
            address: va,
            kind,
        };

        match self
            .machine
            .mmu
            .translate(owner, va, size, writing, Lookup::Tlb, now)
        {
            Ok(pa) => {
                self.machine.stats.tlb_hits += 1;
                return Ok(pa);
            }
            Err(ExceptionType::TlbMiss) => {}
            Err(kind) => return Err(fault(kind)),
        }
        self.space_mut(owner)?.tlb_miss_count += 1;
        self.machine.stats.tlb_misses += 1;

        match self
            .machine
            .mmu
            .translate(owner, va, size, writing, Lookup::PageTable, now)
        {
            Ok(pa) => {
                self.refill(owner, va)?;
                Ok(pa)
            }
            Err(ExceptionType::PageFault) => {
                self.page_load(va)?;
                self.machine
                    .mmu
                    .translate(owner, va, size, writing, Lookup::PageTable, now)
                    .map_err(fault)
            }
            Err(kind) => Err(fault(kind)),
        }
    }
}
