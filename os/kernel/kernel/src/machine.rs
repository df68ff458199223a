//! The simulated machine: physical memory, its frame map, the MMU and the
//! clock.

use crate::error::KernelError;
use crate::memory::MainMemory;
use crate::stats::Statistics;
use kernel_alloc::frame_alloc::{BitmapFrameAlloc, FrameAlloc};
use kernel_info::config::MachineConfig;
use kernel_memory_addresses::PhysicalFrame;
use kernel_vmem::Mmu;

#[derive(Debug)]
pub struct Machine {
    config: MachineConfig,
    pub(crate) memory: MainMemory,
    pub(crate) frames: BitmapFrameAlloc,
    pub(crate) mmu: Mmu,
    pub(crate) stats: Statistics,
}

impl Machine {
    /// Builds a machine after validating `config`.
    ///
    /// # Errors
    /// [`KernelError::Config`] for an unusable configuration.
    pub fn new(config: MachineConfig) -> Result<Self, KernelError> {
        config.validate()?;
        Ok(Self {
            memory: MainMemory::new(config.num_phys_pages()),
            frames: BitmapFrameAlloc::new(config.num_phys_pages()),
            mmu: Mmu::new(&config),
            stats: Statistics::default(),
            config,
        })
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &MainMemory {
        &self.memory
    }

    #[inline]
    #[must_use]
    pub const fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    /// Direct MMU access, for installing translations by hand.
    #[inline]
    pub const fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &Statistics {
        &self.stats
    }

    #[inline]
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.frames.num_free()
    }

    #[inline]
    #[must_use]
    pub fn is_frame_in_use(&self, frame: PhysicalFrame) -> bool {
        self.frames.is_allocated(frame)
    }

    /// Current machine time.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.stats.total_ticks
    }

    /// Advances the clock by one tick and returns the new time.
    pub(crate) const fn tick(&mut self) -> u64 {
        self.stats.total_ticks += 1;
        self.stats.total_ticks
    }
}
