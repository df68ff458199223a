//! The kernel context: the machine plus the address spaces running on it.

use crate::addrspace::AddrSpace;
use crate::error::KernelError;
use crate::machine::Machine;
use crate::noff::NoffHeader;
use crate::stats::Statistics;
use crate::swap::{FileSwap, MemorySwap, SwapError, SwapStore};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_fs::filesys::FileSystem;
use kernel_fs::disk::SynchDisk;
use kernel_info::config::{MachineConfig, PageTableKind};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{ExceptionType, SpaceId};
use log::{debug, info, warn};

#[derive(Debug)]
pub struct Kernel {
    pub(crate) machine: Machine,
    pub(crate) spaces: BTreeMap<SpaceId, AddrSpace>,
    current: Option<SpaceId>,
    next_id: u32,
    fs: Option<Arc<FileSystem>>,
}

impl Kernel {
    /// A kernel whose swap stores live in host memory.
    ///
    /// # Errors
    /// [`KernelError::Config`] for an unusable configuration.
    pub fn new(config: MachineConfig) -> Result<Self, KernelError> {
        Ok(Self {
            machine: Machine::new(config)?,
            spaces: BTreeMap::new(),
            current: None,
            next_id: 1,
            fs: None,
        })
    }

    /// A kernel whose swap stores are files in `fs`.
    ///
    /// # Errors
    /// [`KernelError::Config`] for an unusable configuration.
    pub fn with_file_system(config: MachineConfig, fs: Arc<FileSystem>) -> Result<Self, KernelError> {
        let mut kernel = Self::new(config)?;
        kernel.fs = Some(fs);
        Ok(kernel)
    }

    /// A kernel whose swap stores are files on a freshly formatted disk of
    /// `config.num_sectors()` sectors.
    ///
    /// # Errors
    /// [`KernelError::Config`] for an unusable configuration; formatting
    /// failures.
    pub fn with_swap_disk(config: MachineConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let disk = SynchDisk::new(config.num_sectors());
        let fs = FileSystem::format(disk).map_err(SwapError::from)?;
        Self::with_file_system(config, Arc::new(fs))
    }

    /// The file system holding swap files, if any.
    #[inline]
    #[must_use]
    pub fn file_system(&self) -> Option<&FileSystem> {
        self.fs.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn machine(&self) -> &Machine {
        &self.machine
    }

    #[inline]
    pub const fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &Statistics {
        self.machine.stats()
    }

    /// The running address space.
    ///
    /// # Errors
    /// [`KernelError::NoCurrentSpace`] before the first switch.
    pub const fn current(&self) -> Result<SpaceId, KernelError> {
        match self.current {
            Some(id) => Ok(id),
            None => Err(KernelError::NoCurrentSpace),
        }
    }

    /// # Errors
    /// [`KernelError::UnknownSpace`].
    pub fn space(&self, id: SpaceId) -> Result<&AddrSpace, KernelError> {
        self.spaces.get(&id).ok_or(KernelError::UnknownSpace(id))
    }

    pub(crate) fn space_mut(&mut self, id: SpaceId) -> Result<&mut AddrSpace, KernelError> {
        self.spaces.get_mut(&id).ok_or(KernelError::UnknownSpace(id))
    }

    pub fn spaces(&self) -> impl Iterator<Item = &AddrSpace> {
        self.spaces.values()
    }

    /// Creates an address space from a NOFF executable. Nothing is loaded
    /// into memory until the program touches it.
    ///
    /// # Errors
    /// Malformed executables and swap creation failures.
    pub fn exec(&mut self, executable: &[u8]) -> Result<SpaceId, KernelError> {
        self.reserve_frames()?;
        let header = NoffHeader::parse(executable)?;
        let image = header.image(executable)?;
        let swap: Box<dyn SwapStore> = match &self.fs {
            Some(fs) => Box::new(FileSwap::create(Arc::clone(fs), &image)?),
            None => Box::new(MemorySwap::from_image(&image)),
        };
        self.spawn(swap)
    }

    /// Creates an address space backed by `swap`.
    ///
    /// # Errors
    /// [`KernelError::FramesReserved`] when a linear page table cannot
    /// reserve the residency cap for one more space; page-table registration
    /// failures.
    pub fn spawn(&mut self, swap: Box<dyn SwapStore>) -> Result<SpaceId, KernelError> {
        self.reserve_frames()?;
        let id = SpaceId::new(self.next_id);
        self.next_id += 1;

        let space = AddrSpace::new(id, swap);
        self.machine.mmu.register(id, space.num_pages())?;
        debug!("created {id} with {} pages", space.num_pages());
        self.spaces.insert(id, space);
        Ok(id)
    }

    /// Checks that one more space fits next to the running ones.
    ///
    /// Linear tables evict only within the faulting space; each space is
    /// guaranteed its full residency cap.
    fn reserve_frames(&self) -> Result<(), KernelError> {
        let config = self.machine.config();
        let PageTableKind::Linear { max_resident } = config.page_table() else {
            return Ok(());
        };
        let spaces = self.spaces.len() + 1;
        let frames = config.num_phys_pages();
        if spaces.saturating_mul(max_resident) > frames {
            warn!("{spaces} spaces of {max_resident} resident pages exceed {frames} frames");
            return Err(KernelError::FramesReserved {
                spaces,
                cap: max_resident,
                frames,
            });
        }
        Ok(())
    }

    /// Makes `id` the running space.
    ///
    /// The TLB's reference state is folded into the page table and the TLB
    /// is emptied, so the next space starts with no cached translations.
    ///
    /// # Errors
    /// [`KernelError::UnknownSpace`].
    pub fn switch_to(&mut self, id: SpaceId) -> Result<(), KernelError> {
        self.space(id)?;
        if self.current == Some(id) {
            return Ok(());
        }
        self.machine.mmu.flush_tlb();
        self.current = Some(id);
        debug!("switched to {id}");
        Ok(())
    }

    /// Destroys `id`: its frames are freed, its translations dropped and its
    /// swap store released. Returns the finished space for its counters.
    ///
    /// # Errors
    /// [`KernelError::UnknownSpace`]; frame-map corruption; swap failures.
    pub fn exit(&mut self, id: SpaceId) -> Result<AddrSpace, KernelError> {
        let mut space = self
            .spaces
            .remove(&id)
            .ok_or(KernelError::UnknownSpace(id))?;
        for entry in self.machine.mmu.unregister(id) {
            self.machine.frames.free_frame(entry.physical_frame)?;
        }
        if self.current == Some(id) {
            self.current = None;
        }
        space.release()?;
        info!(
            "{id} finished: {} TLB misses, {} page faults",
            space.tlb_miss_count(),
            space.page_fault_count()
        );
        Ok(space)
    }

    /// Resolves a fault raised while the running space accessed `va`.
    ///
    /// TLB misses refill the TLB, loading the page first if it is not
    /// resident. Page faults load the page. Any other fault terminates the
    /// running space and is returned as [`KernelError::Fault`].
    ///
    /// # Errors
    /// The fault itself when it is not recoverable; paging failures.
    pub fn handle_exception(
        &mut self,
        kind: ExceptionType,
        va: VirtualAddress,
    ) -> Result<(), KernelError> {
        let owner = self.current()?;
        match kind {
            ExceptionType::TlbMiss => {
                self.space_mut(owner)?.tlb_miss_count += 1;
                self.machine.stats.tlb_misses += 1;
                match self.tlb_load(va) {
                    Err(KernelError::Fault {
                        kind: ExceptionType::PageFault,
                        ..
                    }) => self.page_load(va).map(drop),
                    other => other,
                }
            }
            ExceptionType::PageFault => self.page_load(va).map(drop),
            ExceptionType::AddressError | ExceptionType::ReadOnly | ExceptionType::BusError => {
                warn!("{kind} at {va} in {owner}, terminating it");
                self.exit(owner)?;
                Err(KernelError::Fault {
                    space: owner,
                    address: va,
                    kind,
                })
            }
        }
    }
}
