use crate::memory::MemoryError;
use crate::noff::NoffError;
use crate::swap::SwapError;
use kernel_alloc::bitmap::BitmapError;
use kernel_info::config::ConfigError;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::page_table::MappingError;
use kernel_vmem::{ExceptionType, SpaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("no address space is running")]
    NoCurrentSpace,
    #[error("{0} does not exist")]
    UnknownSpace(SpaceId),
    /// A translation fault the kernel cannot resolve.
    #[error("{kind} at {address} in {space}")]
    Fault {
        space: SpaceId,
        address: VirtualAddress,
        kind: ExceptionType,
    },
    /// Memory is full and no resident page may be evicted for `0`.
    #[error("no page can be evicted for {0}")]
    NoVictim(SpaceId),
    /// A linear page table cannot guarantee `cap` frames to each of
    /// `spaces` address spaces.
    #[error("{spaces} address spaces of {cap} resident pages do not fit in {frames} frames")]
    FramesReserved {
        spaces: usize,
        cap: usize,
        frames: usize,
    },
    #[error("no free frame after eviction")]
    NoFreeFrame,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("frame map: {0}")]
    Frames(#[from] BitmapError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Swap(#[from] SwapError),
    #[error(transparent)]
    Executable(#[from] NoffError),
}

impl KernelError {
    /// Kernel bookkeeping is inconsistent and the machine cannot go on.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::NoVictim(_)
            | Self::NoFreeFrame
            | Self::Mapping(_)
            | Self::Frames(_)
            | Self::Memory(_) => true,
            Self::NoCurrentSpace
            | Self::UnknownSpace(_)
            | Self::Fault { .. }
            | Self::FramesReserved { .. }
            | Self::Config(_)
            | Self::Swap(_)
            | Self::Executable(_) => false,
        }
    }
}
