//! # Kernel
//!
//! Runs user address spaces on the simulated machine with demand paging.
//!
//! ## Components
//!
//! ```text
//! ┌──────────────────────── Kernel ────────────────────────┐
//! │ exec / spawn / switch_to / exit / handle_exception     │
//! │ read_mem / write_mem         (mem)                     │
//! │ page_load / page_swap / tlb_load (paging)              │
//! ├──────────────┬───────────────────────┬─────────────────┤
//! │ AddrSpace    │ Machine               │ SwapStore       │
//! │  counters    │  MainMemory           │  MemorySwap     │
//! │  swap store  │  frame bitmap         │  FileSwap ─► kernel_fs
//! │              │  Mmu ─► kernel_vmem   │                 │
//! │              │  Statistics           │                 │
//! └──────────────┴───────────────────────┴─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kernel::Kernel;
//! use kernel::noff::build_executable;
//! use kernel_info::config::MachineConfig;
//! use kernel_memory_addresses::VirtualAddress;
//! use kernel_vmem::AccessSize;
//!
//! let mut kernel = Kernel::new(MachineConfig::new()).unwrap();
//! let id = kernel.exec(&build_executable(&[0x2A, 0, 0, 0], &[], 0)).unwrap();
//! kernel.switch_to(id).unwrap();
//!
//! let word = kernel.read_mem(VirtualAddress::new(0), AccessSize::Word).unwrap();
//! assert_eq!(word, 0x2A);
//! assert_eq!(kernel.space(id).unwrap().page_fault_count(), 1);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod addrspace;
mod error;
mod kernel;
pub mod machine;
mod mem;
pub mod memory;
pub mod noff;
mod paging;
pub mod stats;
pub mod swap;

pub use addrspace::AddrSpace;
pub use error::KernelError;
pub use kernel::Kernel;
