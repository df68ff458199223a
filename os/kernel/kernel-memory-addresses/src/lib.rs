//! # Virtual, Physical and Disk Address Types
//!
//! Strongly typed wrappers for the raw numbers the simulated machine passes
//! around: virtual addresses issued by user programs, physical addresses into
//! main memory, the page and frame numbers derived from them, and disk sector
//! numbers.
//!
//! ## Overview
//!
//! All types are zero-cost `#[repr(transparent)]` wrappers around `u32`, which
//! is the word size of the simulated machine. They exist so that a virtual page
//! number can never be passed where a physical frame number is expected.
//!
//! | Type               | Meaning                                              |
//! |--------------------|------------------------------------------------------|
//! | [`VirtualAddress`] | A byte address in a user address space.              |
//! | [`VirtualPage`]    | A virtual page number (`address / PAGE_SIZE`).       |
//! | [`PhysicalAddress`]| A byte index into main memory.                       |
//! | [`PhysicalFrame`]  | A physical frame number (`address / PAGE_SIZE`).     |
//! | [`PageOffset`]     | The in-page part of an address (`< PAGE_SIZE`).      |
//! | [`SectorNumber`]   | A disk sector index.                                 |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_0212);
//!
//! // Split into a page number and an in-page offset
//! let (page, off) = va.split();
//! assert_eq!(page.number(), 0x212 / PAGE_SIZE);
//!
//! // Place the same offset in a physical frame
//! let pa = PhysicalFrame::new(3).join(off);
//! assert_eq!(pa.as_u32(), 3 * PAGE_SIZE + off.as_u32());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod page_offset;
mod physical_address;
mod physical_frame;
mod sector_number;
mod virtual_address;
mod virtual_page;

pub use page_offset::PageOffset;
pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use sector_number::SectorNumber;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Page size in bytes, as a machine word.
#[allow(clippy::cast_possible_truncation)]
pub const PAGE_SIZE: u32 = kernel_info::machine::PAGE_SIZE as u32;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = PAGE_SIZE.trailing_zeros();

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
};
