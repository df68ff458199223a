//! # Address Translation
//!
//! The memory-management unit of the simulated machine: a small TLB in front
//! of an authoritative page table, and the translation routine that walks
//! them.
//!
//! ## Translation Path
//!
//! ```text
//!  VirtualAddress ──► alignment check ──► (vpn, offset)
//!                                             │
//!                     ┌───────────────────────┴───────────────────────┐
//!                     │ Lookup::Tlb                                   │ Lookup::PageTable
//!                     ▼                                               ▼
//!            associative TLB scan                         PageMapping::lookup(owner, vpn)
//!             miss ⇒ TlbMiss                                 miss ⇒ PageFault
//!                     └───────────────────────┬───────────────────────┘
//!                                             ▼
//!                         read-only on write ⇒ ReadOnly
//!                         frame ≥ frames     ⇒ BusError
//!                                             ▼
//!                         set use (and dirty), stamp last use
//!                                             ▼
//!                                   frame · PAGE_SIZE + offset
//! ```
//!
//! ## Page-Table Designs
//!
//! Both designs implement [`PageMapping`](page_table::PageMapping):
//!
//! | Design    | Storage                                   | Victim scope        |
//! |-----------|-------------------------------------------|---------------------|
//! | Inverted  | one entry per physical frame, owner-tagged | every resident page |
//! | Linear    | one table per space, indexed by vpn        | the faulting space  |
//!
//! ## TLB Policies
//!
//! When every TLB slot is valid, a [`TlbPolicy`](tlb::TlbPolicy) picks the
//! slot to reuse: [`FifoPolicy`](tlb::FifoPolicy) evicts the oldest fill and
//! [`LruPolicy`](tlb::LruPolicy) the least recently used entry. The evicted
//! entry's use and dirty state is merged back into the page table before the
//! slot is overwritten.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod entry;
pub mod page_table;
pub mod tlb;
pub mod translate;

pub use entry::{EntryFlags, SpaceId, TranslationEntry};
pub use translate::{AccessSize, ExceptionType, Lookup, Mmu};
