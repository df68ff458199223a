//! # Machine Configuration and Storage Layout
//!
//! This crate is the single source of truth for the geometry of the simulated
//! machine: how large a disk sector is, how many page frames the CPU owns, how
//! big the TLB is, and how a file header is laid out on disk. Every other
//! kernel crate sizes its buffers and tables from the constants defined here.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────────┐
//! │         machine          │      │           filesys            │
//! │  • page / frame sizes    │      │  • sector-number width       │
//! │  • TLB size              │      │  • direct slots per header   │
//! │  • user stack size       │      │  • index-table fan-out       │
//! └────────────┬─────────────┘      └──────────────┬───────────────┘
//!              │                                   │
//!              └──────────────┬────────────────────┘
//!                             ▼
//!               ┌──────────────────────────┐
//!               │          config          │
//!               │  • runtime MachineConfig │
//!               │  • page-table design     │
//!               │  • TLB policy            │
//!               └──────────────────────────┘
//! ```
//!
//! ### Compile-Time Constants
//! The constants in [`machine`] and [`filesys`] are `const` values that are
//! cross-checked with compile-time assertions, so an inconsistent layout (for
//! example a file header that no longer fits in one sector) fails the build.
//!
//! ### Runtime Configuration
//! [`config::MachineConfig`] selects the variable parts of a run: physical
//! frame count, TLB size, disk size, which page-table design backs address
//! translation, and which TLB replacement policy refills the TLB.
//!
//! ```rust
//! use kernel_info::config::{MachineConfig, PageTableKind, TlbPolicyKind};
//!
//! let config = MachineConfig::new()
//!     .with_num_phys_pages(3)
//!     .with_tlb_policy(TlbPolicyKind::Lru)
//!     .with_page_table(PageTableKind::Inverted);
//! assert!(config.validate().is_ok());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod filesys;
pub mod machine;
