//! # Simulated Disk and Indexed File Storage
//!
//! This crate stores files on a simulated sector-addressed disk. Each file is
//! described by a [`FileHeader`](filehdr::FileHeader) that fits in exactly one
//! sector and maps logical sectors to disk sectors through three tiers of
//! pointers.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   FileSystem                        │
//! │    • format / mount of the persisted free map       │
//! │    • create / open / remove by header sector        │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │               OpenFile / FileHeader                 │
//! │    • byte ranges → logical sectors → disk sectors   │
//! │    • all-or-nothing growth through index tables     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                    SynchDisk                        │
//! │    • one request at a time                          │
//! │    • seek / rotation latency accounting             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Header Tiers
//!
//! With `D = NUM_DIRECT - 2` direct slots and `S = SECTORS_IN_SECTOR` entries
//! per index table:
//!
//! | Logical sector `n`   | Resolved through                                       |
//! |----------------------|--------------------------------------------------------|
//! | `n < D`              | header slot `n`                                        |
//! | `n < D + S`          | single-indirect table, entry `n - D`                   |
//! | `n < D + S + S²`     | double-indirect table, sub-table `(n-D-S)/S`, entry `(n-D-S)%S` |
//!
//! Index tables are filled contiguously from entry 0; files are never sparse.
//!
//! ## Example
//!
//! ```rust
//! use kernel_fs::disk::SynchDisk;
//! use kernel_fs::filesys::FileSystem;
//!
//! let fs = FileSystem::format(SynchDisk::new(256)).unwrap();
//! let sector = fs.create(300).unwrap();
//! let mut file = fs.open(sector, true).unwrap();
//! file.write_at(b"hello", 0).unwrap();
//!
//! let mut buf = [0u8; 5];
//! file.read_at(&mut buf, 0).unwrap();
//! assert_eq!(&buf, b"hello");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod disk;
pub mod filehdr;
pub mod filesys;
pub mod index_table;
pub mod open_file;

/// Raw contents of one disk sector.
pub type SectorBuf = [u8; kernel_info::machine::SECTOR_SIZE];
