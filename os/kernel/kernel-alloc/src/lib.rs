//! # Block and Frame Allocation
//!
//! This crate tracks ownership of the two fixed-size resources of the
//! simulated machine: disk sectors and physical page frames. Both are managed
//! by the same primitive, a [`Bitmap`](bitmap::Bitmap) with one bit per block.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 BitmapFrameAlloc                    │
//! │    • hands out physical frames for demand paging    │
//! │    • frames released on eviction / space teardown   │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                      Bitmap                         │
//! │    • lowest-numbered free block first               │
//! │    • double free / double mark detection            │
//! │    • byte image for the on-disk free map            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! A block is either free or owned by exactly one entity. The bitmap enforces
//! the half of that it can see: marking a used block and clearing a free block
//! both fail with a [`BitmapError`](bitmap::BitmapError) that callers treat as
//! bookkeeping corruption.
//!
//! ## Concurrency
//!
//! Neither type locks internally. The file system keeps its free map behind a
//! spin lock; the frame allocator is owned by the single kernel context.
//!
//! ```rust
//! use kernel_alloc::bitmap::Bitmap;
//!
//! let mut map = Bitmap::new(8);
//! assert_eq!(map.find(), Some(0));
//! assert_eq!(map.find(), Some(1));
//! map.clear(0).unwrap();
//! assert_eq!(map.find(), Some(0));
//! assert_eq!(map.num_clear(), 6);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod bitmap;
pub mod frame_alloc;
