//! # Kernel synchronization primitives
//!
//! The simulated kernel serializes access to shared devices and tables with a
//! single primitive, [`SpinLock`]. The synchronous disk wraps its image in one
//! so that only one sector request is in flight at a time, and the file system
//! guards its free-sector bitmap the same way.
//!
//! Each lock counts how often it was acquired and how often an acquirer had to
//! wait; [`SpinLock::stats`] reads both counters.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{LockStats, SpinLock, SpinLockGuard};
