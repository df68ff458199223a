//! # Debug Output for the Simulated Machine
//!
//! A `log` backend and a raw trace macro for the simulator. Every line goes
//! to standard error, so it never mixes with what a user program prints.
//!
//! ## Output Mechanism
//! ```text
//! log::debug!/trace! ─► DebugLogger ─► level + flag filter ─┐
//!                                                           ▼
//! sim_trace! ─────────────────────────────────────────► StderrSink
//! ```
//!
//! ## Debug Flags
//!
//! Output is narrowed with a flag string: each
//! character enables one subsystem, `+` enables all of them.
//!
//! | Flag | Subsystem                         | Log targets                              |
//! |------|-----------------------------------|------------------------------------------|
//! | `a`  | address translation and paging    | `kernel_vmem`, `kernel::paging`, `kernel::mem` |
//! | `f`  | file headers and the file system  | `kernel_fs` (except the disk)            |
//! | `d`  | disk requests                     | `kernel_fs::disk`                        |
//! | `m`  | machine state and statistics      | `kernel_alloc`, `kernel` (the rest)      |
//!
//! ```rust,no_run
//! use kernel_trace::{DebugFlags, DebugLogger};
//! use log::LevelFilter;
//!
//! DebugLogger::new(LevelFilter::Debug, DebugFlags::parse("af"))
//!     .init()
//!     .expect("logger initialization");
//! ```
//!
//! ## `enabled` Feature (default)
//!
//! Without it, [`sim_trace!`] and the logger's output compile to no-ops.

#![deny(unsafe_code)]

mod flags;
mod logger;

pub use flags::DebugFlags;
pub use logger::DebugLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod sim_fmt {
    use std::fmt;
    use std::io::{self, Write};

    pub struct StderrSink;

    impl fmt::Write for StderrSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            io::stderr().lock().write_all(s.as_bytes()).map_err(|_| fmt::Error)
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn sim_write(args: fmt::Arguments) {
        // Best effort.
        let _ = fmt::write(&mut StderrSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod sim_fmt {
    use std::fmt;

    #[doc(hidden)]
    #[inline]
    pub const fn sim_write(_: fmt::Arguments) {}
}

/// Writes formatted text straight to the trace sink, bypassing `log`.
#[macro_export]
macro_rules! sim_trace {
    ($($arg:tt)*) => {{
        $crate::sim_fmt::sim_write(::core::format_args!($($arg)*));
    }};
}
