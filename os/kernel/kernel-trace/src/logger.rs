use crate::flags::DebugFlags;
use crate::sim_trace;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct DebugLogger {
    max_level: LevelFilter,
    flags: DebugFlags,
}

impl DebugLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter, flags: DebugFlags) -> Self {
        Self { max_level, flags }
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> DebugFlags {
        self.flags
    }

    /// Installs the logger process-wide. Call once, before the machine runs.
    ///
    /// # Errors
    /// If another logger was installed already.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for DebugLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
            && (metadata.level() <= Level::Warn || self.flags.allows_debug(metadata.target()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        sim_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
