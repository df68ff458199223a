use core::fmt;

/// Subsystems whose debug output is enabled.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags(u8);

impl DebugFlags {
    pub const PAGING: Self = Self(1 << 0);
    pub const FILESYS: Self = Self(1 << 1);
    pub const DISK: Self = Self(1 << 2);
    pub const MACHINE: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Parses a flag string such as `"af"` or `"+"`. Unknown characters are
    /// ignored.
    #[must_use]
    pub fn parse(flags: &str) -> Self {
        flags.chars().fold(Self::empty(), |acc, c| {
            acc.union(match c {
                'a' => Self::PAGING,
                'f' => Self::FILESYS,
                'd' => Self::DISK,
                'm' => Self::MACHINE,
                '+' => Self::ALL,
                _ => Self::empty(),
            })
        })
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The subsystem a log target belongs to.
    #[must_use]
    pub fn of_target(target: &str) -> Self {
        let within = |prefix: &str| {
            target == prefix
                || target
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with("::"))
        };
        if within("kernel_vmem") || within("kernel::paging") || within("kernel::mem") {
            Self::PAGING
        } else if within("kernel_fs::disk") {
            Self::DISK
        } else if within("kernel_fs") {
            Self::FILESYS
        } else {
            Self::MACHINE
        }
    }

    /// Whether output for `target` is enabled.
    ///
    /// Applies to records below `warn`; [`DebugLogger`](crate::DebugLogger)
    /// lets warnings and errors through regardless.
    #[must_use]
    pub fn allows_debug(self, target: &str) -> bool {
        self.contains(Self::of_target(target))
    }
}

impl fmt::Debug for DebugFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::PAGING, 'a'),
            (Self::FILESYS, 'f'),
            (Self::DISK, 'd'),
            (Self::MACHINE, 'm'),
        ];
        write!(f, "DebugFlags(\"")?;
        for (flag, c) in names {
            if self.contains(flag) {
                write!(f, "{c}")?;
            }
        }
        write!(f, "\")")
    }
}
