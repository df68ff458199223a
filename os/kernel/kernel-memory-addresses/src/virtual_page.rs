use crate::{PAGE_SHIFT, PageOffset, VirtualAddress};
use core::fmt;

/// Virtual page number.
///
/// Identifies one `PAGE_SIZE` slice of an address space; the page's first byte
/// is at `number * PAGE_SIZE`.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u32);

impl VirtualPage {
    #[inline]
    #[must_use]
    pub const fn new(vpn: u32) -> Self {
        Self(vpn)
    }

    /// Page that contains `addr`.
    #[inline]
    #[must_use]
    pub const fn containing_address(addr: VirtualAddress) -> Self {
        addr.page()
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.0 << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset) -> VirtualAddress {
        VirtualAddress::new((self.0 << PAGE_SHIFT) | off.as_u32())
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VP({})", self.0)
    }
}

impl From<u32> for VirtualPage {
    #[inline]
    fn from(vpn: u32) -> Self {
        Self::new(vpn)
    }
}
