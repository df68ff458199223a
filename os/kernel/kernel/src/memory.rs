//! Main memory of the simulated machine.
//!
//! Multi-byte values are stored little-endian, the byte order of the
//! simulated processor, regardless of the host.

use alloc::vec;
use alloc::vec::Vec;
use kernel_info::machine::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};
use kernel_vmem::AccessSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("physical address {address} is outside {size} bytes of memory")]
    OutOfRange { address: PhysicalAddress, size: usize },
    #[error("frame {0} does not exist")]
    NoSuchFrame(PhysicalFrame),
}

/// Byte-addressable physical memory, a whole number of frames long.
pub struct MainMemory {
    bytes: Vec<u8>,
}

impl MainMemory {
    #[must_use]
    pub fn new(num_frames: usize) -> Self {
        Self {
            bytes: vec![0; num_frames * PAGE_SIZE],
        }
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.bytes.len()
    }

    fn span(
        &self,
        address: PhysicalAddress,
        len: usize,
    ) -> Result<core::ops::Range<usize>, MemoryError> {
        let start = address.as_usize();
        let end = start.saturating_add(len);
        if end > self.bytes.len() {
            return Err(MemoryError::OutOfRange {
                address,
                size: self.bytes.len(),
            });
        }
        Ok(start..end)
    }

    /// Loads `size` bytes at `address`, zero-extended to a word.
    ///
    /// # Errors
    /// [`MemoryError::OutOfRange`] if the access leaves memory.
    pub fn read(&self, address: PhysicalAddress, size: AccessSize) -> Result<u32, MemoryError> {
        let span = self.span(address, size.bytes() as usize)?;
        let b = &self.bytes[span];
        Ok(match size {
            AccessSize::Byte => u32::from(b[0]),
            AccessSize::Half => u32::from(u16::from_le_bytes([b[0], b[1]])),
            AccessSize::Word => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    /// Stores the low `size` bytes of `value` at `address`.
    ///
    /// # Errors
    /// [`MemoryError::OutOfRange`] if the access leaves memory.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write(
        &mut self,
        address: PhysicalAddress,
        size: AccessSize,
        value: u32,
    ) -> Result<(), MemoryError> {
        let span = self.span(address, size.bytes() as usize)?;
        let dst = &mut self.bytes[span];
        match size {
            AccessSize::Byte => dst[0] = value as u8,
            AccessSize::Half => dst.copy_from_slice(&(value as u16).to_le_bytes()),
            AccessSize::Word => dst.copy_from_slice(&value.to_le_bytes()),
        }
        Ok(())
    }

    /// The bytes of `frame`.
    ///
    /// # Errors
    /// [`MemoryError::NoSuchFrame`] past the end of memory.
    pub fn frame(&self, frame: PhysicalFrame) -> Result<&[u8], MemoryError> {
        let span = self
            .span(frame.base(), PAGE_SIZE)
            .map_err(|_| MemoryError::NoSuchFrame(frame))?;
        Ok(&self.bytes[span])
    }

    /// The bytes of `frame`, writable.
    ///
    /// # Errors
    /// [`MemoryError::NoSuchFrame`] past the end of memory.
    pub fn frame_mut(&mut self, frame: PhysicalFrame) -> Result<&mut [u8], MemoryError> {
        let span = self
            .span(frame.base(), PAGE_SIZE)
            .map_err(|_| MemoryError::NoSuchFrame(frame))?;
        Ok(&mut self.bytes[span])
    }
}

impl core::fmt::Debug for MainMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MainMemory")
            .field("size", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
