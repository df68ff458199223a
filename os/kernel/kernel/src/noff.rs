//! # NOFF Executables
//!
//! The object format user programs are loaded from: a fixed header
//! describing three segments, followed by the segment contents.
//!
//! ```text
//! offset  field
//! 0x00    magic (0x00BADFAD)
//! 0x04    code        { virtual_addr, in_file_addr, size }
//! 0x10    init_data   { virtual_addr, in_file_addr, size }
//! 0x1C    uninit_data { virtual_addr, in_file_addr, size }
//! 0x28    segment bytes ...
//! ```
//!
//! Header words are little-endian, the machine's byte order. A header whose
//! magic only matches after swapping bytes was written on a big-endian host
//! and is converted word by word.

use alloc::vec;
use alloc::vec::Vec;
use kernel_info::machine::{PAGE_SIZE, USER_STACK_SIZE};

pub const NOFF_MAGIC: u32 = 0x00BA_DFAD;

/// Size of the encoded header in bytes.
pub const NOFF_HEADER_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NoffError {
    #[error("executable of {0} bytes is shorter than its header")]
    Truncated(usize),
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("segment at file offset {offset} with {size} bytes runs past the end of the file")]
    SegmentOutsideFile { offset: u32, size: u32 },
    #[error("segment at {address:#x} with {size} bytes runs past the address space")]
    SegmentOutsideSpace { address: u32, size: u32 },
}

/// One segment descriptor of a [`NoffHeader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    pub virtual_addr: u32,
    pub in_file_addr: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoffHeader {
    pub code: Segment,
    pub init_data: Segment,
    pub uninit_data: Segment,
}

impl NoffHeader {
    /// Decodes the header at the start of `file`.
    ///
    /// # Errors
    /// [`NoffError::Truncated`] or [`NoffError::BadMagic`].
    pub fn parse(file: &[u8]) -> Result<Self, NoffError> {
        let header = file
            .get(..NOFF_HEADER_SIZE)
            .ok_or(NoffError::Truncated(file.len()))?;
        let mut words = [0u32; NOFF_HEADER_SIZE / 4];
        for (word, bytes) in words.iter_mut().zip(header.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        if words[0] != NOFF_MAGIC {
            if words[0].swap_bytes() != NOFF_MAGIC {
                return Err(NoffError::BadMagic(words[0]));
            }
            for word in &mut words {
                *word = word.swap_bytes();
            }
        }

        let segment = |i: usize| Segment {
            virtual_addr: words[i],
            in_file_addr: words[i + 1],
            size: words[i + 2],
        };
        Ok(Self {
            code: segment(1),
            init_data: segment(4),
            uninit_data: segment(7),
        })
    }

    /// Pages needed for all segments plus the user stack.
    #[must_use]
    pub const fn num_pages(&self) -> usize {
        let size = self.code.size as usize
            + self.init_data.size as usize
            + self.uninit_data.size as usize
            + USER_STACK_SIZE;
        size.div_ceil(PAGE_SIZE)
    }

    /// The initial contents of the address space: code and initialised
    /// data at their virtual addresses, everything else zero.
    ///
    /// # Errors
    /// When a segment lies outside `file` or outside the address space.
    pub fn image(&self, file: &[u8]) -> Result<Vec<u8>, NoffError> {
        let mut image = vec![0u8; self.num_pages() * PAGE_SIZE];
        for segment in [self.code, self.init_data] {
            if segment.size == 0 {
                continue;
            }
            let (offset, address, size) = (
                segment.in_file_addr as usize,
                segment.virtual_addr as usize,
                segment.size as usize,
            );
            let src = file
                .get(offset..offset.saturating_add(size))
                .ok_or(NoffError::SegmentOutsideFile {
                    offset: segment.in_file_addr,
                    size: segment.size,
                })?;
            let dst = image
                .get_mut(address..address.saturating_add(size))
                .ok_or(NoffError::SegmentOutsideSpace {
                    address: segment.virtual_addr,
                    size: segment.size,
                })?;
            dst.copy_from_slice(src);
        }
        Ok(image)
    }

    /// Encodes the header in machine byte order.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; NOFF_HEADER_SIZE] {
        let mut out = [0u8; NOFF_HEADER_SIZE];
        let words = [
            NOFF_MAGIC,
            self.code.virtual_addr,
            self.code.in_file_addr,
            self.code.size,
            self.init_data.virtual_addr,
            self.init_data.in_file_addr,
            self.init_data.size,
            self.uninit_data.virtual_addr,
            self.uninit_data.in_file_addr,
            self.uninit_data.size,
        ];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// Builds a NOFF executable from raw code and data, for loading tests and
/// tools.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn build_executable(code: &[u8], data: &[u8], bss: u32) -> Vec<u8> {
    let code_at = NOFF_HEADER_SIZE as u32;
    let header = NoffHeader {
        code: Segment {
            virtual_addr: 0,
            in_file_addr: code_at,
            size: code.len() as u32,
        },
        init_data: Segment {
            virtual_addr: code.len() as u32,
            in_file_addr: code_at + code.len() as u32,
            size: data.len() as u32,
        },
        uninit_data: Segment {
            virtual_addr: (code.len() + data.len()) as u32,
            in_file_addr: 0,
            size: bss,
        },
    };
    let mut file = header.to_bytes().to_vec();
    file.extend_from_slice(code);
    file.extend_from_slice(data);
    file
}
