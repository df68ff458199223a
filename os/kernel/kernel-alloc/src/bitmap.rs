//! Fixed-size bitmap of free and used blocks.

use alloc::vec;
use alloc::vec::Vec;

const BITS_PER_WORD: usize = u32::BITS as usize;

/// Misuse of a [`Bitmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    #[error("block {index} is outside a map of {len} blocks")]
    OutOfRange { index: usize, len: usize },
    #[error("block {0} is already free")]
    AlreadyFree(usize),
    #[error("block {0} is already in use")]
    AlreadyUsed(usize),
    #[error("free map image of {got} bytes, expected {expected}")]
    BadImage { got: usize, expected: usize },
}

impl BitmapError {
    /// Whether the error means an owner lost track of its blocks.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AlreadyFree(_) | Self::AlreadyUsed(_))
    }
}

/// One bit per block; a set bit means the block is in use.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    len: usize,
    words: Vec<u32>,
}

impl Bitmap {
    /// Creates a map of `len` blocks, all free.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            len,
            words: vec![0; len.div_ceil(BITS_PER_WORD)],
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    const fn locate(index: usize) -> (usize, u32) {
        (index / BITS_PER_WORD, 1 << (index % BITS_PER_WORD))
    }

    const fn check(&self, index: usize) -> Result<(), BitmapError> {
        if index < self.len {
            Ok(())
        } else {
            Err(BitmapError::OutOfRange {
                index,
                len: self.len,
            })
        }
    }

    /// Marks block `index` as used.
    ///
    /// # Errors
    /// [`BitmapError::AlreadyUsed`] if the block was not free.
    pub fn mark(&mut self, index: usize) -> Result<(), BitmapError> {
        self.check(index)?;
        let (word, bit) = Self::locate(index);
        if self.words[word] & bit != 0 {
            return Err(BitmapError::AlreadyUsed(index));
        }
        self.words[word] |= bit;
        Ok(())
    }

    /// Marks block `index` as free.
    ///
    /// # Errors
    /// [`BitmapError::AlreadyFree`] if the block was not in use.
    pub fn clear(&mut self, index: usize) -> Result<(), BitmapError> {
        self.check(index)?;
        let (word, bit) = Self::locate(index);
        if self.words[word] & bit == 0 {
            return Err(BitmapError::AlreadyFree(index));
        }
        self.words[word] &= !bit;
        Ok(())
    }

    /// Whether block `index` is in use. Blocks past the end read as free.
    #[must_use]
    pub fn test(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, bit) = Self::locate(index);
        self.words[word] & bit != 0
    }

    /// Takes the lowest-numbered free block.
    pub fn find(&mut self) -> Option<usize> {
        let index = self.first_clear()?;
        let (word, bit) = Self::locate(index);
        self.words[word] |= bit;
        Some(index)
    }

    fn first_clear(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u32::MAX)
            .map(|(i, w)| i * BITS_PER_WORD + w.trailing_ones() as usize)
            .filter(|&index| index < self.len)
    }

    /// Number of free blocks.
    #[must_use]
    pub fn num_clear(&self) -> usize {
        let used: usize = self.words.iter().map(|w| w.count_ones() as usize).sum();
        self.len - used
    }

    /// Indices of all used blocks, ascending.
    pub fn iter_used(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.test(i))
    }

    /// Size of the persisted image in bytes.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.len.div_ceil(8)
    }

    /// Persisted image: bit `i` lives in byte `i / 8`, bit `i % 8`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.truncate(self.byte_len());
        bytes
    }

    /// Rebuilds a map of `len` blocks from [`to_bytes`](Self::to_bytes) output.
    ///
    /// # Errors
    /// [`BitmapError::BadImage`] if `bytes` is shorter than the image.
    pub fn from_bytes(len: usize, bytes: &[u8]) -> Result<Self, BitmapError> {
        let mut map = Self::new(len);
        let expected = map.byte_len();
        let image = bytes.get(..expected).ok_or(BitmapError::BadImage {
            got: bytes.len(),
            expected,
        })?;
        for (word, chunk) in map.words.iter_mut().zip(image.chunks(4)) {
            let mut raw = [0u8; 4];
            raw[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(raw);
        }
        // Bits past `len` never count as used.
        if let Some(last) = map.words.last_mut()
            && len % BITS_PER_WORD != 0
        {
            *last &= (1 << (len % BITS_PER_WORD)) - 1;
        }
        Ok(map)
    }
}

impl core::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bitmap")
            .field("len", &self.len)
            .field("clear", &self.num_clear())
            .finish()
    }
}
