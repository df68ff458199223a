//! # Swap Stores
//!
//! Every address space owns one swap store holding its full virtual image.
//! Pages are read from it on demand and written back when a dirty page is
//! evicted. Page `n` lives at byte offset `n * PAGE_SIZE`.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kernel_fs::filesys::{FileSystem, FileSystemError};
use kernel_info::machine::PAGE_SIZE;
use kernel_memory_addresses::{SectorNumber, VirtualPage};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("page {vpn} is outside a swap of {pages} pages")]
    OutOfRange { vpn: VirtualPage, pages: usize },
    #[error("swap buffer of {0} bytes is not one page")]
    BadBuffer(usize),
    #[error("swap file returned {got} bytes for page {vpn}")]
    ShortPage { vpn: VirtualPage, got: usize },
    #[error("swap store was released")]
    Released,
    #[error("swap file: {0}")]
    File(#[from] FileSystemError),
}

/// Transfer counters of one swap store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapStats {
    pub page_reads: u64,
    pub page_writes: u64,
}

/// Per-address-space backing store.
pub trait SwapStore: fmt::Debug + Send {
    fn num_pages(&self) -> usize;

    /// Copies page `vpn` into `frame`.
    ///
    /// # Errors
    /// Out-of-range pages, wrongly sized buffers and I/O failures.
    fn read_page(&mut self, vpn: VirtualPage, frame: &mut [u8]) -> Result<(), SwapError>;

    /// Stores `frame` as page `vpn`.
    ///
    /// # Errors
    /// Out-of-range pages, wrongly sized buffers and I/O failures.
    fn write_page(&mut self, vpn: VirtualPage, frame: &[u8]) -> Result<(), SwapError>;

    fn stats(&self) -> SwapStats;

    /// Releases the backing storage. The store is unusable afterwards.
    ///
    /// # Errors
    /// I/O failures.
    fn release(&mut self) -> Result<(), SwapError>;
}

fn check(vpn: VirtualPage, len: usize, pages: usize) -> Result<usize, SwapError> {
    if vpn.index() >= pages {
        return Err(SwapError::OutOfRange { vpn, pages });
    }
    if len != PAGE_SIZE {
        return Err(SwapError::BadBuffer(len));
    }
    Ok(vpn.index() * PAGE_SIZE)
}

/// Swap held in host memory.
pub struct MemorySwap {
    bytes: Vec<u8>,
    stats: SwapStats,
}

impl MemorySwap {
    /// A store of `num_pages` zeroed pages.
    #[must_use]
    pub fn zeroed(num_pages: usize) -> Self {
        Self {
            bytes: vec![0; num_pages * PAGE_SIZE],
            stats: SwapStats::default(),
        }
    }

    /// A store initialised from `image`, padded to whole pages.
    #[must_use]
    pub fn from_image(image: &[u8]) -> Self {
        let mut swap = Self::zeroed(image.len().div_ceil(PAGE_SIZE));
        swap.bytes[..image.len()].copy_from_slice(image);
        swap
    }

    /// The raw contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for MemorySwap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySwap")
            .field("pages", &self.num_pages())
            .field("stats", &self.stats)
            .finish()
    }
}

impl SwapStore for MemorySwap {
    fn num_pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    fn read_page(&mut self, vpn: VirtualPage, frame: &mut [u8]) -> Result<(), SwapError> {
        let at = check(vpn, frame.len(), self.num_pages())?;
        frame.copy_from_slice(&self.bytes[at..at + PAGE_SIZE]);
        self.stats.page_reads += 1;
        Ok(())
    }

    fn write_page(&mut self, vpn: VirtualPage, frame: &[u8]) -> Result<(), SwapError> {
        let at = check(vpn, frame.len(), self.num_pages())?;
        self.bytes[at..at + PAGE_SIZE].copy_from_slice(frame);
        self.stats.page_writes += 1;
        Ok(())
    }

    fn stats(&self) -> SwapStats {
        self.stats
    }

    fn release(&mut self) -> Result<(), SwapError> {
        self.bytes = Vec::new();
        Ok(())
    }
}

/// Swap kept in a file of the simulated file system.
pub struct FileSwap {
    fs: Arc<FileSystem>,
    sector: Option<SectorNumber>,
    num_pages: usize,
    stats: SwapStats,
}

impl FileSwap {
    /// Creates a swap file holding `image`, padded to whole pages.
    ///
    /// # Errors
    /// If the file cannot be created or written; no file is left behind.
    pub fn create(fs: Arc<FileSystem>, image: &[u8]) -> Result<Self, SwapError> {
        let num_pages = image.len().div_ceil(PAGE_SIZE);
        let size = num_pages * PAGE_SIZE;
        let sector = fs.create(size)?;

        let mut padded = vec![0u8; size];
        padded[..image.len()].copy_from_slice(image);
        if let Err(e) = fs.write_at(sector, &padded, 0) {
            fs.remove(sector)?;
            return Err(e.into());
        }
        debug!("swap file {sector} holds {num_pages} pages");
        Ok(Self {
            fs,
            sector: Some(sector),
            num_pages,
            stats: SwapStats::default(),
        })
    }

    /// Header sector of the swap file, until released.
    #[must_use]
    pub const fn sector(&self) -> Option<SectorNumber> {
        self.sector
    }

    fn file(&self) -> Result<SectorNumber, SwapError> {
        self.sector.ok_or(SwapError::Released)
    }
}

impl fmt::Debug for FileSwap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSwap")
            .field("sector", &self.sector)
            .field("pages", &self.num_pages)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SwapStore for FileSwap {
    fn num_pages(&self) -> usize {
        if self.sector.is_some() { self.num_pages } else { 0 }
    }

    fn read_page(&mut self, vpn: VirtualPage, frame: &mut [u8]) -> Result<(), SwapError> {
        let sector = self.file()?;
        let at = check(vpn, frame.len(), self.num_pages)?;
        let got = self.fs.read_at(sector, frame, at)?;
        if got != PAGE_SIZE {
            return Err(SwapError::ShortPage { vpn, got });
        }
        self.stats.page_reads += 1;
        Ok(())
    }

    fn write_page(&mut self, vpn: VirtualPage, frame: &[u8]) -> Result<(), SwapError> {
        let sector = self.file()?;
        let at = check(vpn, frame.len(), self.num_pages)?;
        self.fs.write_at(sector, frame, at)?;
        self.stats.page_writes += 1;
        Ok(())
    }

    fn stats(&self) -> SwapStats {
        self.stats
    }

    fn release(&mut self) -> Result<(), SwapError> {
        if let Some(sector) = self.sector.take() {
            self.fs.remove(sector)?;
            debug!("removed swap file {sector}");
        }
        Ok(())
    }
}
