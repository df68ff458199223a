//! Physical page-frame allocator for demand paging.

use crate::bitmap::{Bitmap, BitmapError};
use kernel_memory_addresses::PhysicalFrame;
use log::trace;

/// Source of physical page frames.
pub trait FrameAlloc {
    /// Takes the lowest-numbered free frame, or `None` if memory is full.
    fn alloc_frame(&mut self) -> Option<PhysicalFrame>;

    /// Returns `frame` to the pool.
    ///
    /// # Errors
    /// Fails if the frame was not allocated.
    fn free_frame(&mut self, frame: PhysicalFrame) -> Result<(), BitmapError>;

    /// Whether `frame` is currently handed out.
    fn is_allocated(&self, frame: PhysicalFrame) -> bool;

    fn num_free(&self) -> usize;

    fn num_frames(&self) -> usize;
}

/// Frame allocator backed by a [`Bitmap`] with one bit per frame.
#[derive(Debug, Clone)]
pub struct BitmapFrameAlloc {
    map: Bitmap,
}

impl BitmapFrameAlloc {
    #[must_use]
    pub fn new(num_frames: usize) -> Self {
        Self {
            map: Bitmap::new(num_frames),
        }
    }
}

impl FrameAlloc for BitmapFrameAlloc {
    fn alloc_frame(&mut self) -> Option<PhysicalFrame> {
        let index = self.map.find()?;
        let frame = PhysicalFrame::new(u32::try_from(index).ok()?);
        trace!("frame {frame} allocated, {} free", self.map.num_clear());
        Some(frame)
    }

    fn free_frame(&mut self, frame: PhysicalFrame) -> Result<(), BitmapError> {
        self.map.clear(frame.index())?;
        trace!("frame {frame} released, {} free", self.map.num_clear());
        Ok(())
    }

    fn is_allocated(&self, frame: PhysicalFrame) -> bool {
        self.map.test(frame.index())
    }

    fn num_free(&self) -> usize {
        self.map.num_clear()
    }

    fn num_frames(&self) -> usize {
        self.map.len()
    }
}
