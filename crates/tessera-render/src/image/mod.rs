//! Image handling module
//!
//! Provides the shared image pool and the bounded cache of decoded bitmaps
//! behind it.

mod cache;
mod pool;

use std::num::NonZeroU16;

pub use cache::{LoadedImageCache, MAX_LOADED_IMAGES};
pub use pool::{ImagePool, ImageRecord, PoolLimits, PoolStats};

/// Handle to an image pool slot
///
/// Slot 0 is reserved, so `Option<ImageHandle>` is the "no image" value and
/// costs no extra space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(NonZeroU16);

impl ImageHandle {
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        u16::try_from(index).ok().and_then(NonZeroU16::new).map(Self)
    }

    /// Slot number in the pool table
    pub fn index(self) -> usize {
        self.0.get() as usize
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
