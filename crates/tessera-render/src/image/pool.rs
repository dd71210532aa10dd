//! Image Pool
//!
//! Reference-counted table of image records shared by tiles. Two tiles
//! naming the same resolved path share one record and one decoded bitmap.
//! Records hold the path and cached header facts; the pixels live in the
//! [`LoadedImageCache`] and are decoded on first use.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{ImageHandle, LoadedImageCache, MAX_LOADED_IMAGES};
use crate::{codec, AlphaFlags, Bitmap, TileId};

/// Sizing of the pool table and the decoded-image cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    /// Table slots allocated up front
    pub initial_slots: usize,
    /// Slots added when the table is full
    pub slot_increment: usize,
    /// Hard table limit; acquiring beyond it fails
    pub max_slots: usize,
    /// Bound on evictable decoded images
    pub max_loaded_images: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            initial_slots: 500,
            slot_increment: 100,
            max_slots: 2000,
            max_loaded_images: MAX_LOADED_IMAGES,
        }
    }
}

/// One pool slot
#[derive(Debug, Clone, Default)]
pub struct ImageRecord {
    path: Option<PathBuf>,
    size: (u32, u32),
    size_known: bool,
    has_alpha: bool,
    ref_count: u32,
    /// Single-image tile created for this path, reused by later loads
    owner_tile: Option<TileId>,
}

impl ImageRecord {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Size, if it has been determined yet
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size_known.then_some(self.size)
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn owner_tile(&self) -> Option<TileId> {
        self.owner_tile
    }

    fn in_use(&self) -> bool {
        self.ref_count > 0
    }
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Records with a nonzero reference count
    pub in_use: usize,
    /// Current table size
    pub slots: usize,
    /// Listed decoded images
    pub loaded: usize,
    /// Listed plus locked decoded images
    pub resident: usize,
    pub decodes: u64,
    pub decode_failures: u64,
    pub evictions: u64,
}

/// Reference-counted image table plus decoded-image cache
pub struct ImagePool {
    /// Index 0 is a permanent placeholder
    records: Vec<ImageRecord>,
    slots: usize,
    limits: PoolLimits,
    cache: LoadedImageCache,
    decodes: u64,
    decode_failures: u64,
}

impl ImagePool {
    pub fn new(limits: PoolLimits) -> Self {
        let max_slots = limits.max_slots.clamp(2, u16::MAX as usize);
        let limits = PoolLimits {
            max_slots,
            initial_slots: limits.initial_slots.clamp(2, max_slots),
            ..limits
        };

        let mut records = Vec::with_capacity(limits.initial_slots);
        records.push(ImageRecord::default());

        Self {
            records,
            slots: limits.initial_slots,
            limits,
            cache: LoadedImageCache::new(limits.max_loaded_images),
            decodes: 0,
            decode_failures: 0,
        }
    }

    pub fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    pub fn cache(&self) -> &LoadedImageCache {
        &self.cache
    }

    pub fn record(&self, handle: ImageHandle) -> Option<&ImageRecord> {
        self.records.get(handle.index()).filter(|r| r.in_use())
    }

    fn record_mut(&mut self, handle: ImageHandle) -> Option<&mut ImageRecord> {
        self.records.get_mut(handle.index()).filter(|r| r.in_use())
    }

    /// Live record for an already resolved path
    pub fn lookup(&self, path: &Path) -> Option<ImageHandle> {
        self.records
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, r)| r.in_use() && r.path.as_deref() == Some(path))
            .and_then(|(i, _)| ImageHandle::from_index(i))
    }

    /// Take a reference to the record for `path`, creating it if needed
    ///
    /// Nothing is decoded here. Returns `None` when the table is at its
    /// hard limit.
    pub fn acquire(&mut self, path: &Path) -> Option<ImageHandle> {
        if let Some(handle) = self.lookup(path) {
            if let Some(record) = self.record_mut(handle) {
                record.ref_count += 1;
            }
            return Some(handle);
        }

        self.allocate(ImageRecord {
            path: Some(path.to_path_buf()),
            ref_count: 1,
            ..ImageRecord::default()
        })
    }

    /// Register an already decoded bitmap as a locked image
    ///
    /// Locked images have no path, are resident from the start and never
    /// count toward the cache bound.
    pub fn acquire_locked(&mut self, bitmap: Bitmap) -> Option<ImageHandle> {
        let handle = self.allocate(ImageRecord {
            path: None,
            size: bitmap.size(),
            size_known: true,
            has_alpha: bitmap.has_alpha(),
            ref_count: 1,
            owner_tile: None,
        })?;
        self.cache.insert(handle, Rc::new(bitmap), true);
        Some(handle)
    }

    fn allocate(&mut self, record: ImageRecord) -> Option<ImageHandle> {
        let free = self.records.iter().skip(1).position(|r| !r.in_use());
        let index = free.map_or(self.records.len(), |i| i + 1);

        if index >= self.slots {
            if index >= self.limits.max_slots {
                tracing::error!(
                    "Maximum number of images ({}) exceeded for {}",
                    self.limits.max_slots,
                    record.path.as_deref().map_or("<bitmap>".into(), |p| p.display().to_string())
                );
                return None;
            }
            self.slots = (self.slots + self.limits.slot_increment.max(1)).min(self.limits.max_slots);
            tracing::debug!("Increased image table to {} slots", self.slots);
        }

        if index == self.records.len() {
            self.records.push(record);
        } else {
            self.records[index] = record;
        }
        ImageHandle::from_index(index)
    }

    /// Add a reference to a live record
    pub fn retain(&mut self, handle: ImageHandle) {
        match self.record_mut(handle) {
            Some(record) => record.ref_count += 1,
            None => tracing::warn!("retain of unused image {}", handle),
        }
    }

    /// Drop a reference; the last one unloads the bitmap and frees the slot
    ///
    /// Returns true if the record was freed.
    pub fn release(&mut self, handle: ImageHandle) -> bool {
        let Some(record) = self.record_mut(handle) else {
            tracing::warn!("release of unused image {}", handle);
            return false;
        };

        record.ref_count -= 1;
        if record.ref_count > 0 {
            return false;
        }

        if self.cache.evict(handle).is_some() {
            tracing::debug!("Unloading image {}", handle);
        }
        self.records[handle.index()] = ImageRecord::default();
        true
    }

    pub fn owner(&self, handle: ImageHandle) -> Option<TileId> {
        self.record(handle).and_then(|r| r.owner_tile)
    }

    pub(crate) fn set_owner(&mut self, handle: ImageHandle, tile: Option<TileId>) {
        if let Some(record) = self.record_mut(handle) {
            record.owner_tile = tile;
        }
    }

    pub fn is_resident(&self, handle: ImageHandle) -> bool {
        self.cache.contains(handle)
    }

    /// Resident bitmap, without affecting recency
    pub fn cached(&self, handle: ImageHandle) -> Option<Rc<Bitmap>> {
        self.cache.get(handle).cloned()
    }

    /// Mark a resident image as most recently used
    pub fn touch(&mut self, handle: ImageHandle) {
        if let Some(evicted) = self.cache.touch(handle) {
            tracing::debug!("Evicted image {} from cache", evicted);
        }
    }

    /// Decode `handle` unless it is already resident
    ///
    /// A freshly decoded bitmap takes `alpha` when given and enters the
    /// cache as most recently used, possibly evicting another image. A
    /// resident image is returned as is; callers touch it separately.
    /// Decode failures are logged and yield `None`.
    pub fn ensure_decoded(&mut self, handle: ImageHandle, alpha: Option<AlphaFlags>) -> Option<Rc<Bitmap>> {
        if let Some(bitmap) = self.cache.get(handle) {
            return Some(Rc::clone(bitmap));
        }

        let path = self.record(handle)?.path.clone()?;
        let mut bitmap = match codec::decode_file(&path) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                tracing::warn!("Error loading tile image {}: {}", path.display(), e);
                self.decode_failures += 1;
                return None;
            }
        };
        if let Some(alpha) = alpha {
            bitmap.set_alpha(alpha);
        }

        if let Some(record) = self.record_mut(handle) {
            record.has_alpha = bitmap.has_alpha();
            if !record.size_known {
                record.size = bitmap.size();
                record.size_known = true;
            }
        }

        let bitmap = Rc::new(bitmap);
        self.decodes += 1;
        tracing::debug!("Loaded image {} from {}", handle, path.display());
        if let Some(evicted) = self.cache.insert(handle, Rc::clone(&bitmap), false) {
            tracing::debug!("Evicted image {} from cache", evicted);
        }
        Some(bitmap)
    }

    /// Size of `handle`, determined on first request
    ///
    /// A resident bitmap answers directly; otherwise only the file header is
    /// read. An unreadable file is remembered as `(0, 0)`.
    pub fn ensure_size_known(&mut self, handle: ImageHandle) -> (u32, u32) {
        let resident = self.cache.get(handle).map(|b| (b.size(), b.has_alpha()));
        let Some(record) = self.record_mut(handle) else {
            return (0, 0);
        };
        if record.size_known {
            return record.size;
        }

        if let Some((size, has_alpha)) = resident {
            record.size = size;
            record.has_alpha = has_alpha;
        } else if let Some(path) = record.path.as_deref() {
            match codec::read_header(path) {
                Ok(info) => {
                    record.size = (info.width, info.height);
                    record.has_alpha = info.has_alpha;
                }
                Err(e) => tracing::warn!("Can't read image header {}: {}", path.display(), e),
            }
        }

        record.size_known = true;
        record.size
    }

    /// Mutable resident bitmap for drawing or alpha changes
    pub fn bitmap_mut(&mut self, handle: ImageHandle) -> Option<&mut Bitmap> {
        self.cache.get_mut(handle)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            in_use: self.records.iter().filter(|r| r.in_use()).count(),
            slots: self.slots,
            loaded: self.cache.len(),
            resident: self.cache.resident(),
            decodes: self.decodes,
            decode_failures: self.decode_failures,
            evictions: self.cache.evictions,
        }
    }
}

impl Default for ImagePool {
    fn default() -> Self {
        Self::new(PoolLimits::default())
    }
}
