//! Decoded image cache with LRU eviction
//!
//! Holds the decoded bitmaps of pool images. Entries are either listed in a
//! recency list bounded by `capacity`, or locked: locked entries were
//! supplied as bitmaps rather than decoded from a file, can never be
//! reloaded, and so are never evicted and never counted.
//!
//! The recency list is intrusive, indexed by image handle, so touch and
//! evict are O(1).

use std::rc::Rc;

use super::ImageHandle;
use crate::Bitmap;

/// Default bound on listed (evictable) decoded images
pub const MAX_LOADED_IMAGES: usize = 75;

struct CacheEntry {
    bitmap: Rc<Bitmap>,
    locked: bool,
    linked: bool,
    prev: Option<ImageHandle>,
    next: Option<ImageHandle>,
}

/// LRU cache of decoded bitmaps keyed by image handle
pub struct LoadedImageCache {
    entries: Vec<Option<CacheEntry>>,
    /// Most recently used
    head: Option<ImageHandle>,
    /// Least recently used
    tail: Option<ImageHandle>,
    listed: usize,
    capacity: usize,
    /// Statistics
    pub hits: u64,
    pub evictions: u64,
}

impl LoadedImageCache {
    /// Create a cache bounded to `capacity` listed images (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            head: None,
            tail: None,
            listed: 0,
            capacity: capacity.max(1),
            hits: 0,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of listed (counted) images
    pub fn len(&self) -> usize {
        self.listed
    }

    pub fn is_empty(&self) -> bool {
        self.listed == 0
    }

    /// Listed plus locked images
    pub fn resident(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn contains(&self, handle: ImageHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn is_listed(&self, handle: ImageHandle) -> bool {
        self.entry(handle).is_some_and(|e| e.linked)
    }

    pub fn is_locked(&self, handle: ImageHandle) -> bool {
        self.entry(handle).is_some_and(|e| e.locked)
    }

    /// Decoded bitmap, without affecting recency
    pub fn get(&self, handle: ImageHandle) -> Option<&Rc<Bitmap>> {
        self.entry(handle).map(|e| &e.bitmap)
    }

    /// Mutable access for drawing into a cached image
    ///
    /// Other holders of the bitmap keep their snapshot; this entry gets a
    /// private copy if it is shared.
    pub fn get_mut(&mut self, handle: ImageHandle) -> Option<&mut Bitmap> {
        self.entry_mut(handle).map(|e| Rc::make_mut(&mut e.bitmap))
    }

    /// Store a decoded bitmap
    ///
    /// Unlocked entries become most recently used. Returns the handle that
    /// had to be evicted to stay within capacity, if any.
    pub fn insert(&mut self, handle: ImageHandle, bitmap: Rc<Bitmap>, locked: bool) -> Option<ImageHandle> {
        self.evict(handle);

        let index = handle.index();
        if self.entries.len() <= index {
            self.entries.resize_with(index + 1, || None);
        }
        self.entries[index] = Some(CacheEntry {
            bitmap,
            locked,
            linked: false,
            prev: None,
            next: None,
        });

        if locked {
            None
        } else {
            self.touch(handle)
        }
    }

    /// Mark `handle` as most recently used
    ///
    /// A resident entry that is not yet listed is linked in; if that pushes
    /// the listed count over capacity the least recently used entry is
    /// evicted and its handle returned. Locked entries are ignored.
    pub fn touch(&mut self, handle: ImageHandle) -> Option<ImageHandle> {
        let (locked, linked) = self.entry(handle).map(|e| (e.locked, e.linked))?;
        if locked {
            return None;
        }

        if linked {
            self.hits += 1;
            if self.head != Some(handle) {
                self.unlink(handle);
                self.push_front(handle);
            }
            return None;
        }

        self.push_front(handle);
        if self.listed <= self.capacity {
            return None;
        }

        let lru = self.tail?;
        self.evict(lru);
        self.evictions += 1;
        Some(lru)
    }

    /// Drop the decoded bitmap for `handle`
    pub fn evict(&mut self, handle: ImageHandle) -> Option<Rc<Bitmap>> {
        self.unlink(handle);
        let entry = self.entries.get_mut(handle.index())?.take()?;
        Some(entry.bitmap)
    }

    /// Listed handles from most to least recently used
    pub fn lru_order(&self) -> impl Iterator<Item = ImageHandle> + '_ {
        std::iter::successors(self.head, move |h| self.entry(*h).and_then(|e| e.next))
    }

    fn entry(&self, handle: ImageHandle) -> Option<&CacheEntry> {
        self.entries.get(handle.index()).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, handle: ImageHandle) -> Option<&mut CacheEntry> {
        self.entries.get_mut(handle.index()).and_then(Option::as_mut)
    }

    fn unlink(&mut self, handle: ImageHandle) {
        let (prev, next) = match self.entry_mut(handle) {
            Some(e) if e.linked => {
                e.linked = false;
                (e.prev.take(), e.next.take())
            }
            _ => return,
        };

        match prev {
            Some(p) => {
                if let Some(e) = self.entry_mut(p) {
                    e.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(e) = self.entry_mut(n) {
                    e.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        self.listed -= 1;
    }

    fn push_front(&mut self, handle: ImageHandle) {
        let old_head = self.head;
        match self.entry_mut(handle) {
            Some(e) => {
                e.prev = None;
                e.next = old_head;
                e.linked = true;
            }
            None => return,
        }

        match old_head {
            Some(h) => {
                if let Some(e) = self.entry_mut(h) {
                    e.prev = Some(handle);
                }
            }
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
        self.listed += 1;
    }
}

impl Default for LoadedImageCache {
    fn default() -> Self {
        Self::new(MAX_LOADED_IMAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(i: usize) -> ImageHandle {
        ImageHandle::from_index(i).unwrap()
    }

    fn bitmap() -> Rc<Bitmap> {
        Rc::new(Bitmap::new(1, 1).unwrap())
    }

    fn order(cache: &LoadedImageCache) -> Vec<usize> {
        cache.lru_order().map(ImageHandle::index).collect()
    }

    #[test]
    fn test_insert_and_touch_order() {
        let mut cache = LoadedImageCache::new(3);
        cache.insert(handle(1), bitmap(), false);
        cache.insert(handle(2), bitmap(), false);
        cache.insert(handle(3), bitmap(), false);
        assert_eq!(order(&cache), vec![3, 2, 1]);

        cache.touch(handle(1));
        assert_eq!(order(&cache), vec![1, 3, 2]);

        // Touching the head is a no-op
        cache.touch(handle(1));
        assert_eq!(order(&cache), vec![1, 3, 2]);
    }

    #[test]
    fn test_hits_count_only_listed_entries() {
        let mut cache = LoadedImageCache::new(3);
        cache.insert(handle(1), bitmap(), false);
        cache.insert(handle(2), bitmap(), false);
        assert_eq!(cache.hits, 0);

        cache.touch(handle(1));
        cache.touch(handle(1));
        assert_eq!(cache.hits, 2);

        // Locked and absent entries never count
        cache.insert(handle(3), bitmap(), true);
        cache.touch(handle(3));
        cache.touch(handle(9));
        assert_eq!(cache.hits, 2);
    }

    #[test]
    fn test_eviction_of_least_recent() {
        let mut cache = LoadedImageCache::new(2);
        assert_eq!(cache.insert(handle(1), bitmap(), false), None);
        assert_eq!(cache.insert(handle(2), bitmap(), false), None);
        assert_eq!(cache.insert(handle(3), bitmap(), false), Some(handle(1)));

        assert!(!cache.contains(handle(1)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.evictions, 1);
    }

    #[test]
    fn test_locked_entries_are_not_counted() {
        let mut cache = LoadedImageCache::new(1);
        cache.insert(handle(5), bitmap(), true);
        cache.insert(handle(1), bitmap(), false);
        assert_eq!(cache.insert(handle(2), bitmap(), false), Some(handle(1)));

        assert!(cache.is_locked(handle(5)));
        assert!(cache.contains(handle(5)));
        assert_eq!(cache.touch(handle(5)), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resident(), 2);
        assert_eq!(order(&cache), vec![2]);
    }

    #[test]
    fn test_evict_middle_keeps_links() {
        let mut cache = LoadedImageCache::new(4);
        for i in 1..=3 {
            cache.insert(handle(i), bitmap(), false);
        }
        assert!(cache.evict(handle(2)).is_some());
        assert_eq!(order(&cache), vec![3, 1]);
        assert!(cache.evict(handle(2)).is_none());

        cache.touch(handle(1));
        assert_eq!(order(&cache), vec![1, 3]);
    }

    #[test]
    fn test_get_mut_copies_shared_bitmap() {
        let mut cache = LoadedImageCache::new(2);
        let shared = bitmap();
        cache.insert(handle(1), Rc::clone(&shared), false);

        cache.get_mut(handle(1)).unwrap().fill(crate::Color::RED);

        assert_eq!(shared.pixel(0, 0), Some(crate::Color::TRANSPARENT));
        assert_eq!(cache.get(handle(1)).unwrap().pixel(0, 0), Some(crate::Color::RED));
    }
}
