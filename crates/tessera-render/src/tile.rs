//! Tiles
//!
//! A tile is a reference-counted drawable: a flat color, a single image, a
//! 9-slice grid of images, or an owned bitmap. Image tiles reference pool
//! records, so identical paths share one decoded bitmap across tiles.

use std::rc::Rc;

use crate::image::ImageHandle;
use crate::{codec, AlphaFlags, Bitmap, Color, RenderContext, TileId};

/// Surfaces are tiles addressed through the drawing API
pub type SurfaceId = TileId;

/// Slot of an image in a 9-slice grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridPos {
    Center = 0,
    TopLeft = 1,
    Top = 2,
    TopRight = 3,
    Right = 4,
    BottomRight = 5,
    Bottom = 6,
    BottomLeft = 7,
    Left = 8,
}

impl GridPos {
    pub const ALL: [GridPos; 9] = [
        GridPos::Center,
        GridPos::TopLeft,
        GridPos::Top,
        GridPos::TopRight,
        GridPos::Right,
        GridPos::BottomRight,
        GridPos::Bottom,
        GridPos::BottomLeft,
        GridPos::Left,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// What a tile draws
#[derive(Debug, Clone)]
pub enum TileKind {
    Fill(Color),
    /// Owned pixels; `None` once the surface has been released
    Bitmap(Option<Rc<Bitmap>>),
    Image(ImageHandle),
    Grid([Option<ImageHandle>; 9]),
}

/// Widths of the left/right and heights of the top/bottom grid borders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeSizes {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl EdgeSizes {
    pub fn min_size(&self) -> (u32, u32) {
        (self.left + self.right, self.top + self.bottom)
    }
}

pub(crate) struct TileEntry {
    pub(crate) ref_count: u32,
    pub(crate) kind: TileKind,
    pub(crate) edges: Option<EdgeSizes>,
    pub(crate) alpha: Option<AlphaFlags>,
    pub(crate) offset: (i32, i32),
}

impl TileEntry {
    pub(crate) fn new(kind: TileKind) -> Self {
        // Colors and owned bitmaps have no borders to measure
        let edges = match kind {
            TileKind::Fill(_) | TileKind::Bitmap(_) => Some(EdgeSizes::default()),
            _ => None,
        };
        Self {
            ref_count: 1,
            kind,
            edges,
            alpha: None,
            offset: (0, 0),
        }
    }

    /// Image handles by grid position; a single image sits at position 0
    pub(crate) fn images(&self) -> [Option<ImageHandle>; 9] {
        match self.kind {
            TileKind::Image(h) => {
                let mut images = [None; 9];
                images[0] = Some(h);
                images
            }
            TileKind::Grid(images) => images,
            _ => [None; 9],
        }
    }
}

impl RenderContext {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Tile drawing a solid color
    pub fn tile_fill_color(&mut self, color: Color) -> TileId {
        self.tiles.insert(TileEntry::new(TileKind::Fill(color)))
    }

    /// Tile for a single image file
    ///
    /// Loading a path that already has a single-image tile returns a new
    /// reference to that tile. Pixels are decoded on first draw.
    pub fn tile_load_image(&mut self, path: &str) -> Option<TileId> {
        let Some(full) = self.search_path.find(path) else {
            tracing::error!("Can't find image {}", path);
            return None;
        };

        if let Some(owner) = self.images.lookup(&full).and_then(|h| self.images.owner(h)) {
            if self.tiles.contains(owner) {
                return Some(self.retain(owner));
            }
        }

        let handle = self.images.acquire(&full)?;
        let id = self.tiles.insert(TileEntry::new(TileKind::Image(handle)));
        self.images.set_owner(handle, Some(id));
        Some(id)
    }

    /// Tile owning a bitmap decoded from memory; bypasses the image pool
    pub fn tile_load_image_data(&mut self, data: &[u8]) -> Option<TileId> {
        match codec::decode_bytes(data) {
            Ok(bitmap) => Some(self.tile_from_bitmap(bitmap)),
            Err(e) => {
                tracing::warn!("Error loading tile: {}", e);
                None
            }
        }
    }

    /// Tile owning `bitmap`
    pub fn tile_from_bitmap(&mut self, bitmap: Bitmap) -> TileId {
        self.tiles.insert(TileEntry::new(TileKind::Bitmap(Some(Rc::new(bitmap)))))
    }

    /// 9-slice tile; paths are indexed by [`GridPos`]
    ///
    /// Missing files are logged and left empty. Fails only when no image
    /// at all could be found.
    pub fn tile_load_grid(&mut self, paths: [Option<&str>; 9]) -> Option<TileId> {
        let mut images = [None; 9];
        let mut found = 0;

        for (slot, path) in images.iter_mut().zip(paths) {
            let Some(path) = path else { continue };
            let Some(full) = self.search_path.find(path) else {
                tracing::error!("Can't find image {}", path);
                continue;
            };
            *slot = self.images.acquire(&full);
            if slot.is_some() {
                found += 1;
            }
        }

        if found == 0 {
            tracing::error!("No images found - no tile created");
            return None;
        }
        Some(self.tiles.insert(TileEntry::new(TileKind::Grid(images))))
    }

    /// Vertical three-slice: top, middle, bottom
    pub fn tile_load_vertical(&mut self, paths: [Option<&str>; 3]) -> Option<TileId> {
        let mut grid = [None; 9];
        grid[GridPos::TopLeft.index()] = paths[0];
        grid[GridPos::Left.index()] = paths[1];
        grid[GridPos::BottomLeft.index()] = paths[2];
        self.tile_load_grid(grid)
    }

    /// Horizontal three-slice: left, middle, right
    pub fn tile_load_horizontal(&mut self, paths: [Option<&str>; 3]) -> Option<TileId> {
        let mut grid = [None; 9];
        grid[GridPos::TopLeft.index()] = paths[0];
        grid[GridPos::Top.index()] = paths[1];
        grid[GridPos::TopRight.index()] = paths[2];
        self.tile_load_grid(grid)
    }

    /// 9-slice tile from in-memory bitmaps
    ///
    /// The bitmaps are registered as locked pool images: always resident and
    /// never counted against the decoded-image bound.
    pub fn tile_from_bitmaps(&mut self, bitmaps: [Option<Bitmap>; 9]) -> Option<TileId> {
        let mut images = [None; 9];
        for (slot, bitmap) in images.iter_mut().zip(bitmaps) {
            if let Some(bitmap) = bitmap {
                *slot = self.images.acquire_locked(bitmap);
            }
        }

        if images.iter().all(Option::is_none) {
            tracing::error!("No images found - no tile created");
            return None;
        }
        Some(self.tiles.insert(TileEntry::new(TileKind::Grid(images))))
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    /// Add a reference; returns `id` for chaining
    pub fn retain(&mut self, id: TileId) -> TileId {
        match self.tiles.get_mut(id) {
            Some(entry) => entry.ref_count += 1,
            None => tracing::error!("retain of freed tile {:?}", id),
        }
        id
    }

    /// Drop a reference; the last one releases the tile's images
    pub fn release(&mut self, id: TileId) {
        let Some(entry) = self.tiles.get_mut(id) else {
            tracing::error!("release of freed tile {:?}", id);
            return;
        };

        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return;
        }

        let Some(entry) = self.tiles.remove(id) else { return };
        for handle in entry.images().into_iter().flatten() {
            if self.images.owner(handle) == Some(id) {
                self.images.set_owner(handle, None);
            }
            self.images.release(handle);
        }
    }

    // ========================================================================
    // Geometry and alpha
    // ========================================================================

    /// Smallest size the tile can be drawn at without overlapping borders
    pub fn tile_min_size(&mut self, id: TileId) -> (u32, u32) {
        let bitmap_size = match self.tiles.get(id).map(|t| &t.kind) {
            None => {
                tracing::error!("tile_min_size of freed tile {:?}", id);
                return (0, 0);
            }
            Some(TileKind::Bitmap(Some(bitmap))) => Some(bitmap.size()),
            Some(TileKind::Bitmap(None)) => {
                tracing::error!("tile_min_size called on a released surface");
                return (0, 0);
            }
            Some(_) => None,
        };
        bitmap_size.unwrap_or_else(|| self.edge_sizes(id).min_size())
    }

    /// Border sizes, measured once from the image headers
    pub fn edge_sizes(&mut self, id: TileId) -> EdgeSizes {
        let Some(entry) = self.tiles.get(id) else {
            return EdgeSizes::default();
        };
        if let Some(edges) = entry.edges {
            return edges;
        }

        let images = entry.images();
        let mut size = |pos: GridPos| {
            images[pos.index()].map_or((0, 0), |h| self.images.ensure_size_known(h))
        };

        let mut e = EdgeSizes::default();
        let (w, h) = size(GridPos::TopLeft);
        e.left = e.left.max(w);
        e.top = e.top.max(h);
        let (w, h) = size(GridPos::TopRight);
        e.right = e.right.max(w);
        e.top = e.top.max(h);
        let (w, h) = size(GridPos::BottomRight);
        e.right = e.right.max(w);
        e.bottom = e.bottom.max(h);
        let (w, h) = size(GridPos::BottomLeft);
        e.left = e.left.max(w);
        e.bottom = e.bottom.max(h);
        e.top = e.top.max(size(GridPos::Top).1);
        e.right = e.right.max(size(GridPos::Right).0);
        e.bottom = e.bottom.max(size(GridPos::Bottom).1);
        e.left = e.left.max(size(GridPos::Left).0);

        // A lone center image (single-image tiles included) sizes the tile
        if images[0].is_some() && images[1].is_none() && e.left == 0 {
            (e.left, e.top) = size(GridPos::Center);
        }

        if let Some(entry) = self.tiles.get_mut(id) {
            entry.edges = Some(e);
        }
        e
    }

    /// Set blending for the tile's images
    ///
    /// Applies now to resident images or the owned bitmap, and to images
    /// decoded later.
    pub fn tile_set_alpha(&mut self, id: TileId, alpha: AlphaFlags) {
        let Some(entry) = self.tiles.get_mut(id) else {
            tracing::error!("tile_set_alpha of freed tile {:?}", id);
            return;
        };
        entry.alpha = Some(alpha);

        if let TileKind::Bitmap(Some(bitmap)) = &mut entry.kind {
            Rc::make_mut(bitmap).set_alpha(alpha);
            return;
        }

        for handle in entry.images().into_iter().flatten() {
            if let Some(bitmap) = self.images.bitmap_mut(handle) {
                bitmap.set_alpha(alpha);
            }
        }
    }

    /// Decoded bitmaps by grid position
    ///
    /// Resident images are promoted first, then missing ones decoded, so a
    /// decode cannot evict an image this tile is about to draw.
    pub(crate) fn load_tile_images(&mut self, id: TileId) -> [Option<Rc<Bitmap>>; 9] {
        let mut loaded: [Option<Rc<Bitmap>>; 9] = Default::default();
        let Some(entry) = self.tiles.get(id) else {
            return loaded;
        };
        let images = entry.images();
        let alpha = entry.alpha;

        for (slot, handle) in loaded.iter_mut().zip(images) {
            let Some(handle) = handle else { continue };
            if let Some(bitmap) = self.images.cached(handle) {
                self.images.touch(handle);
                *slot = Some(bitmap);
            }
        }

        for (slot, handle) in loaded.iter_mut().zip(images) {
            match handle {
                Some(handle) if slot.is_none() => *slot = self.images.ensure_decoded(handle, alpha),
                _ => {}
            }
        }

        loaded
    }
}
