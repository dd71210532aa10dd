//! Render context
//!
//! Owns the resource search path, the image pool and the tile arena. Tile
//! operations live in [`crate::tile`], drawing in [`crate::surface`] and
//! [`crate::compositor`].

use tessera_system::SearchPath;

use crate::arena::GenArena;
use crate::image::{ImagePool, PoolLimits};
use crate::tile::{TileEntry, TileKind};
use crate::TileId;

/// All tiles, surfaces and images of one UI thread
pub struct RenderContext {
    pub(crate) search_path: SearchPath,
    pub(crate) images: ImagePool,
    pub(crate) tiles: GenArena<TileEntry>,
}

impl RenderContext {
    pub fn new(search_path: SearchPath, limits: PoolLimits) -> Self {
        tracing::debug!(
            "render context: {} search prefixes, {} loaded images max",
            search_path.prefixes().len(),
            limits.max_loaded_images
        );
        Self {
            search_path,
            images: ImagePool::new(limits),
            tiles: GenArena::new(),
        }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn set_search_path(&mut self, search_path: SearchPath) {
        self.search_path = search_path;
    }

    pub fn images(&self) -> &ImagePool {
        &self.images
    }

    /// Live tiles and surfaces
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_live(&self, id: TileId) -> bool {
        self.tiles.contains(id)
    }

    pub fn kind(&self, id: TileId) -> Option<&TileKind> {
        self.tiles.get(id).map(|t| &t.kind)
    }

    pub fn ref_count(&self, id: TileId) -> u32 {
        self.tiles.get(id).map_or(0, |t| t.ref_count)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(SearchPath::new(), PoolLimits::default())
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("search_path", &self.search_path)
            .field("tiles", &self.tiles.len())
            .field("images", &self.images.stats())
            .finish()
    }
}
