//! Tile compositor
//!
//! Draws tiles into surfaces. Single images and owned bitmaps are tiled
//! over the target area; 9-slice grids draw their corners unscaled, tile
//! the edges between them and fill the interior with the center image.

use std::rc::Rc;

use crate::tile::{EdgeSizes, GridPos, TileKind};
use crate::{Bitmap, Rect, RenderContext, SurfaceId, TileId};

/// Repeat `src` over the `dw` x `dh` area at `(dx, dy)`
///
/// Tiles at the right and bottom edges are cut short so nothing is drawn
/// outside the area.
pub fn blit_area(src: &Bitmap, dst: &mut Bitmap, dx: i32, dy: i32, dw: u32, dh: u32) {
    let (tw, th) = src.size();
    if tw == 0 || th == 0 {
        return;
    }

    let mut y = 0;
    while y < dh {
        let h = th.min(dh - y);
        let mut x = 0;
        while x < dw {
            let w = tw.min(dw - x);
            dst.blit(src, Some(Rect::new(0, 0, w, h)), dx + x as i32, dy + y as i32, None);
            x += tw;
        }
        y += th;
    }
}

/// Compose up to nine images into the `dw` x `dh` area at `(dx, dy)`
///
/// `images` is indexed by [`GridPos`]. With `single` set only the center
/// image is used and tiled over the whole area.
pub fn blit_grid(
    images: &[Option<Rc<Bitmap>>; 9],
    single: bool,
    edges: EdgeSizes,
    dst: &mut Bitmap,
    dx: i32,
    dy: i32,
    dw: u32,
    dh: u32,
) {
    let image = |pos: GridPos| images[pos.index()].as_deref();

    if single {
        if let Some(src) = image(GridPos::Center) {
            blit_area(src, dst, dx, dy, dw, dh);
        }
        return;
    }

    let (mut ox, mut oy, mut ow, mut oh) = (0u32, 0u32, 0u32, 0u32);
    let right = |w: u32| dx + (dw - w) as i32;
    let bottom = |h: u32| dy + (dh - h) as i32;

    // Corners
    if let Some(src) = image(GridPos::TopLeft) {
        ox = edges.left.min(dw);
        oy = edges.top.min(dh);
        blit_area(src, dst, dx, dy, ox, oy);
    }
    if let Some(src) = image(GridPos::TopRight) {
        ow = edges.right.min(dw);
        oy = edges.top.min(dh);
        blit_area(src, dst, right(ow), dy, ow, oy);
    }
    if let Some(src) = image(GridPos::BottomRight) {
        ow = edges.right.min(dw);
        oh = edges.bottom.min(dh);
        blit_area(src, dst, right(ow), bottom(oh), ow, oh);
    }
    if let Some(src) = image(GridPos::BottomLeft) {
        ox = edges.left.min(dw);
        oh = edges.bottom.min(dh);
        blit_area(src, dst, dx, bottom(oh), ox, oh);
    }

    // Edges
    if let Some(src) = image(GridPos::Top) {
        oy = edges.top.min(dh);
        blit_area(src, dst, dx + ox as i32, dy, dw.saturating_sub(ox + ow), oy);
    }
    if let Some(src) = image(GridPos::Right) {
        ow = edges.right.min(dw);
        blit_area(src, dst, right(ow), dy + oy as i32, ow, dh.saturating_sub(oy + oh));
    }
    if let Some(src) = image(GridPos::Bottom) {
        oh = edges.bottom.min(dh);
        blit_area(src, dst, dx + ox as i32, bottom(oh), dw.saturating_sub(ox + ow), oh);
    }
    if let Some(src) = image(GridPos::Left) {
        ox = edges.left.min(dw);
        blit_area(src, dst, dx, dy + oy as i32, ox, dh.saturating_sub(oy + oh));
    }

    // Center
    if let Some(src) = image(GridPos::Center) {
        blit_area(
            src,
            dst,
            dx + ox as i32,
            dy + oy as i32,
            dw.saturating_sub(ox + ow),
            dh.saturating_sub(oy + oh),
        );
    }
}

impl RenderContext {
    /// Draw `tile` into `dst` over the given area
    ///
    /// A zero width or height is replaced by the tile's minimum size.
    pub fn tile_blit(&mut self, tile: TileId, dst: SurfaceId, x: i32, y: i32, w: u32, h: u32) {
        let (w, h) = if w == 0 || h == 0 {
            let (mw, mh) = self.tile_min_size(tile);
            (if w == 0 { mw } else { w }, if h == 0 { mh } else { h })
        } else {
            (w, h)
        };
        self.blit_tile_rect(tile, dst, x, y, w, h);
    }

    /// Draw `tile` centered on `(cx, cy)`, at least at its minimum size
    pub fn tile_blit_centered(&mut self, tile: TileId, dst: SurfaceId, cx: i32, cy: i32, w: u32, h: u32) {
        let (mw, mh) = self.tile_min_size(tile);
        let (w, h) = (w.max(mw), h.max(mh));
        self.blit_tile_rect(tile, dst, cx - (w / 2) as i32, cy - (h / 2) as i32, w, h);
    }

    fn blit_tile_rect(&mut self, tile: TileId, dst: SurfaceId, dx: i32, dy: i32, dw: u32, dh: u32) {
        let Some(entry) = self.tiles.get(tile) else {
            tracing::error!("tile_blit of freed tile {:?}", tile);
            return;
        };

        let single = match &entry.kind {
            TileKind::Fill(color) => {
                let color = *color;
                if dw > 0 && dh > 0 {
                    self.with_target(dst, |target, (ox, oy)| {
                        target.fill_rect(Rect::new(dx + ox, dy + oy, dw, dh), color)
                    });
                }
                return;
            }
            TileKind::Bitmap(None) => {
                tracing::error!("tile_blit of a released surface");
                return;
            }
            TileKind::Bitmap(Some(bitmap)) => {
                let src = Rc::clone(bitmap);
                self.with_target(dst, |target, (ox, oy)| {
                    blit_area(&src, target, dx + ox, dy + oy, dw, dh)
                });
                return;
            }
            TileKind::Image(_) => true,
            TileKind::Grid(_) => false,
        };

        let images = self.load_tile_images(tile);
        let edges = self.edge_sizes(tile);
        self.with_target(dst, |target, (ox, oy)| {
            blit_grid(&images, single, edges, target, dx + ox, dy + oy, dw, dh)
        });
    }
}
