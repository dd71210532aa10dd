//! Surfaces
//!
//! A surface is a drawing target addressed by the same id as its tile. It
//! is backed either by an owned bitmap or by a tile, in which case drawing
//! resolves to the decoded bitmap of the tile's first image. The surface
//! offset is added to every coordinate passed in; clip rectangles are
//! reported back in the caller's coordinates.

use std::path::Path;
use std::rc::Rc;

use crate::codec::{self, OutputFormat};
use crate::image::ImageHandle;
use crate::tile::{TileEntry, TileKind};
use crate::{AlphaFlags, Bitmap, Color, Rect, RenderContext, RenderError, ShapeStyle, SurfaceId};

const RELEASED: &str = "Underlying surface already freed, possibly with release()";

/// Where drawing into a surface lands
enum Target {
    Owned,
    Image(ImageHandle, Option<AlphaFlags>),
    Released,
    Unbacked,
}

/// Percentage of matching pixels between two equally sized bitmaps
///
/// Pixels compare by RGB. A pixel also matches when either side equals
/// `key` (`0xRRGGBB`). Size mismatches score 0.
pub fn compare_bitmaps(a: &Bitmap, b: &Bitmap, key: u32) -> u32 {
    if a.size() != b.size() {
        return 0;
    }

    let (w, h) = a.size();
    let count = w as u64 * h as u64;
    if count == 0 {
        return 0;
    }

    let mut equal = 0u64;
    for y in 0..h {
        for x in 0..w {
            let pa = a.pixel(x, y).map_or(0, Color::rgb24);
            let pb = b.pixel(x, y).map_or(0, Color::rgb24);
            if pa == pb || pa == key || pb == key {
                equal += 1;
            }
        }
    }

    (equal * 100 / count) as u32
}

impl RenderContext {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Opaque surface, initially black
    pub fn surface_new_rgb(&mut self, width: u32, height: u32) -> Option<SurfaceId> {
        let Some(bitmap) = Bitmap::new_opaque(width, height) else {
            tracing::error!("can't create {}x{} surface", width, height);
            return None;
        };
        Some(self.tile_from_bitmap(bitmap))
    }

    /// Transparent surface with an alpha channel
    pub fn surface_new_rgba(&mut self, width: u32, height: u32) -> Option<SurfaceId> {
        let Some(bitmap) = Bitmap::new(width, height) else {
            tracing::error!("can't create {}x{} surface", width, height);
            return None;
        };
        Some(self.tile_from_bitmap(bitmap))
    }

    /// Surface backed by a pooled image tile
    pub fn surface_load_image(&mut self, path: &str) -> Option<SurfaceId> {
        self.tile_load_image(path)
    }

    /// Surface owning a freshly decoded copy of a file, outside the pool
    pub fn surface_load_file(&mut self, path: &Path) -> Option<SurfaceId> {
        match codec::decode_file(path) {
            Ok(bitmap) => Some(self.tile_from_bitmap(bitmap)),
            Err(e) => {
                tracing::warn!("Error loading surface: {}", e);
                None
            }
        }
    }

    /// Surface owning a bitmap decoded from memory
    pub fn surface_load_data(&mut self, data: &[u8]) -> Option<SurfaceId> {
        self.tile_load_image_data(data)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    fn target_of(&self, id: SurfaceId) -> Option<((i32, i32), Target)> {
        let Some(entry) = self.tiles.get(id) else {
            tracing::error!("surface {:?} has been freed", id);
            return None;
        };
        let target = match &entry.kind {
            TileKind::Bitmap(Some(_)) => Target::Owned,
            TileKind::Bitmap(None) => Target::Released,
            TileKind::Fill(_) => Target::Unbacked,
            TileKind::Image(_) | TileKind::Grid(_) => match entry.images()[0] {
                Some(h) => Target::Image(h, entry.alpha),
                None => Target::Unbacked,
            },
        };
        Some((entry.offset, target))
    }

    /// Run `f` on the bitmap behind `id`, with the surface offset
    ///
    /// Tile-backed surfaces decode their image on demand. Returns `None`
    /// when there is nothing to draw into.
    pub(crate) fn with_target<R>(
        &mut self,
        id: SurfaceId,
        f: impl FnOnce(&mut Bitmap, (i32, i32)) -> R,
    ) -> Option<R> {
        let (offset, target) = self.target_of(id)?;
        match target {
            Target::Owned => match self.tiles.get_mut(id).map(|t| &mut t.kind) {
                Some(TileKind::Bitmap(Some(bitmap))) => Some(f(Rc::make_mut(bitmap), offset)),
                _ => None,
            },
            Target::Image(handle, alpha) => {
                if self.images.is_resident(handle) {
                    self.images.touch(handle);
                } else {
                    self.images.ensure_decoded(handle, alpha)?;
                }
                self.images.bitmap_mut(handle).map(|bitmap| f(bitmap, offset))
            }
            Target::Released => {
                tracing::error!("{}", RELEASED);
                None
            }
            Target::Unbacked => {
                tracing::error!("surface {:?} has no pixels", id);
                None
            }
        }
    }

    /// Shared handle to the pixels behind `id`
    pub fn resolve_bitmap(&mut self, id: SurfaceId) -> Option<Rc<Bitmap>> {
        let (_, target) = self.target_of(id)?;
        match target {
            Target::Owned => match self.tiles.get(id).map(|t| &t.kind) {
                Some(TileKind::Bitmap(Some(bitmap))) => Some(Rc::clone(bitmap)),
                _ => None,
            },
            Target::Image(..) => {
                let [center, ..] = self.load_tile_images(id);
                center
            }
            Target::Released => {
                tracing::error!("{}", RELEASED);
                None
            }
            Target::Unbacked => None,
        }
    }

    // ========================================================================
    // Offset and clip
    // ========================================================================

    pub fn surface_offset(&self, id: SurfaceId) -> (i32, i32) {
        self.tiles.get(id).map_or((0, 0), |t| t.offset)
    }

    pub fn surface_set_offset(&mut self, id: SurfaceId, x: i32, y: i32) {
        match self.tiles.get_mut(id) {
            Some(entry) => entry.offset = (x, y),
            None => tracing::error!("surface {:?} has been freed", id),
        }
    }

    /// Current clip in surface coordinates
    pub fn surface_clip(&mut self, id: SurfaceId) -> Rect {
        self.with_target(id, |bitmap, (ox, oy)| bitmap.clip().translate(-ox, -oy))
            .unwrap_or_default()
    }

    /// Set the clip in surface coordinates; `None` resets to the whole surface
    pub fn surface_set_clip(&mut self, id: SurfaceId, rect: Option<Rect>) {
        self.with_target(id, |bitmap, (ox, oy)| bitmap.set_clip(rect.map(|r| r.translate(ox, oy))));
    }

    pub fn surface_set_clip_rect(&mut self, id: SurfaceId, x: i32, y: i32, w: u32, h: u32) {
        self.surface_set_clip(id, Some(Rect::new(x, y, w, h)));
    }

    /// Narrow the clip to its intersection with `rect`
    ///
    /// Returns the previous clip so the caller can restore it.
    pub fn surface_push_clip(&mut self, id: SurfaceId, rect: Rect) -> Rect {
        let previous = self.surface_clip(id);
        let narrowed = rect.intersect(&previous).unwrap_or(Rect::new(rect.x, rect.y, 0, 0));
        self.surface_set_clip(id, Some(narrowed));
        previous
    }

    // ========================================================================
    // Blits
    // ========================================================================

    /// Draw `src` at `(dx, dy)` in `dst`
    pub fn surface_blit(&mut self, src: SurfaceId, dst: SurfaceId, dx: i32, dy: i32) {
        self.blit_surface(src, None, dst, dx, dy, None);
    }

    /// Draw the `src_rect` part of `src` at `(dx, dy)` in `dst`
    pub fn surface_blit_clip(&mut self, src: SurfaceId, src_rect: Rect, dst: SurfaceId, dx: i32, dy: i32) {
        self.blit_surface(src, Some(src_rect), dst, dx, dy, None);
    }

    /// Draw `src` blended at the given opacity
    pub fn surface_blit_alpha(&mut self, src: SurfaceId, dst: SurfaceId, dx: i32, dy: i32, alpha: u8) {
        self.blit_surface(src, None, dst, dx, dy, Some(alpha));
    }

    fn blit_surface(
        &mut self,
        src: SurfaceId,
        src_rect: Option<Rect>,
        dst: SurfaceId,
        dx: i32,
        dy: i32,
        opacity: Option<u8>,
    ) {
        let Some(source) = self.resolve_bitmap(src) else {
            return;
        };
        self.with_target(dst, |target, (ox, oy)| {
            target.blit(&source, src_rect, dx + ox, dy + oy, opacity)
        });
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    fn draw(&mut self, id: SurfaceId, f: impl FnOnce(&mut Bitmap, i32, i32)) {
        self.with_target(id, |bitmap, (ox, oy)| f(bitmap, ox, oy));
    }

    pub fn surface_pixel(&mut self, id: SurfaceId, x: i32, y: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.put_pixel(x + ox, y + oy, color));
    }

    pub fn surface_hline(&mut self, id: SurfaceId, x1: i32, x2: i32, y: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.hline(x1 + ox, x2 + ox, y + oy, color));
    }

    pub fn surface_vline(&mut self, id: SurfaceId, x: i32, y1: i32, y2: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.vline(x + ox, y1 + oy, y2 + oy, color));
    }

    pub fn surface_rectangle(&mut self, id: SurfaceId, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.rectangle(x1 + ox, y1 + oy, x2 + ox, y2 + oy, color));
    }

    pub fn surface_box(&mut self, id: SurfaceId, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.fill_box(x1 + ox, y1 + oy, x2 + ox, y2 + oy, color));
    }

    pub fn surface_line(&mut self, id: SurfaceId, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.line(x1 + ox, y1 + oy, x2 + ox, y2 + oy, color, false));
    }

    pub fn surface_aaline(&mut self, id: SurfaceId, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.line(x1 + ox, y1 + oy, x2 + ox, y2 + oy, color, true));
    }

    pub fn surface_circle(&mut self, id: SurfaceId, x: i32, y: i32, r: u32, color: Color) {
        self.draw(id, |b, ox, oy| b.circle(x + ox, y + oy, r, color, ShapeStyle::Outline));
    }

    pub fn surface_aacircle(&mut self, id: SurfaceId, x: i32, y: i32, r: u32, color: Color) {
        self.draw(id, |b, ox, oy| b.circle(x + ox, y + oy, r, color, ShapeStyle::Antialiased));
    }

    pub fn surface_filled_circle(&mut self, id: SurfaceId, x: i32, y: i32, r: u32, color: Color) {
        self.draw(id, |b, ox, oy| b.circle(x + ox, y + oy, r, color, ShapeStyle::Filled));
    }

    pub fn surface_ellipse(&mut self, id: SurfaceId, x: i32, y: i32, rx: u32, ry: u32, color: Color) {
        self.draw(id, |b, ox, oy| b.ellipse(x + ox, y + oy, rx, ry, color, ShapeStyle::Outline));
    }

    pub fn surface_aaellipse(&mut self, id: SurfaceId, x: i32, y: i32, rx: u32, ry: u32, color: Color) {
        self.draw(id, |b, ox, oy| b.ellipse(x + ox, y + oy, rx, ry, color, ShapeStyle::Antialiased));
    }

    pub fn surface_filled_ellipse(&mut self, id: SurfaceId, x: i32, y: i32, rx: u32, ry: u32, color: Color) {
        self.draw(id, |b, ox, oy| b.ellipse(x + ox, y + oy, rx, ry, color, ShapeStyle::Filled));
    }

    pub fn surface_pie(&mut self, id: SurfaceId, x: i32, y: i32, r: u32, start: i32, end: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.pie(x + ox, y + oy, r, start, end, color, false));
    }

    pub fn surface_filled_pie(&mut self, id: SurfaceId, x: i32, y: i32, r: u32, start: i32, end: i32, color: Color) {
        self.draw(id, |b, ox, oy| b.pie(x + ox, y + oy, r, start, end, color, true));
    }

    pub fn surface_trigon(&mut self, id: SurfaceId, points: [(i32, i32); 3], color: Color) {
        self.draw(id, |b, ox, oy| b.trigon(offset_points(points, ox, oy), color, ShapeStyle::Outline));
    }

    pub fn surface_aatrigon(&mut self, id: SurfaceId, points: [(i32, i32); 3], color: Color) {
        self.draw(id, |b, ox, oy| b.trigon(offset_points(points, ox, oy), color, ShapeStyle::Antialiased));
    }

    pub fn surface_filled_trigon(&mut self, id: SurfaceId, points: [(i32, i32); 3], color: Color) {
        self.draw(id, |b, ox, oy| b.trigon(offset_points(points, ox, oy), color, ShapeStyle::Filled));
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    fn transformed(&mut self, id: SurfaceId, f: impl FnOnce(&Bitmap) -> Option<Bitmap>) -> Option<SurfaceId> {
        let source = self.resolve_bitmap(id)?;
        let bitmap = f(&source)?;
        Some(self.tile_from_bitmap(bitmap))
    }

    pub fn surface_rotozoom(&mut self, id: SurfaceId, angle: f64, zoom: f64, smooth: bool) -> Option<SurfaceId> {
        self.transformed(id, |b| b.rotozoom(angle, zoom, smooth))
    }

    pub fn surface_zoom(&mut self, id: SurfaceId, zoom_x: f64, zoom_y: f64, smooth: bool) -> Option<SurfaceId> {
        self.transformed(id, |b| b.zoom(zoom_x, zoom_y, smooth))
    }

    pub fn surface_shrink(&mut self, id: SurfaceId, factor_x: u32, factor_y: u32) -> Option<SurfaceId> {
        self.transformed(id, |b| b.shrink(factor_x, factor_y))
    }

    pub fn surface_resize(&mut self, id: SurfaceId, width: u32, height: u32, keep_aspect: bool) -> Option<SurfaceId> {
        self.transformed(id, |b| b.resize(width, height, keep_aspect))
    }

    // ========================================================================
    // Queries and output
    // ========================================================================

    /// Percentage of matching pixels, see [`compare_bitmaps`]
    pub fn surface_compare(&mut self, a: SurfaceId, b: SurfaceId, key: u32) -> u32 {
        match (self.resolve_bitmap(a), self.resolve_bitmap(b)) {
            (Some(a), Some(b)) => compare_bitmaps(&a, &b, key),
            _ => 0,
        }
    }

    /// Pixel size; tile-backed surfaces report the tile's minimum size
    pub fn surface_size(&mut self, id: SurfaceId) -> (u32, u32) {
        self.tile_min_size(id)
    }

    /// Bytes held by an owned bitmap; tile-backed surfaces report 0
    pub fn surface_byte_size(&self, id: SurfaceId) -> usize {
        match self.tiles.get(id).map(|t| &t.kind) {
            Some(TileKind::Bitmap(Some(bitmap))) => bitmap.byte_size(),
            _ => 0,
        }
    }

    pub fn surface_save_bmp(&mut self, id: SurfaceId, path: &Path) -> Result<(), RenderError> {
        self.save_surface(id, path, OutputFormat::Bmp)
    }

    pub fn surface_save_png(&mut self, id: SurfaceId, path: &Path) -> Result<(), RenderError> {
        self.save_surface(id, path, OutputFormat::Png)
    }

    fn save_surface(&mut self, id: SurfaceId, path: &Path, format: OutputFormat) -> Result<(), RenderError> {
        let bitmap = self.resolve_bitmap(id).ok_or(RenderError::NoPixels)?;
        codec::encode(&bitmap, path, format)
    }

    // ========================================================================
    // Lifetime
    // ========================================================================

    /// Free an owned bitmap now, keeping the surface id alive
    ///
    /// Tile-backed surfaces share their pixels and are left alone.
    pub fn surface_release(&mut self, id: SurfaceId) {
        let Some(entry) = self.tiles.get_mut(id) else {
            tracing::error!("surface {:?} has been freed", id);
            return;
        };
        release_pixels(entry);
    }

    /// Drop one reference to the surface
    pub fn surface_free(&mut self, id: SurfaceId) {
        self.release(id);
    }
}

fn release_pixels(entry: &mut TileEntry) {
    match &mut entry.kind {
        TileKind::Bitmap(bitmap) => {
            if let Some(bitmap) = bitmap.take() {
                tracing::info!("released {}x{} surface", bitmap.width(), bitmap.height());
            }
        }
        TileKind::Image(_) | TileKind::Grid(_) => {
            tracing::error!("release() called for a surface backed by a tile");
        }
        TileKind::Fill(_) => {}
    }
}

fn offset_points(points: [(i32, i32); 3], ox: i32, oy: i32) -> [(i32, i32); 3] {
    points.map(|(x, y)| (x + ox, y + oy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_applies_to_drawing_and_clip() {
        let mut ctx = RenderContext::default();
        let srf = ctx.surface_new_rgb(10, 10).unwrap();

        ctx.surface_set_offset(srf, 2, 3);
        ctx.surface_pixel(srf, 0, 0, Color::RED);
        ctx.surface_set_clip_rect(srf, 0, 0, 4, 4);
        assert_eq!(ctx.surface_clip(srf), Rect::new(0, 0, 4, 4));

        let bmp = ctx.resolve_bitmap(srf).unwrap();
        assert_eq!(bmp.pixel(2, 3), Some(Color::RED));
        assert_eq!(bmp.clip(), Rect::new(2, 3, 4, 4));
    }

    #[test]
    fn test_push_clip_returns_previous() {
        let mut ctx = RenderContext::default();
        let srf = ctx.surface_new_rgba(20, 20).unwrap();

        let prev = ctx.surface_push_clip(srf, Rect::new(5, 5, 100, 100));
        assert_eq!(prev, Rect::new(0, 0, 20, 20));
        assert_eq!(ctx.surface_clip(srf), Rect::new(5, 5, 15, 15));

        ctx.surface_set_clip(srf, Some(prev));
        assert_eq!(ctx.surface_clip(srf), Rect::new(0, 0, 20, 20));
    }

    #[test]
    fn test_blit_and_compare() {
        let mut ctx = RenderContext::default();
        let a = ctx.surface_new_rgb(4, 4).unwrap();
        let b = ctx.surface_new_rgb(4, 4).unwrap();
        assert_eq!(ctx.surface_compare(a, b, 0x123456), 100);

        ctx.surface_box(a, 0, 0, 1, 3, Color::WHITE);
        assert_eq!(ctx.surface_compare(a, b, 0x123456), 50);
        // Key matches the white half
        assert_eq!(ctx.surface_compare(a, b, 0xffffff), 100);

        ctx.surface_blit(a, b, 0, 0);
        assert_eq!(ctx.surface_compare(a, b, 0x123456), 100);

        let small = ctx.surface_new_rgb(2, 2).unwrap();
        assert_eq!(ctx.surface_compare(a, small, 0), 0);
    }

    #[test]
    fn test_blit_alpha_on_opaque_source() {
        let mut ctx = RenderContext::default();
        let src = ctx.surface_new_rgba(1, 1).unwrap();
        ctx.surface_box(src, 0, 0, 0, 0, Color::WHITE);
        let dst = ctx.surface_new_rgb(1, 1).unwrap();

        ctx.surface_blit_alpha(src, dst, 0, 0, 0);
        assert_eq!(ctx.resolve_bitmap(dst).unwrap().pixel(0, 0), Some(Color::BLACK));

        ctx.surface_blit_alpha(src, dst, 0, 0, 255);
        assert_eq!(ctx.resolve_bitmap(dst).unwrap().pixel(0, 0), Some(Color::WHITE));
    }

    #[test]
    fn test_release_owned_surface() {
        let mut ctx = RenderContext::default();
        let srf = ctx.surface_new_rgba(8, 8).unwrap();
        assert_eq!(ctx.surface_byte_size(srf), 256);

        ctx.surface_release(srf);
        assert_eq!(ctx.surface_byte_size(srf), 0);
        assert_eq!(ctx.surface_size(srf), (0, 0));
        // Drawing after release is a logged no-op
        ctx.surface_pixel(srf, 0, 0, Color::RED);
        assert!(ctx.resolve_bitmap(srf).is_none());

        ctx.surface_free(srf);
        assert!(!ctx.is_live(srf));
    }

    #[test]
    fn test_transforms_create_new_surfaces() {
        let mut ctx = RenderContext::default();
        let srf = ctx.surface_new_rgba(10, 4).unwrap();

        let zoomed = ctx.surface_zoom(srf, 2.0, 0.5, false).unwrap();
        assert_eq!(ctx.surface_size(zoomed), (20, 2));

        let shrunk = ctx.surface_shrink(srf, 2, 2).unwrap();
        assert_eq!(ctx.surface_size(shrunk), (5, 2));

        let resized = ctx.surface_resize(srf, 6, 6, true).unwrap();
        assert_eq!(ctx.surface_size(resized), (6, 6));

        let rotated = ctx.surface_rotozoom(srf, 90.0, 1.0, true).unwrap();
        assert_eq!(ctx.surface_size(rotated), (4, 10));
        assert_eq!(ctx.tile_count(), 5);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut ctx = RenderContext::default();
        let srf = ctx.surface_new_rgb(3, 3).unwrap();
        ctx.surface_save_png(srf, &path).unwrap();

        let loaded = ctx.surface_load_file(&path).unwrap();
        assert_eq!(ctx.surface_compare(srf, loaded, 0), 100);

        let fill = ctx.tile_fill_color(Color::RED);
        assert!(matches!(ctx.surface_save_png(fill, &path), Err(RenderError::NoPixels)));
    }
}
