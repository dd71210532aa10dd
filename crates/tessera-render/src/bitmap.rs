//! Premultiplied RGBA bitmap with a clip rectangle
//!
//! Blits and rectangle fills are plain pixel loops; curved and diagonal
//! primitives are rasterized by tiny-skia through a clip mask.

use image::RgbaImage;
use tiny_skia::{
    ColorU8, FillRule, IntSize, Mask, Paint, Path, PathBuilder, Pixmap, PremultipliedColorU8,
    Stroke, Transform,
};

use crate::{Color, Rect};

/// How a bitmap is combined with the destination when used as a blit source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaFlags {
    /// Source-over blending; when false pixels are copied verbatim
    pub blend: bool,
    /// Per-surface opacity applied on top of per-pixel alpha
    pub opacity: u8,
}

impl AlphaFlags {
    pub const COPY: AlphaFlags = AlphaFlags { blend: false, opacity: 255 };
    pub const BLEND: AlphaFlags = AlphaFlags { blend: true, opacity: 255 };

    pub const fn with_opacity(opacity: u8) -> Self {
        Self { blend: true, opacity }
    }
}

impl Default for AlphaFlags {
    fn default() -> Self {
        Self::BLEND
    }
}

/// Outline, anti-aliased outline, or filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeStyle {
    Outline,
    Antialiased,
    Filled,
}

/// A pixel buffer in the compositor's native (premultiplied RGBA) format
#[derive(Clone)]
pub struct Bitmap {
    pixmap: Pixmap,
    has_alpha: bool,
    alpha: AlphaFlags,
    clip: Rect,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("has_alpha", &self.has_alpha)
            .field("alpha", &self.alpha)
            .field("clip", &self.clip)
            .finish()
    }
}

impl Bitmap {
    /// Transparent bitmap with an alpha channel
    pub fn new(width: u32, height: u32) -> Option<Self> {
        let pixmap = Pixmap::new(width, height)?;
        Some(Self::from_pixmap(pixmap, true))
    }

    /// Opaque black bitmap without an alpha channel
    pub fn new_opaque(width: u32, height: u32) -> Option<Self> {
        let mut pixmap = Pixmap::new(width, height)?;
        pixmap.fill(tiny_skia::Color::BLACK);
        Some(Self::from_pixmap(pixmap, false))
    }

    pub(crate) fn from_pixmap(pixmap: Pixmap, has_alpha: bool) -> Self {
        let clip = Rect::new(0, 0, pixmap.width(), pixmap.height());
        Self {
            pixmap,
            has_alpha,
            alpha: AlphaFlags::default(),
            clip,
        }
    }

    /// Convert straight-alpha RGBA pixels into a bitmap
    pub fn from_rgba_image(img: RgbaImage, has_alpha: bool) -> Option<Self> {
        let (width, height) = img.dimensions();
        let size = IntSize::from_wh(width, height)?;
        let mut data = img.into_raw();

        for px in data.chunks_exact_mut(4) {
            let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
            px.copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }

        let pixmap = Pixmap::from_vec(data, size)?;
        Some(Self::from_pixmap(pixmap, has_alpha))
    }

    /// Straight-alpha copy of the pixels
    pub fn to_rgba_image(&self) -> RgbaImage {
        let width = self.width() as usize;
        let pixels = self.pixmap.pixels();
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            let c = pixels[y as usize * width + x as usize].demultiply();
            image::Rgba([c.red(), c.green(), c.blue(), c.alpha()])
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width(), self.height())
    }

    /// Bytes of pixel storage
    pub fn byte_size(&self) -> usize {
        self.pixmap.data().len()
    }

    /// Whether the source image carried an alpha channel
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Mark the bitmap as carrying meaningful alpha (affects encoding)
    pub fn set_has_alpha(&mut self, has_alpha: bool) {
        self.has_alpha = has_alpha;
    }

    pub fn alpha(&self) -> AlphaFlags {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: AlphaFlags) {
        self.alpha = alpha;
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    /// Restrict drawing to `rect`; `None` resets to the full bitmap
    pub fn set_clip(&mut self, rect: Option<Rect>) {
        let bounds = self.bounds();
        self.clip = match rect {
            None => bounds,
            Some(r) => r.intersect(&bounds).unwrap_or_default(),
        };
    }

    /// Straight-alpha color at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some(Color::rgba(c.red(), c.green(), c.blue(), c.alpha()))
    }

    /// Fill the whole bitmap, ignoring the clip
    pub fn fill(&mut self, color: Color) {
        let px = color.premultiply();
        self.pixmap.pixels_mut().fill(px);
    }

    /// Copy or blend `src` (optionally a sub-rectangle of it) to `(dx, dy)`
    ///
    /// Only pixels inside this bitmap's clip rectangle are written.
    /// `opacity` overrides the source's own per-surface opacity and forces
    /// blending.
    pub fn blit(&mut self, src: &Bitmap, src_rect: Option<Rect>, dx: i32, dy: i32, opacity: Option<u8>) {
        let requested = src_rect.unwrap_or(src.bounds());
        let Some(sr) = requested.intersect(&src.bounds()) else {
            return;
        };
        // Whatever was cut off the source's top-left shifts the destination too
        let dx = dx.saturating_add(sr.x.saturating_sub(requested.x));
        let dy = dy.saturating_add(sr.y.saturating_sub(requested.y));
        let Some(dr) = Rect::new(dx, dy, sr.w, sr.h).intersect(&self.clip) else {
            return;
        };

        let sx = (sr.x + dr.x - dx) as usize;
        let sy = (sr.y + dr.y - dy) as usize;
        let w = dr.w as usize;
        // An explicit opacity always blends
        let copy = opacity.is_none() && !src.alpha.blend && src.alpha.opacity == 255;
        let opacity = opacity.unwrap_or(src.alpha.opacity);

        let src_stride = src.width() as usize;
        let dst_stride = self.width() as usize;
        let src_px = src.pixmap.pixels();
        let dst_px = self.pixmap.pixels_mut();

        for row in 0..dr.h as usize {
            let s = (sy + row) * src_stride + sx;
            let d = (dr.y as usize + row) * dst_stride + dr.x as usize;
            let (src_row, dst_row) = (&src_px[s..s + w], &mut dst_px[d..d + w]);

            if copy {
                dst_row.copy_from_slice(src_row);
            } else {
                for (dp, sp) in dst_row.iter_mut().zip(src_row) {
                    *dp = blend(*dp, *sp, opacity);
                }
            }
        }
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    pub fn put_pixel(&mut self, x: i32, y: i32, color: Color) {
        self.fill_rect(Rect::new(x, y, 1, 1), color);
    }

    pub fn hline(&mut self, x1: i32, x2: i32, y: i32, color: Color) {
        self.fill_box(x1, y, x2, y, color);
    }

    pub fn vline(&mut self, x: i32, y1: i32, y2: i32, color: Color) {
        self.fill_box(x, y1, x, y2, color);
    }

    /// One pixel outline of the box spanning both corners (inclusive)
    pub fn rectangle(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));

        self.hline(x1, x2, y1, color);
        if y2 > y1 {
            self.hline(x1, x2, y2, color);
        }
        if y1.abs_diff(y2) > 1 {
            self.vline(x1, y1 + 1, y2 - 1, color);
            if x2 > x1 {
                self.vline(x2, y1 + 1, y2 - 1, color);
            }
        }
    }

    /// Filled box spanning both corners (inclusive)
    pub fn fill_box(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        // Clamp to the clip first so extreme corners can't overflow the size
        let clip = self.clip;
        let (x1, x2) = (x1.max(clip.x), x2.min(clip.right().saturating_sub(1)));
        let (y1, y2) = (y1.max(clip.y), y2.min(clip.bottom().saturating_sub(1)));
        if x2 < x1 || y2 < y1 {
            return;
        }
        let w = x1.abs_diff(x2) + 1;
        let h = y1.abs_diff(y2) + 1;
        self.fill_rect(Rect::new(x1, y1, w, h), color);
    }

    /// Fill `rect`, blending when `color` is translucent
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(r) = rect.intersect(&self.clip) else {
            return;
        };
        let px = color.premultiply();
        let stride = self.width() as usize;
        let pixels = self.pixmap.pixels_mut();

        for y in r.y as usize..r.bottom() as usize {
            let row = &mut pixels[y * stride + r.x as usize..y * stride + r.right() as usize];
            if color.a == 255 {
                row.fill(px);
            } else {
                for dp in row.iter_mut() {
                    *dp = blend(*dp, px, 255);
                }
            }
        }
    }

    pub fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color, anti_alias: bool) {
        if x1 == x2 || y1 == y2 {
            self.fill_box(x1, y1, x2, y2, color);
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(x1 as f32 + 0.5, y1 as f32 + 0.5);
        pb.line_to(x2 as f32 + 0.5, y2 as f32 + 0.5);
        if let Some(path) = pb.finish() {
            self.stroke_path(&path, color, anti_alias);
        }
    }

    pub fn circle(&mut self, x: i32, y: i32, radius: u32, color: Color, style: ShapeStyle) {
        if radius == 0 {
            self.put_pixel(x, y, color);
            return;
        }
        if let Some(path) = PathBuilder::from_circle(x as f32 + 0.5, y as f32 + 0.5, radius as f32) {
            self.draw_path(&path, color, style);
        }
    }

    pub fn ellipse(&mut self, x: i32, y: i32, rx: u32, ry: u32, color: Color, style: ShapeStyle) {
        if rx == 0 || ry == 0 {
            self.line(x - rx as i32, y - ry as i32, x + rx as i32, y + ry as i32, color, false);
            return;
        }
        let oval = tiny_skia::Rect::from_xywh(
            x as f32 - rx as f32 + 0.5,
            y as f32 - ry as f32 + 0.5,
            2.0 * rx as f32,
            2.0 * ry as f32,
        );
        if let Some(path) = oval.and_then(PathBuilder::from_oval) {
            self.draw_path(&path, color, style);
        }
    }

    /// Circle sector between two angles in degrees, clockwise from +x
    pub fn pie(&mut self, x: i32, y: i32, radius: u32, start: i32, end: i32, color: Color, filled: bool) {
        let (cx, cy, r) = (x as f32 + 0.5, y as f32 + 0.5, radius as f32);
        let start = start.rem_euclid(360) as f32;
        let mut end = end.rem_euclid(360) as f32;
        if end <= start {
            end += 360.0;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(cx, cy);
        let steps = ((end - start) / 4.0).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let deg = start + (end - start) * i as f32 / steps as f32;
            let rad = deg.to_radians();
            pb.line_to(cx + r * rad.cos(), cy + r * rad.sin());
        }
        pb.close();

        if let Some(path) = pb.finish() {
            let style = if filled { ShapeStyle::Filled } else { ShapeStyle::Outline };
            self.draw_path(&path, color, style);
        }
    }

    pub fn trigon(&mut self, points: [(i32, i32); 3], color: Color, style: ShapeStyle) {
        let mut pb = PathBuilder::new();
        let [(x1, y1), (x2, y2), (x3, y3)] = points;
        pb.move_to(x1 as f32 + 0.5, y1 as f32 + 0.5);
        pb.line_to(x2 as f32 + 0.5, y2 as f32 + 0.5);
        pb.line_to(x3 as f32 + 0.5, y3 as f32 + 0.5);
        pb.close();
        if let Some(path) = pb.finish() {
            self.draw_path(&path, color, style);
        }
    }

    fn draw_path(&mut self, path: &Path, color: Color, style: ShapeStyle) {
        match style {
            ShapeStyle::Outline => self.stroke_path(path, color, false),
            ShapeStyle::Antialiased => self.stroke_path(path, color, true),
            ShapeStyle::Filled => self.fill_path(path, color),
        }
    }

    fn fill_path(&mut self, path: &Path, color: Color) {
        let paint = paint(color, false);
        let mask = self.clip_mask();
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, Transform::identity(), mask.as_ref());
    }

    fn stroke_path(&mut self, path: &Path, color: Color, anti_alias: bool) {
        let paint = paint(color, anti_alias);
        let stroke = Stroke { width: 1.0, ..Stroke::default() };
        let mask = self.clip_mask();
        self.pixmap
            .stroke_path(path, &paint, &stroke, Transform::identity(), mask.as_ref());
    }

    /// Mask covering the clip rectangle, `None` when nothing is clipped
    fn clip_mask(&self) -> Option<Mask> {
        if self.clip == self.bounds() {
            return None;
        }

        // An empty clip still needs a mask so nothing gets drawn
        let mut mask = Mask::new(self.width(), self.height())?;
        let rect = tiny_skia::Rect::from_xywh(
            self.clip.x as f32,
            self.clip.y as f32,
            self.clip.w as f32,
            self.clip.h as f32,
        );
        if let Some(rect) = rect {
            let path = PathBuilder::from_rect(rect);
            mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
        }
        Some(mask)
    }
}

fn paint(color: Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = anti_alias;
    paint
}

#[inline]
fn div255(v: u32) -> u32 {
    let v = v + 128;
    (v + (v >> 8)) >> 8
}

/// Source-over for premultiplied pixels with an extra opacity factor
#[inline]
fn blend(dst: PremultipliedColorU8, src: PremultipliedColorU8, opacity: u8) -> PremultipliedColorU8 {
    let op = opacity as u32;
    let scale = |c: u8| if op == 255 { c as u32 } else { div255(c as u32 * op) };
    let (sr, sg, sb, sa) = (scale(src.red()), scale(src.green()), scale(src.blue()), scale(src.alpha()));

    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return PremultipliedColorU8::from_rgba(sr as u8, sg as u8, sb as u8, 255).unwrap_or(dst);
    }

    let inv = 255 - sa;
    let r = sr + div255(dst.red() as u32 * inv);
    let g = sg + div255(dst.green() as u32 * inv);
    let b = sb + div255(dst.blue() as u32 * inv);
    let a = sa + div255(dst.alpha() as u32 * inv);

    PremultipliedColorU8::from_rgba(r as u8, g as u8, b as u8, a as u8).unwrap_or(dst)
}
