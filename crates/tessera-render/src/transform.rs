//! Bitmap transforms
//!
//! Every transform returns a new bitmap and leaves the source untouched.

use image::imageops::{self, FilterType};
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

use crate::{AlphaFlags, Bitmap, Rect};

fn filter(smooth: bool) -> FilterType {
    if smooth {
        FilterType::Triangle
    } else {
        FilterType::Nearest
    }
}

impl Bitmap {
    /// Same flags as `self`, new pixels
    fn derived(&self, pixmap: Pixmap) -> Bitmap {
        let mut bitmap = Bitmap::from_pixmap(pixmap, self.has_alpha());
        bitmap.set_alpha(self.alpha());
        bitmap
    }

    /// Scale to exactly `width` x `height`
    pub fn resample(&self, width: u32, height: u32, smooth: bool) -> Option<Bitmap> {
        if width == 0 || height == 0 {
            return None;
        }
        let scaled = imageops::resize(&self.to_rgba_image(), width, height, filter(smooth));
        let mut bitmap = Bitmap::from_rgba_image(scaled, self.has_alpha())?;
        bitmap.set_alpha(self.alpha());
        Some(bitmap)
    }

    /// Copy of the part of `self` inside `rect`
    pub fn crop(&self, rect: Rect) -> Option<Bitmap> {
        let r = rect.intersect(&self.bounds())?;
        let mut pixmap = Pixmap::new(r.w, r.h)?;

        let stride = self.width() as usize;
        let src = self.pixmap().pixels();
        for (row, dst) in pixmap.pixels_mut().chunks_exact_mut(r.w as usize).enumerate() {
            let start = (r.y as usize + row) * stride + r.x as usize;
            dst.copy_from_slice(&src[start..start + r.w as usize]);
        }

        Some(self.derived(pixmap))
    }

    /// Rotate counter-clockwise by `angle` degrees and scale by `zoom`
    ///
    /// The result is sized to hold the whole rotated image; uncovered
    /// corners are transparent.
    pub fn rotozoom(&self, angle: f64, zoom: f64, smooth: bool) -> Option<Bitmap> {
        let (sw, sh) = (self.width() as f64, self.height() as f64);
        let (sin, cos) = angle.to_radians().sin_cos();

        // Rounding noise must not add a row or column at right angles
        let dim = |v: f64| (v - 1e-6).ceil().max(1.0) as u32;
        let (zw, zh) = (sw * zoom.abs(), sh * zoom.abs());
        let width = dim(zw * cos.abs() + zh * sin.abs());
        let height = dim(zw * sin.abs() + zh * cos.abs());
        let mut pixmap = Pixmap::new(width, height)?;

        let zoom = zoom as f32;
        let transform = Transform::from_translate(width as f32 / 2.0, height as f32 / 2.0)
            .pre_concat(Transform::from_rotate(-(angle as f32)))
            .pre_concat(Transform::from_scale(zoom, zoom))
            .pre_concat(Transform::from_translate(-(sw as f32) / 2.0, -(sh as f32) / 2.0));
        let paint = PixmapPaint {
            quality: if smooth { FilterQuality::Bilinear } else { FilterQuality::Nearest },
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, self.pixmap().as_ref(), &paint, transform, None);

        let mut bitmap = Bitmap::from_pixmap(pixmap, true);
        bitmap.set_alpha(self.alpha());
        Some(bitmap)
    }

    /// Scale each axis independently; a negative factor also mirrors
    pub fn zoom(&self, zoom_x: f64, zoom_y: f64, smooth: bool) -> Option<Bitmap> {
        let width = (self.width() as f64 * zoom_x.abs()).round().max(1.0) as u32;
        let height = (self.height() as f64 * zoom_y.abs()).round().max(1.0) as u32;

        let mut scaled = imageops::resize(&self.to_rgba_image(), width, height, filter(smooth));
        if zoom_x < 0.0 {
            imageops::flip_horizontal_in_place(&mut scaled);
        }
        if zoom_y < 0.0 {
            imageops::flip_vertical_in_place(&mut scaled);
        }

        let mut bitmap = Bitmap::from_rgba_image(scaled, self.has_alpha())?;
        bitmap.set_alpha(self.alpha());
        Some(bitmap)
    }

    /// Integer downscale averaging each `factor_x` x `factor_y` block
    pub fn shrink(&self, factor_x: u32, factor_y: u32) -> Option<Bitmap> {
        let (fx, fy) = (factor_x.max(1), factor_y.max(1));
        let (width, height) = (self.width() / fx, self.height() / fy);
        let mut pixmap = Pixmap::new(width, height)?;

        let stride = self.width() as usize;
        let src = self.pixmap().pixels();
        let n = fx * fy;

        for (i, dst) in pixmap.pixels_mut().iter_mut().enumerate() {
            let (x, y) = ((i % width as usize) as u32, (i / width as usize) as u32);
            let mut sum = [0u32; 4];
            for by in 0..fy {
                let row = ((y * fy + by) as usize) * stride;
                for bx in 0..fx {
                    let p = src[row + (x * fx + bx) as usize];
                    sum[0] += p.red() as u32;
                    sum[1] += p.green() as u32;
                    sum[2] += p.blue() as u32;
                    sum[3] += p.alpha() as u32;
                }
            }
            *dst = PremultipliedColorU8::from_rgba(
                (sum[0] / n) as u8,
                (sum[1] / n) as u8,
                (sum[2] / n) as u8,
                (sum[3] / n) as u8,
            )
            .unwrap_or(PremultipliedColorU8::TRANSPARENT);
        }

        Some(self.derived(pixmap))
    }

    /// Resample into a new `width` x `height` bitmap
    ///
    /// With `keep_aspect` the image is scaled to fit and centered; the
    /// letterbox stays transparent.
    pub fn resize(&self, width: u32, height: u32, keep_aspect: bool) -> Option<Bitmap> {
        let mut out = Bitmap::new(width, height)?;
        let (sw, sh) = self.size();

        let (dw, dh, ox, oy) = if keep_aspect {
            let w_aspect = width as f32 / sw as f32;
            let h_aspect = height as f32 / sh as f32;
            if w_aspect <= h_aspect {
                let dh = (sh as f32 * w_aspect) as u32;
                (width, dh, 0, (height.saturating_sub(dh) / 2) as i32)
            } else {
                let dw = (sw as f32 * h_aspect) as u32;
                (dw, height, (width.saturating_sub(dw) / 2) as i32, 0)
            }
        } else {
            (width, height, 0, 0)
        };

        tracing::debug!("Resize ox: {} oy: {} dw: {} dh: {} sw: {} sh: {}", ox, oy, dw, dh, sw, sh);

        if let Some(mut scaled) = self.resample(dw, dh, true) {
            scaled.set_alpha(AlphaFlags::COPY);
            out.blit(&scaled, None, ox, oy, None);
        }
        Some(out)
    }
}
