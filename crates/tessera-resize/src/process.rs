//! Resize strategies
//!
//! All strategies resample with a smooth filter into a fresh RGBA bitmap.
//! Processing a request never retries: the outcome is final.

use tessera_render::{codec, AlphaFlags, Bitmap, Rect};

use crate::{ResizeError, ResizeLimits, ResizeOp, ResizeParams, ResizeRequest, ResizeStatus};

/// Output size for a meter strip of `sequence` frames
///
/// The strip is `width / 2` per frame (with `width` clamped to
/// `max_width`), keeping the source aspect ratio. If that is taller than
/// `height`, the height is pinned and the width cut down to a whole number
/// of frames.
pub fn strip_size(
    src: (u32, u32),
    width: u32,
    height: u32,
    sequence: u32,
    max_width: u32,
) -> Result<(u32, u32), ResizeError> {
    let (sw, sh) = (src.0 as u64, src.1 as u64);
    if sw == 0 || sh == 0 || sequence == 0 {
        return Err(ResizeError::Geometry(format!(
            "strip of {} frames from {}x{}",
            sequence, src.0, src.1
        )));
    }
    let seq = sequence as u64;

    let frame_width = if width > max_width { max_width / 2 } else { width / 2 };
    let mut w = frame_width as u64 * seq;
    let mut h = sh * w / sw;
    if h > height as u64 {
        h = height as u64;
        w = ((sw * h / sh) / seq) * seq;
    }

    tracing::debug!("strip {}x{} -> {}x{}", sw, sh, w, h);
    match (u32::try_from(w), u32::try_from(h)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(ResizeError::Geometry(format!("strip size {w}x{h}"))),
    }
}

/// Scale `src` to cover `width` x `height`, then crop around the center
pub fn cover_crop(src: &Bitmap, width: u32, height: u32) -> Option<Bitmap> {
    let (sw, sh) = src.size();
    let f = (width as f32 / sw as f32).max(height as f32 / sh as f32);
    // Round up so float error never leaves the scaled image short of the target
    let (tw, th) = ((f * sw as f32).ceil() as u32, (f * sh as f32).ceil() as u32);

    let mut scaled = src.resample(tw, th, true)?;
    scaled.set_alpha(AlphaFlags::COPY);

    let x = (tw as i32 - width as i32) / 2;
    let y = (th as i32 - height as i32) / 2;
    let mut out = Bitmap::new(width, height)?;
    out.blit(&scaled, Some(Rect::new(x, y, width, height)), 0, 0, None);
    Some(out)
}

/// Produce the output bitmap for `params` from a decoded source
pub fn resize_bitmap(src: &Bitmap, params: &ResizeParams, limits: &ResizeLimits) -> Result<Bitmap, ResizeError> {
    let (width, height) = match params.op {
        ResizeOp::Strip => strip_size(
            src.size(),
            params.width,
            params.height,
            params.sequence,
            limits.strip_max_width,
        )?,
        ResizeOp::Scale | ResizeOp::CoverCrop => (params.width, params.height),
    };

    let out = match params.op {
        ResizeOp::Strip | ResizeOp::Scale => src.resample(width, height, true),
        ResizeOp::CoverCrop => cover_crop(src, width, height),
    };
    out.ok_or_else(|| ResizeError::Geometry(format!("{}x{} from {}x{}", width, height, src.width(), src.height())))
}

fn run(params: &ResizeParams, limits: &ResizeLimits) -> Result<(), ResizeError> {
    let src = codec::decode_file(&params.src).map_err(|source| ResizeError::Load {
        path: params.src.clone(),
        source,
    })?;

    let mut out = resize_bitmap(&src, params, limits)?;
    // Output is always RGBA, whatever the source had
    out.set_has_alpha(true);

    codec::encode(&out, &params.dest, params.format).map_err(|source| ResizeError::Save {
        path: params.dest.clone(),
        source,
    })
}

/// Process one request and record its final status
pub fn process(request: &ResizeRequest, limits: &ResizeLimits) -> ResizeStatus {
    let params = request.params();
    tracing::debug!(
        "resizing {} -> {} {}x{} ({:?})",
        params.src.display(),
        params.dest.display(),
        params.width,
        params.height,
        params.op
    );

    let status = match run(params, limits) {
        Ok(()) => {
            tracing::debug!("saved {}", params.dest.display());
            ResizeStatus::Complete
        }
        Err(e) => {
            tracing::warn!("resize of {} failed: {}", params.src.display(), e);
            ResizeStatus::Error
        }
    };

    request.set_status(status);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_render::Color;

    fn bitmap(w: u32, h: u32) -> Bitmap {
        let mut bmp = Bitmap::new_opaque(w, h).unwrap();
        bmp.fill(Color::WHITE);
        bmp
    }

    #[test]
    fn test_strip_size_fits_width() {
        // 5 frames of 20x20
        assert_eq!(strip_size((100, 20), 40, 100, 5, 1280).unwrap(), (100, 20));
    }

    #[test]
    fn test_strip_size_pins_height() {
        // Too tall: height pinned, width a multiple of the frame count
        assert_eq!(strip_size((100, 20), 40, 10, 5, 1280).unwrap(), (50, 10));
        assert_eq!(strip_size((100, 30), 40, 10, 3, 1280).unwrap(), (33, 10));
    }

    #[test]
    fn test_strip_size_clamps_wide_targets() {
        assert_eq!(strip_size((1000, 10), 4000, 1000, 2, 1280).unwrap(), (1280, 12));
    }

    #[test]
    fn test_strip_size_rejects_bad_input() {
        assert!(strip_size((100, 20), 40, 10, 0, 1280).is_err());
        assert!(strip_size((0, 20), 40, 10, 1, 1280).is_err());
        assert!(strip_size((100, 20), 1, 10, 1, 1280).is_err());
    }

    #[test]
    fn test_cover_crop_centers() {
        let mut src = bitmap(400, 100);
        src.fill_rect(Rect::new(0, 0, 150, 100), Color::RED);
        src.fill_rect(Rect::new(250, 0, 150, 100), Color::BLUE);

        let out = cover_crop(&src, 100, 100).unwrap();
        assert_eq!(out.size(), (100, 100));
        assert_eq!(out.pixel(0, 0), Some(Color::WHITE));
        assert_eq!(out.pixel(99, 99), Some(Color::WHITE));
    }

    #[test]
    fn test_cover_crop_fills_every_edge() {
        // 31 / 7 * 7 is just under 31 in f32
        let out = cover_crop(&bitmap(7, 7), 31, 31).unwrap();
        assert_eq!(out.size(), (31, 31));
        assert_eq!(out.pixel(30, 30), Some(Color::WHITE));
        assert_eq!(out.pixel(30, 0), Some(Color::WHITE));
        assert_eq!(out.pixel(0, 30), Some(Color::WHITE));
    }

    #[test]
    fn test_scale_exact() {
        let params = ResizeParams {
            src: "unused".into(),
            dest: "unused".into(),
            width: 200,
            height: 100,
            sequence: 1,
            op: ResizeOp::Scale,
            format: tessera_render::OutputFormat::Png,
        };
        let out = resize_bitmap(&bitmap(400, 100), &params, &ResizeLimits::default()).unwrap();
        assert_eq!(out.size(), (200, 100));
    }
}
