//! Image decoding and encoding
//!
//! Decoding goes through the image crate and ends in the compositor's
//! premultiplied format. Header probing reads only as much of the file as
//! the decoder needs to report dimensions.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use tessera_system::atomic_write;

use crate::{Bitmap, RenderError};

/// Dimensions and alpha presence read from an image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// File format for saved bitmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Bmp,
    #[default]
    Png,
}

impl OutputFormat {
    /// `"bmp"` (any case) selects BMP; anything else is PNG
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("bmp") {
            OutputFormat::Bmp
        } else {
            OutputFormat::Png
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Bmp => "bmp",
            OutputFormat::Png => "png",
        }
    }
}

/// Decode an image file
pub fn decode_file(path: &Path) -> Result<Bitmap, RenderError> {
    let img = ImageReader::open(path)
        .map_err(|e| RenderError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| RenderError::io(path, e))?
        .decode()
        .map_err(|e| RenderError::decode(path, e))?;

    into_bitmap(img)
}

/// Decode an in-memory encoded image
pub fn decode_bytes(bytes: &[u8]) -> Result<Bitmap, RenderError> {
    let img = image::load_from_memory(bytes).map_err(RenderError::DecodeData)?;
    into_bitmap(img)
}

/// Read dimensions and alpha presence without decoding pixels
pub fn read_header(path: &Path) -> Result<ImageInfo, RenderError> {
    let decoder = ImageReader::open(path)
        .map_err(|e| RenderError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| RenderError::io(path, e))?
        .into_decoder()
        .map_err(|e| RenderError::decode(path, e))?;

    let (width, height) = decoder.dimensions();
    Ok(ImageInfo {
        width,
        height,
        has_alpha: decoder.color_type().has_alpha(),
    })
}

/// Write `bitmap` to `path`
///
/// BMP output is 24-bit; PNG keeps the alpha channel when the bitmap has one.
/// The file is replaced atomically, so a reader never sees partial output.
pub fn encode(bitmap: &Bitmap, path: &Path, format: OutputFormat) -> Result<(), RenderError> {
    let rgba = DynamicImage::ImageRgba8(bitmap.to_rgba_image());
    let img = match format {
        OutputFormat::Png if bitmap.has_alpha() => rgba,
        _ => DynamicImage::ImageRgb8(rgba.to_rgb8()),
    };
    let image_format = match format {
        OutputFormat::Bmp => ImageFormat::Bmp,
        OutputFormat::Png => ImageFormat::Png,
    };

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image_format).map_err(|e| RenderError::encode(path, e))?;
    atomic_write(path, buf.get_ref()).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("saved {}x{} bitmap to {}", bitmap.width(), bitmap.height(), path.display());
    Ok(())
}

fn into_bitmap(img: DynamicImage) -> Result<Bitmap, RenderError> {
    let has_alpha = img.color().has_alpha();
    let (width, height) = (img.width(), img.height());
    Bitmap::from_rgba_image(img.into_rgba8(), has_alpha).ok_or(RenderError::InvalidSize { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_output_format_from_name() {
        assert_eq!(OutputFormat::from_name("bmp"), OutputFormat::Bmp);
        assert_eq!(OutputFormat::from_name("BMP"), OutputFormat::Bmp);
        assert_eq!(OutputFormat::from_name("png"), OutputFormat::Png);
        assert_eq!(OutputFormat::from_name("jpeg"), OutputFormat::Png);
    }

    #[test]
    fn test_png_round_trip_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");

        let mut bmp = Bitmap::new(6, 4).unwrap();
        bmp.fill(Color::RED);
        encode(&bmp, &path, OutputFormat::Png).unwrap();

        let info = read_header(&path).unwrap();
        assert_eq!((info.width, info.height), (6, 4));
        assert!(info.has_alpha);

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.size(), (6, 4));
        assert_eq!(decoded.pixel(5, 3), Some(Color::RED));
    }

    #[test]
    fn test_bmp_is_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bmp");

        let bmp = Bitmap::new_opaque(3, 3).unwrap();
        encode(&bmp, &path, OutputFormat::Bmp).unwrap();

        let decoded = decode_file(&path).unwrap();
        assert!(!decoded.has_alpha());
        assert_eq!(decoded.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_bytes(b"not an image"), Err(RenderError::DecodeData(_))));
        assert!(matches!(
            decode_file(Path::new("/definitely/missing.png")),
            Err(RenderError::Io { .. })
        ));
    }
}
