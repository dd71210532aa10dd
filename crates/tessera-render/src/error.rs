//! Render error types

use std::path::{Path, PathBuf};

/// Errors from decoding, encoding and surface access
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to decode image data: {0}")]
    DecodeData(#[source] image::ImageError),

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: tessera_system::SystemError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bitmap size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("surface has no pixels")]
    NoPixels,
}

impl RenderError {
    pub(crate) fn decode(path: &Path, source: image::ImageError) -> Self {
        Self::Decode { path: path.to_path_buf(), source }
    }

    pub(crate) fn encode(path: &Path, source: image::ImageError) -> Self {
        Self::Encode { path: path.to_path_buf(), source }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}
