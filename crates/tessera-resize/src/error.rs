use std::path::PathBuf;

use tessera_render::RenderError;

/// Resize failures
#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("failed to start resize worker: {0}")]
    Spawn(#[source] std::io::Error),
}
