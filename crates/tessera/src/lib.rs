//! Tessera
//!
//! Image tiles, drawing surfaces and background image work for a skinned
//! application shell.
//!
//! # Example
//! ```rust,ignore
//! use tessera::{Config, Shell};
//!
//! let mut shell = Shell::new(Config::default())?;
//! let frame = shell.load_vertical([Some("top.png"), Some("mid.png"), Some("bottom.png")]);
//! let status = shell.submit_resize("art.jpg", "art_100.png", 100, 100, 1, 3, "png");
//! ```

mod config;
mod shell;

use std::path::PathBuf;

pub use config::Config;
pub use shell::Shell;

// Re-export sub-crates for advanced usage
pub use tessera_render as render;
pub use tessera_resize as resize;
pub use tessera_system as system;

pub use tessera_render::{Color, Rect, SurfaceId, TileId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Shell startup failures
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    System(#[from] tessera_system::SystemError),

    #[error(transparent)]
    Resize(#[from] tessera_resize::ResizeError),
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or `default_filter`
/// when it is unset or invalid
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
