//! Tessera System
//!
//! Platform plumbing shared by the rendering and resize crates:
//! - Resource lookup along a `;`-separated search path
//! - Crash-safe file replacement
//! - A fire-and-forget background command executor

pub mod atomic;
pub mod exec;
pub mod finder;

pub use atomic::atomic_write;
pub use exec::BackgroundExec;
pub use finder::SearchPath;

/// System-level errors
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn background worker: {0}")]
    Spawn(std::io::Error),
}

impl SystemError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }
}
