//! Tessera Resize
//!
//! Asynchronous image resizing for artwork and meter strips.
//!
//! Requests are submitted from the UI thread and processed one at a time on
//! a dedicated worker. Every request is remembered: submitting the same
//! source, destination and size again reports the status of the first
//! request instead of queueing new work, so callers simply poll by
//! resubmitting.

mod error;
mod process;
mod queue;
mod request;
mod worker;

pub use error::ResizeError;
pub use process::{cover_crop, process, resize_bitmap, strip_size};
pub use queue::ResizeQueue;
pub use request::{ResizeOp, ResizeParams, ResizeRequest, ResizeStatus};
pub use worker::ResizeWorker;

pub use tessera_render::OutputFormat;

/// Tunables for the resize strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeLimits {
    /// Widths above this are clamped before computing a strip size
    pub strip_max_width: u32,
}

impl Default for ResizeLimits {
    fn default() -> Self {
        Self { strip_max_width: 1280 }
    }
}
