//! Resize worker thread

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::{process, ResizeError, ResizeLimits, ResizeParams, ResizeQueue, ResizeStatus};

/// Owns the queue and the single thread draining it
pub struct ResizeWorker {
    queue: Arc<ResizeQueue>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    limits: ResizeLimits,
}

impl std::fmt::Debug for ResizeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeWorker")
            .field("queue", &self.queue)
            .field("running", &self.thread.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}

impl ResizeWorker {
    /// Spawn the worker thread
    pub fn start(limits: ResizeLimits) -> Result<Self, ResizeError> {
        let queue = Arc::new(ResizeQueue::new());
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let (queue, stop) = (Arc::clone(&queue), Arc::clone(&stop));
            thread::Builder::new()
                .name("resize-worker".into())
                .spawn(move || {
                    while let Some(request) = queue.wait_pop(&stop) {
                        process(&request, &limits);
                    }
                    tracing::debug!("resize worker exiting");
                })
                .map_err(ResizeError::Spawn)?
        };

        tracing::info!("started resize worker thread");
        Ok(Self {
            queue,
            stop,
            thread: Some(thread),
            limits,
        })
    }

    /// Submit or poll a request; see [`ResizeQueue::submit`]
    ///
    /// Once the worker is stopped nothing would ever process new work, so
    /// every submission reports [`ResizeStatus::Error`].
    pub fn submit(&self, params: ResizeParams) -> ResizeStatus {
        if self.thread.is_none() {
            tracing::error!("resize worker is stopped, rejecting {}", params.src.display());
            return ResizeStatus::Error;
        }
        self.queue.submit(params)
    }

    pub fn queue(&self) -> &ResizeQueue {
        &self.queue
    }

    pub fn limits(&self) -> ResizeLimits {
        self.limits
    }

    /// Stop after the request in progress and join the thread
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            tracing::info!("waiting for resize worker to terminate");
            self.queue.stop(&self.stop);
            let _ = thread.join();
        }
    }
}

impl Drop for ResizeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OutputFormat, ResizeOp};

    fn params(dir: &std::path::Path) -> ResizeParams {
        ResizeParams {
            src: dir.join("missing.png"),
            dest: dir.join("out.png"),
            width: 10,
            height: 10,
            sequence: 1,
            op: ResizeOp::Scale,
            format: OutputFormat::Png,
        }
    }

    #[test]
    fn test_missing_source_ends_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let params = params(dir.path());

        let worker = ResizeWorker::start(ResizeLimits::default()).unwrap();
        let mut status = worker.submit(params.clone());
        for _ in 0..500 {
            if status != ResizeStatus::Pending {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
            status = worker.submit(params.clone());
        }
        assert_eq!(status, ResizeStatus::Error);
        assert!(!params.dest.exists());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut worker = ResizeWorker::start(ResizeLimits::default()).unwrap();
        worker.shutdown();
        worker.shutdown();
        assert_eq!(worker.queue().pending(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = ResizeWorker::start(ResizeLimits::default()).unwrap();
        worker.shutdown();

        assert_eq!(worker.submit(params(dir.path())), ResizeStatus::Error);
        assert_eq!(worker.submit(params(dir.path())), ResizeStatus::Error);
        assert_eq!(worker.queue().pending(), 0);
        assert_eq!(worker.queue().submitted(), 0);
    }
}
