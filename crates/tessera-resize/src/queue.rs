//! Request queue
//!
//! Pending requests form a stack: the most recently submitted request is
//! processed first, which favours whatever the user is looking at now.
//! Every request is also kept in a permanent list used to answer repeat
//! submissions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::{ResizeParams, ResizeRequest, ResizeStatus};

#[derive(Default)]
struct QueueState {
    pending: Vec<Arc<ResizeRequest>>,
    all: Vec<Arc<ResizeRequest>>,
}

/// Memoizing LIFO queue shared by submitters and the worker
#[derive(Default)]
pub struct ResizeQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl ResizeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a request unless an identical one was seen before
    ///
    /// Returns the earlier request's current status for a repeat, or
    /// `Pending` for new work.
    pub fn submit(&self, params: ResizeParams) -> ResizeStatus {
        let mut state = self.lock();

        if let Some(existing) = state.all.iter().find(|r| r.params().same_target(&params)) {
            return existing.status();
        }

        tracing::debug!(
            "queued resize {} -> {} {}x{}",
            params.src.display(),
            params.dest.display(),
            params.width,
            params.height
        );
        let request = Arc::new(ResizeRequest::new(params));
        state.pending.push(Arc::clone(&request));
        state.all.push(request);
        drop(state);

        self.condvar.notify_one();
        ResizeStatus::Pending
    }

    /// Take the most recently submitted pending request
    pub fn pop(&self) -> Option<Arc<ResizeRequest>> {
        self.lock().pending.pop()
    }

    /// Block until a request is available or `stop` is set
    pub(crate) fn wait_pop(&self, stop: &AtomicBool) -> Option<Arc<ResizeRequest>> {
        let mut state = self.lock();
        loop {
            if stop.load(Ordering::Acquire) {
                return None;
            }
            if let Some(request) = state.pending.pop() {
                return Some(request);
            }
            state = self.condvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Set `stop` and wake every waiter
    pub(crate) fn stop(&self, stop: &AtomicBool) {
        let _state = self.lock();
        stop.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    /// Requests not yet picked up by the worker
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Every request ever submitted
    pub fn submitted(&self) -> usize {
        self.lock().all.len()
    }

    /// Status of a previously submitted request, if any
    pub fn status_of(&self, params: &ResizeParams) -> Option<ResizeStatus> {
        self.lock()
            .all
            .iter()
            .find(|r| r.params().same_target(params))
            .map(|r| r.status())
    }
}

impl std::fmt::Debug for ResizeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResizeQueue")
            .field("pending", &state.pending.len())
            .field("submitted", &state.all.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OutputFormat, ResizeOp};

    fn params(src: &str) -> ResizeParams {
        ResizeParams {
            src: src.into(),
            dest: format!("{src}.out.png").into(),
            width: 20,
            height: 20,
            sequence: 1,
            op: ResizeOp::Scale,
            format: OutputFormat::Png,
        }
    }

    #[test]
    fn test_submit_is_memoized() {
        let queue = ResizeQueue::new();
        assert_eq!(queue.submit(params("a")), ResizeStatus::Pending);
        assert_eq!(queue.submit(params("a")), ResizeStatus::Pending);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.submitted(), 1);
    }

    #[test]
    fn test_pop_is_lifo() {
        let queue = ResizeQueue::new();
        queue.submit(params("a"));
        queue.submit(params("b"));
        queue.submit(params("c"));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|r| r.params().src.display().to_string())
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_repeat_reports_final_status() {
        let queue = ResizeQueue::new();
        queue.submit(params("a"));
        let request = queue.pop().unwrap();
        request.set_status(ResizeStatus::Complete);

        assert_eq!(queue.submit(params("a")), ResizeStatus::Complete);
        assert_eq!(queue.status_of(&params("a")), Some(ResizeStatus::Complete));
        assert_eq!(queue.status_of(&params("b")), None);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_wait_pop_observes_stop() {
        let queue = Arc::new(ResizeQueue::new());
        let stop = Arc::new(AtomicBool::new(false));

        let waiter = {
            let (queue, stop) = (Arc::clone(&queue), Arc::clone(&stop));
            std::thread::spawn(move || queue.wait_pop(&stop).is_none())
        };
        queue.stop(&stop);
        assert!(waiter.join().unwrap());
    }
}
