//! Background command execution
//!
//! Shell commands are queued from the UI thread and run one at a time on a
//! dedicated worker. Nothing is reported back beyond log output.

use std::collections::VecDeque;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::SystemError;

/// How long the worker sleeps between shutdown checks when idle
const IDLE_WAIT: Duration = Duration::from_secs(2);

/// Shared command queue
struct ExecQueue {
    commands: Mutex<VecDeque<String>>,
    condvar: Condvar,
    shutdown: AtomicBool,
    debug: bool,
}

impl ExecQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, cmd: String) {
        self.lock().push_back(cmd);
        self.condvar.notify_one();
    }

    /// Set the shutdown flag under the lock so a worker between its flag
    /// check and its wait can't miss the wakeup
    fn stop(&self) {
        let _queue = self.lock();
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    fn wait_for_command(&self) -> Option<String> {
        let mut queue = self.lock();

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }

            if let Some(cmd) = queue.pop_front() {
                return Some(cmd);
            }

            queue = self
                .condvar
                .wait_timeout(queue, IDLE_WAIT)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Fire-and-forget shell command runner
pub struct BackgroundExec {
    queue: Arc<ExecQueue>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BackgroundExec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundExec")
            .field("pending", &self.pending())
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl BackgroundExec {
    /// Start the worker thread
    ///
    /// With `debug` set, every command is traced at info level as it is
    /// queued and executed.
    pub fn start(debug: bool) -> Result<Self, SystemError> {
        let queue = Arc::new(ExecQueue {
            commands: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            debug,
        });

        let worker_queue = Arc::clone(&queue);
        let thread = thread::Builder::new()
            .name("background-exec".into())
            .spawn(move || run_worker(&worker_queue))
            .map_err(SystemError::Spawn)?;

        tracing::info!("started background exec thread");
        Ok(Self { queue, thread: Some(thread) })
    }

    /// Queue a shell command; commands run in submission order
    pub fn submit(&self, cmd: impl Into<String>) {
        let cmd = cmd.into();
        if self.thread.is_none() {
            tracing::error!("background exec is stopped, dropping command: {}", cmd);
            return;
        }
        if self.queue.debug {
            tracing::info!("background exec queued: {}", cmd);
        }
        self.queue.push(cmd);
    }

    /// Commands waiting to run
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Stop the worker and wait for it to exit
    ///
    /// A command already running finishes; queued commands are dropped.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            tracing::info!("waiting for background exec thread to terminate");
            self.queue.stop();
            let _ = thread.join();
        }
    }
}

impl Drop for BackgroundExec {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(queue: &ExecQueue) {
    while let Some(cmd) = queue.wait_for_command() {
        if queue.debug {
            tracing::info!("background exec running: {}", cmd);
        }
        match shell(&cmd).status() {
            Ok(status) if status.success() => {
                tracing::debug!("background exec finished: {}", cmd);
            }
            Ok(status) => {
                tracing::warn!("background exec `{}` exited with {}", cmd, status);
            }
            Err(e) => {
                tracing::warn!("background exec `{}` failed to start: {}", cmd, e);
            }
        }
    }
    tracing::debug!("background exec thread exiting");
}

#[cfg(unix)]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("/bin/sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut exec = BackgroundExec::start(false).unwrap();
        exec.shutdown();
        exec.shutdown();
        assert_eq!(exec.pending(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_is_dropped() {
        let mut exec = BackgroundExec::start(false).unwrap();
        exec.shutdown();
        exec.submit("echo ignored");
        assert_eq!(exec.pending(), 0);
    }

    #[test]
    fn test_shutdown_does_not_wait_for_idle_timeout() {
        for _ in 0..20 {
            let mut exec = BackgroundExec::start(false).unwrap();
            let started = Instant::now();
            exec.shutdown();
            assert!(started.elapsed() < IDLE_WAIT, "shutdown waited for the idle timeout");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_commands_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log.txt");
        let exec = BackgroundExec::start(true).unwrap();

        exec.submit(format!("echo one >> {}", log.display()));
        exec.submit(format!("echo two >> {}", log.display()));

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let text = std::fs::read_to_string(&log).unwrap_or_default();
            if text.lines().count() == 2 {
                assert_eq!(text, "one\ntwo\n");
                break;
            }
            assert!(Instant::now() < deadline, "commands did not run");
            thread::sleep(Duration::from_millis(20));
        }
    }
}
