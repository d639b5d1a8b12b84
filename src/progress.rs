//! Progress and cancellation contract shared by downloads and installer tasks.
//!
//! A sink is handed to one operation. The operation reports its phases and
//! byte counts, polls [`ProgressSink::is_canceled`] between steps, records at
//! most one error and calls [`ProgressSink::finished`] when it ends, whatever
//! the outcome.

use log::{debug, warn};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg_attr(test, mockall::automock)]
pub trait ProgressSink: Send + Sync {
    /// Begin a new phase. `total` is the expected unit count, if known.
    fn start_task(&self, label: &str, total: Option<u64>);
    fn set_progress(&self, done: u64);
    fn is_canceled(&self) -> bool;
    fn cancel(&self);
    fn is_error(&self) -> bool;
    fn error(&self, message: &str);
    fn finished(&self);
}

/// Thread-safe [`ProgressSink`] that records the latest state.
///
/// `finished` takes effect once; later calls are ignored.
#[derive(Debug, Default)]
pub struct ProgressMonitor {
    label: Mutex<String>,
    total: Mutex<Option<u64>>,
    done: AtomicU64,
    canceled: AtomicBool,
    error: Mutex<Option<String>>,
    finished: AtomicBool,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self) -> String {
        self.label.lock().unwrap().clone()
    }

    pub fn total(&self) -> Option<u64> {
        *self.total.lock().unwrap()
    }

    pub fn progress(&self) -> u64 {
        self.done.load(Ordering::SeqCst)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.lock().unwrap().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressSink for ProgressMonitor {
    fn start_task(&self, label: &str, total: Option<u64>) {
        debug!("Task: {} ({:?} units)", label, total);
        *self.label.lock().unwrap() = label.to_string();
        *self.total.lock().unwrap() = total;
        self.done.store(0, Ordering::SeqCst);
    }

    fn set_progress(&self, done: u64) {
        self.done.store(done, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    fn is_error(&self) -> bool {
        self.error.lock().unwrap().is_some()
    }

    fn error(&self, message: &str) {
        let mut error = self.error.lock().unwrap();
        if error.is_none() {
            *error = Some(message.to_string());
        } else {
            warn!("Ignoring additional error after the first one: {}", message);
        }
    }

    fn finished(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            debug!("finished() called more than once, ignoring");
        }
    }
}
