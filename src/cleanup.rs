//! Scratch paths (downloaded archives, extraction folders) registered so
//! they can be removed when a task is interrupted.

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::runtime::Runtime;

/// Tracks paths that need cleanup on interruption
#[derive(Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every registered path that still exists. Errors are logged and
    /// skipped so one stuck path does not keep the others around.
    pub fn cleanup<R: Runtime + ?Sized>(&mut self, runtime: &R) {
        for path in self.paths.drain(..) {
            if !runtime.exists(&path) {
                continue;
            }
            debug!("Cleaning up: {:?}", path);
            let result = if runtime.is_dir(&path) {
                runtime.remove_dir_all(&path)
            } else {
                runtime.remove_file(&path)
            };
            if let Err(e) = result {
                debug!("Failed to clean up {:?}: {}", path, e);
            }
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

/// Create a new shared cleanup context
pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Registers a path for the lifetime of one task.
///
/// Calling [`CleanupGuard::finish`] removes the path from disk and from the
/// context. Dropping the guard without it leaves the path registered, so an
/// interrupt handler can still sweep it.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        ctx.lock().unwrap().add(path.clone());
        Self { ctx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the scratch path and unregister it.
    pub fn finish<R: Runtime + ?Sized>(self, runtime: &R) {
        if runtime.exists(&self.path)
            && let Err(e) = runtime.remove_dir_all(&self.path)
        {
            debug!("Failed to remove scratch folder {:?}: {}", self.path, e);
        }
        self.ctx.lock().unwrap().remove(&self.path);
    }
}
