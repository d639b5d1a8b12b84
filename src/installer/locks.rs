use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Per-folder async locks. Tasks touching the same contribution folder run
/// one after another; tasks on different folders run in parallel.
#[derive(Default)]
pub struct FolderLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, folder: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            // Forget locks nobody holds or waits on
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(folder.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}
