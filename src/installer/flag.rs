//! The deletion sentinel.
//!
//! Tools and modes cannot be deleted while their code is loaded. Removing
//! one drops an empty `flagged_for_deletion` file into its folder; the file's
//! presence alone marks the folder for the next restart sweep.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const DELETION_FLAG: &str = "flagged_for_deletion";

pub fn flag_path(folder: &Path) -> PathBuf {
    folder.join(DELETION_FLAG)
}

/// Create the sentinel. Touches nothing else in `folder`.
#[tracing::instrument(skip(runtime))]
pub fn flag_for_deletion<R: Runtime + ?Sized>(runtime: &R, folder: &Path) -> Result<()> {
    runtime
        .write(&flag_path(folder), b"")
        .with_context(|| format!("Failed to flag {:?} for deletion", folder))
}

pub fn is_flagged_for_deletion<R: Runtime + ?Sized>(runtime: &R, folder: &Path) -> bool {
    runtime.exists(&flag_path(folder))
}

/// Delete the sentinel if present. Touches nothing else in `folder`.
#[tracing::instrument(skip(runtime))]
pub fn remove_flag_for_deletion<R: Runtime + ?Sized>(runtime: &R, folder: &Path) -> Result<()> {
    let flag = flag_path(folder);
    if runtime.exists(&flag) {
        runtime
            .remove_file(&flag)
            .with_context(|| format!("Failed to clear deletion flag in {:?}", folder))?;
    }
    Ok(())
}
