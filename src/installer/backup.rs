//! Backups of replaced or removed contributions.
//!
//! A backup of `<type-folder>/Foo` lands in
//! `<type-folder>/old/<YYYY-MM-DD>_Foo`, with `(2)`, `(3)`, ... appended
//! when that name is taken.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::scanner::BACKUP_FOLDER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    /// Leave the original in place
    Copy,
    /// Move the original away
    Move,
}

pub fn backup_name(date: NaiveDate, folder_name: &str) -> String {
    format!("{}_{}", date.format("%Y-%m-%d"), folder_name)
}

/// `base` if no entry of that name exists in `dir`, else the first free
/// `base(n)` for n = 2, 3, ...
pub fn unique_backup_name<R: Runtime + ?Sized>(runtime: &R, dir: &Path, base: &str) -> String {
    if !runtime.exists(&dir.join(base)) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}({})", base, n))
        .find(|candidate| !runtime.exists(&dir.join(candidate)))
        .unwrap_or_else(|| base.to_string())
}

/// Back up `folder` into the `old/` folder next to it and return the
/// backup's path.
#[tracing::instrument(skip(runtime))]
pub fn backup_folder<R: Runtime + ?Sized>(
    runtime: &R,
    folder: &Path,
    mode: BackupMode,
) -> Result<PathBuf> {
    let type_folder = folder
        .parent()
        .with_context(|| format!("{:?} has no parent folder", folder))?;
    let folder_name = folder
        .file_name()
        .with_context(|| format!("{:?} has no folder name", folder))?
        .to_string_lossy();

    let backup_dir = type_folder.join(BACKUP_FOLDER);
    runtime
        .create_dir_all(&backup_dir)
        .with_context(|| format!("Could not create backup folder {:?}", backup_dir))?;

    let name = unique_backup_name(
        runtime,
        &backup_dir,
        &backup_name(runtime.today(), &folder_name),
    );
    let dest = backup_dir.join(name);

    let result = match mode {
        BackupMode::Copy => runtime.copy_dir_all(folder, &dest),
        BackupMode::Move => runtime.rename(folder, &dest),
    };
    if let Err(e) = result {
        if mode == BackupMode::Copy && runtime.exists(&dest) {
            // Leave no half-written backup behind
            if let Err(cleanup) = runtime.remove_dir_all(&dest) {
                warn!("Could not remove partial backup {:?}: {:#}", dest, cleanup);
            }
        }
        return Err(e).with_context(|| format!("Could not back up {:?} to {:?}", folder, dest));
    }

    info!("Backed up {:?} to {:?}", folder, dest);
    Ok(dest)
}
