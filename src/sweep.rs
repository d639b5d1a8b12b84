//! Deletion of tools and modes flagged for removal in an earlier session.
//!
//! Run once at startup, before anything loads code from the sketchbook.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::contribution::ContributionType;
use crate::installer::is_flagged_for_deletion;
use crate::runtime::Runtime;

/// Delete every flagged folder under `tools/` and `modes/` and return the
/// paths that were removed. Folders that cannot be deleted are logged and
/// left for the next run.
#[tracing::instrument(skip(runtime))]
pub fn sweep_flagged<R: Runtime + ?Sized>(runtime: &R, sketchbook: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();

    let type_folders = ContributionType::ALL
        .iter()
        .filter(|kind| kind.requires_restart())
        .map(|kind| sketchbook.join(kind.folder_name()));

    for type_folder in type_folders {
        if !runtime.is_dir(&type_folder) {
            continue;
        }
        let entries = match runtime.read_dir(&type_folder) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not list {:?}: {:#}", type_folder, e);
                continue;
            }
        };

        for folder in entries {
            if !runtime.is_dir(&folder) || !is_flagged_for_deletion(runtime, &folder) {
                continue;
            }
            debug!("Deleting flagged folder {:?}", folder);
            match runtime.remove_dir_all(&folder) {
                Ok(()) => {
                    info!("Removed {:?}", folder);
                    removed.push(folder);
                }
                Err(e) => warn!("Could not remove {:?}: {:#}", folder, e),
            }
        }
    }

    removed
}
