//! Discovery of installed contributions in a sketchbook.

use anyhow::Result;
use log::{debug, warn};
use std::path::Path;

use crate::contribution::descriptor::read_descriptor;
use crate::contribution::{ContributionInfo, ContributionType, InstalledContribution};
use crate::runtime::Runtime;

/// Folder inside each type folder that holds backups.
pub const BACKUP_FOLDER: &str = "old";

/// Which contribution types may live in a type folder, in lookup order.
fn kinds_in(folder_name: &str) -> &'static [ContributionType] {
    match folder_name {
        "libraries" => &[ContributionType::Library, ContributionType::LibraryCompilation],
        "tools" => &[ContributionType::Tool],
        "modes" => &[ContributionType::Mode],
        "examples" => &[ContributionType::Examples],
        _ => &[],
    }
}

/// Build an [`InstalledContribution`] for every package folder under the
/// sketchbook's `libraries/`, `tools/`, `modes/` and `examples/` folders.
///
/// A folder without a descriptor is still reported, named after itself.
/// Backups under `old/` and hidden entries are skipped.
#[tracing::instrument(skip(runtime))]
pub fn scan_installed<R: Runtime + ?Sized>(
    runtime: &R,
    sketchbook: &Path,
) -> Result<Vec<InstalledContribution>> {
    let mut found = Vec::new();

    for type_folder in ["libraries", "tools", "modes", "examples"] {
        let root = sketchbook.join(type_folder);
        if !runtime.is_dir(&root) {
            continue;
        }

        for folder in runtime.read_dir(&root)? {
            let Some(name) = folder.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if name == BACKUP_FOLDER || name.starts_with('.') || !runtime.is_dir(&folder) {
                continue;
            }

            match scan_folder(runtime, &folder, &name, kinds_in(type_folder)) {
                Ok(c) => found.push(c),
                Err(e) => warn!("Skipping {:?}: {:#}", folder, e),
            }
        }
    }

    debug!("Found {} installed contributions", found.len());
    Ok(found)
}

fn scan_folder<R: Runtime + ?Sized>(
    runtime: &R,
    folder: &Path,
    folder_name: &str,
    kinds: &[ContributionType],
) -> Result<InstalledContribution> {
    for &kind in kinds {
        let descriptor = folder.join(kind.descriptor_file_name());
        if runtime.exists(&descriptor) {
            let properties = read_descriptor(runtime, &descriptor)?;
            let info = ContributionInfo::from_properties(&properties, folder_name);
            return Ok(InstalledContribution::new(kind, info, folder.to_path_buf()));
        }
    }

    debug!("No descriptor in {:?}, using the folder name", folder);
    let info = ContributionInfo::from_properties(&Default::default(), folder_name);
    Ok(InstalledContribution::new(
        kinds[0],
        info,
        folder.to_path_buf(),
    ))
}
