//! Locating the package root inside an extracted archive.

use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use super::InstallError;
use crate::contribution::ContributionType;
use crate::runtime::Runtime;

/// The folder that will be moved into the sketchbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRoot {
    pub path: PathBuf,
    /// Name the folder gets in the sketchbook
    pub folder_name: String,
}

/// Folders directly below `dir` that carry a descriptor for `kind`.
fn candidates<R: Runtime + ?Sized>(
    runtime: &R,
    dir: &Path,
    kind: ContributionType,
) -> Result<Vec<PathBuf>> {
    let descriptor = kind.descriptor_file_name();
    let mut found = Vec::new();
    for entry in runtime.read_dir(dir)? {
        let hidden = entry
            .file_name()
            .map(|n| {
                let n = n.to_string_lossy();
                n.starts_with('.') || n == "__MACOSX"
            })
            .unwrap_or(true);
        if hidden || !runtime.is_dir(&entry) {
            continue;
        }
        if runtime.exists(&entry.join(&descriptor)) {
            found.push(entry);
        }
    }
    Ok(found)
}

/// Find the single package root in `extract_dir`.
///
/// Roots are looked for one level down first. When there are none, the
/// extraction folder itself is tried, for archives packed without a
/// wrapping folder; it is then named `fallback_name`.
#[tracing::instrument(skip(runtime))]
pub fn discover_root<R: Runtime + ?Sized>(
    runtime: &R,
    extract_dir: &Path,
    kind: ContributionType,
    fallback_name: &str,
) -> Result<DiscoveredRoot> {
    let found = candidates(runtime, extract_dir, kind)?;
    debug!("Found {} candidate roots in {:?}", found.len(), extract_dir);

    match found.len() {
        1 => {
            let path = found.into_iter().next().ok_or(InstallError::NoContributionFound)?;
            let folder_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or(InstallError::NoContributionFound)?;
            Ok(DiscoveredRoot { path, folder_name })
        }
        0 if runtime.exists(&extract_dir.join(kind.descriptor_file_name())) => {
            debug!("Archive has no wrapping folder");
            Ok(DiscoveredRoot {
                path: extract_dir.to_path_buf(),
                folder_name: fallback_name.to_string(),
            })
        }
        0 => Err(InstallError::NoContributionFound.into()),
        n => Err(InstallError::AmbiguousArchive(n).into()),
    }
}
