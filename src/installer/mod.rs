//! Install, update and remove contributions in the sketchbook.
//!
//! Every request runs as its own background task (see [`TaskHandle`]). An
//! install walks download, extract, root discovery and descriptor rewrite in
//! a scratch folder, then commits by moving the package root into
//! `<sketchbook>/<type-folder>/<root-name>`. The catalog is updated only after
//! the commit succeeded.

mod backup;
mod discovery;
mod error;
mod flag;
mod locks;
mod task;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::{ArchiveExtractor, archive_stem};
use crate::cleanup::{self, CleanupGuard, SharedCleanupContext};
use crate::contribution::descriptor::{read_descriptor, write_descriptor};
use crate::contribution::{
    AvailableContribution, Contribution, ContributionInfo, ContributionKey, ContributionType,
    InstalledContribution,
};
use crate::download::Downloader;
use crate::listing::ContributionListing;
use crate::progress::ProgressSink;
use crate::runtime::Runtime;

pub use backup::{BackupMode, backup_folder, backup_name, unique_backup_name};
pub use discovery::{DiscoveredRoot, discover_root};
pub use error::InstallError;
pub use flag::{
    DELETION_FLAG, flag_for_deletion, flag_path, is_flagged_for_deletion,
    remove_flag_for_deletion,
};
pub use locks::FolderLocks;
pub use task::{TaskHandle, TaskOutcome, TaskState};

use task::TaskReporter;

/// Archive name used when the download URL does not end in one.
const DEFAULT_ARCHIVE_NAME: &str = "download.zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallerOptions {
    /// Copy a replaced contribution to `old/` before overwriting it
    pub backup_on_install: bool,
    /// Move a removed contribution to `old/` instead of deleting it
    pub backup_on_remove: bool,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            backup_on_install: true,
            backup_on_remove: true,
        }
    }
}

enum ArchiveSource {
    Url(String),
    File(PathBuf),
}

struct InstallJob {
    kind: ContributionType,
    /// Metadata written over the package's own descriptor
    advertised: Option<Arc<AvailableContribution>>,
    source: ArchiveSource,
}

pub struct ContributionInstaller<R: Runtime + 'static, E: ArchiveExtractor + 'static> {
    runtime: Arc<R>,
    downloader: Arc<dyn Downloader>,
    extractor: Arc<E>,
    listing: Arc<ContributionListing>,
    sketchbook: PathBuf,
    options: InstallerOptions,
    locks: FolderLocks,
    cleanup: SharedCleanupContext,
}

impl<R: Runtime + 'static, E: ArchiveExtractor + 'static> ContributionInstaller<R, E> {
    pub fn new(
        runtime: Arc<R>,
        downloader: Arc<dyn Downloader>,
        extractor: Arc<E>,
        listing: Arc<ContributionListing>,
        sketchbook: PathBuf,
    ) -> Self {
        Self {
            runtime,
            downloader,
            extractor,
            listing,
            sketchbook,
            options: InstallerOptions::default(),
            locks: FolderLocks::new(),
            cleanup: cleanup::new_shared(),
        }
    }

    pub fn with_options(mut self, options: InstallerOptions) -> Self {
        self.options = options;
        self
    }

    /// Register scratch folders in `cleanup` instead of a private context, so
    /// an interrupt handler can remove them.
    pub fn with_cleanup(mut self, cleanup: SharedCleanupContext) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn listing(&self) -> &Arc<ContributionListing> {
        &self.listing
    }

    pub fn sketchbook(&self) -> &Path {
        &self.sketchbook
    }

    /// Install or update `contribution` from its advertised download link.
    ///
    /// Fails without downloading when the contribution is not advertised, has
    /// no link for this platform, or the link is not a valid URL.
    pub fn install(
        self: &Arc<Self>,
        contribution: &Contribution,
        progress: Arc<dyn ProgressSink>,
    ) -> TaskHandle {
        let key = contribution.key();
        let advertised = match contribution {
            Contribution::Available(available) => Some(Arc::clone(available)),
            Contribution::Installed(_) => self.listing.available_for(contribution),
        };
        let this = Arc::clone(self);

        TaskHandle::spawn(progress, move |reporter| async move {
            let job = download_job(&key, advertised)?;
            this.run_install(&reporter, job).await
        })
    }

    /// Install a contribution of type `kind` from a local archive, keeping
    /// the package's own descriptor.
    pub fn install_archive(
        self: &Arc<Self>,
        kind: ContributionType,
        archive: PathBuf,
        progress: Arc<dyn ProgressSink>,
    ) -> TaskHandle {
        let this = Arc::clone(self);
        TaskHandle::spawn(progress, move |reporter| async move {
            this.run_install(
                &reporter,
                InstallJob {
                    kind,
                    advertised: None,
                    source: ArchiveSource::File(archive),
                },
            )
            .await
        })
    }

    /// Remove an installed contribution.
    ///
    /// Tools and modes are only flagged for deletion and stay in the catalog
    /// as installed. Anything else is backed up or deleted right away and
    /// falls back to its advertised entry, if there is one.
    pub fn remove(
        self: &Arc<Self>,
        contribution: &Contribution,
        progress: Arc<dyn ProgressSink>,
    ) -> TaskHandle {
        let contribution = contribution.clone();
        let this = Arc::clone(self);

        TaskHandle::spawn(progress, move |reporter| async move {
            this.run_remove(&reporter, &contribution).await
        })
    }

    pub fn is_flagged_for_deletion(&self, contribution: &Contribution) -> bool {
        contribution
            .as_installed()
            .is_some_and(|c| is_flagged_for_deletion(self.runtime.as_ref(), c.folder()))
    }

    /// Undo a pending removal of a tool or mode.
    #[tracing::instrument(skip(self, contribution), fields(key = %contribution.key()))]
    pub fn remove_flag_for_deletion(&self, contribution: &Contribution) -> Result<()> {
        let installed = contribution
            .as_installed()
            .ok_or_else(|| InstallError::NotInstalled(contribution.key()))?;
        remove_flag_for_deletion(self.runtime.as_ref(), installed.folder())?;
        self.listing.replace(contribution, contribution.clone());
        Ok(())
    }

    #[tracing::instrument(skip(self, reporter, contribution), fields(key = %contribution.key()))]
    async fn run_remove(&self, reporter: &TaskReporter, contribution: &Contribution) -> Result<()> {
        let installed = contribution
            .as_installed()
            .cloned()
            .ok_or_else(|| InstallError::NotInstalled(contribution.key()))?;

        let _lock = self.locks.lock(installed.folder()).await;
        reporter.check_canceled()?;
        reporter.enter(TaskState::Committing);

        self.discard_folder(installed.folder(), installed.kind)?;

        if installed.kind.requires_restart() {
            self.listing.replace(contribution, contribution.clone());
        } else {
            match self.listing.available_for(contribution) {
                Some(available) => {
                    self.listing
                        .replace(contribution, Contribution::Available(available));
                }
                None => {
                    self.listing.remove(contribution);
                }
            }
        }
        info!("Removed {}", installed.key());
        Ok(())
    }

    #[tracing::instrument(skip(self, reporter, job), fields(kind = %job.kind))]
    async fn run_install(&self, reporter: &TaskReporter, job: InstallJob) -> Result<()> {
        reporter.check_canceled()?;

        let work = self
            .runtime
            .create_temp_dir("contribman-")
            .context("Could not create a scratch folder")?;
        let guard = CleanupGuard::new(Arc::clone(&self.cleanup), work.clone());

        let result = self.install_in(reporter, &job, &work).await;
        guard.finish(self.runtime.as_ref());
        result
    }

    async fn install_in(&self, reporter: &TaskReporter, job: &InstallJob, work: &Path) -> Result<()> {
        let runtime = self.runtime.as_ref();

        let archive = match &job.source {
            ArchiveSource::Url(url) => {
                reporter.enter(TaskState::Downloading);
                let archive = work.join(self.archive_file_name(url));
                self.downloader
                    .download(url, &archive, Arc::clone(reporter.progress()))
                    .await
                    .with_context(|| format!("Failed to download {}", url))?;
                archive
            }
            ArchiveSource::File(path) => path.clone(),
        };

        reporter.check_canceled()?;
        reporter.enter(TaskState::Extracting);
        let extract_dir = work.join("extract");
        runtime.create_dir_all(&extract_dir)?;
        self.extractor
            .extract(runtime, &archive, &extract_dir)
            .with_context(|| format!("Failed to extract {:?}", archive))?;

        reporter.check_canceled()?;
        reporter.enter(TaskState::Discovering);
        let fallback_name = match &job.advertised {
            Some(advertised) => advertised.info.name.clone(),
            None => archive_stem(&archive).unwrap_or_else(|| job.kind.name().to_string()),
        };
        let root = discover_root(runtime, &extract_dir, job.kind, &fallback_name)?;

        reporter.check_canceled()?;
        reporter.enter(TaskState::Validating);
        let descriptor = root.path.join(job.kind.descriptor_file_name());
        let own = ContributionInfo::from_properties(
            &read_descriptor(runtime, &descriptor)?,
            &root.folder_name,
        );
        let info = match &job.advertised {
            Some(advertised) => {
                let info = with_package_keys(&advertised.info, own);
                write_descriptor(runtime, &descriptor, &info)?;
                info
            }
            None => own,
        };

        let key = ContributionKey::new(info.name.clone(), job.kind);
        let type_folder = self.sketchbook.join(job.kind.folder_name());
        let dest = type_folder.join(&root.folder_name);

        let _lock = self.locks.lock(&dest).await;
        // Last chance to cancel
        reporter.check_canceled()?;
        reporter.enter(TaskState::Committing);

        runtime
            .create_dir_all(&type_folder)
            .with_context(|| format!("Could not create {:?}", type_folder))?;
        self.commit(&root.path, &dest)?;

        self.retire_previous(&key, &dest);
        let installed = Contribution::from(InstalledContribution::new(job.kind, info, dest.clone()));
        match self.listing.find(&key) {
            Some(current) => {
                self.listing.replace(&current, installed);
            }
            None => self.listing.add(installed),
        }

        info!("Installed {} into {:?}", key, dest);
        Ok(())
    }

    fn archive_file_name(&self, url: &str) -> String {
        reqwest::Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|name| !name.is_empty() && self.extractor.can_handle(Path::new(name)))
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string())
    }

    /// Put `root` at `dest`. The previous occupant of `dest` is backed up,
    /// then kept aside until the new folder is in place, and put back if
    /// that fails.
    #[tracing::instrument(skip(self))]
    fn commit(&self, root: &Path, dest: &Path) -> Result<()> {
        let runtime = self.runtime.as_ref();

        let staged = if runtime.exists(dest) {
            if self.options.backup_on_install {
                backup_folder(runtime, dest, BackupMode::Copy)?;
            }
            let staged = staging_path(runtime, dest)?;
            runtime
                .rename(dest, &staged)
                .with_context(|| format!("Could not move {:?} out of the way", dest))?;
            Some(staged)
        } else {
            None
        };

        if let Err(e) = move_folder(runtime, root, dest) {
            if let Some(staged) = &staged
                && let Err(restore) = runtime.rename(staged, dest)
            {
                warn!(
                    "Could not put {:?} back to {:?}: {:#}",
                    staged, dest, restore
                );
            }
            return Err(e);
        }

        if let Some(staged) = staged
            && let Err(e) = runtime.remove_dir_all(&staged)
        {
            warn!("Could not delete replaced folder {:?}: {:#}", staged, e);
        }
        Ok(())
    }

    /// An update may land in a differently named folder than the installed
    /// copy; the old folder then goes away like a removal.
    fn retire_previous(&self, key: &ContributionKey, dest: &Path) {
        let Some(Contribution::Installed(previous)) = self.listing.find(key) else {
            return;
        };
        if previous.folder() == dest || !self.runtime.exists(previous.folder()) {
            return;
        }
        debug!("Retiring previous install at {:?}", previous.folder());
        if let Err(e) = self.discard_folder(previous.folder(), key.kind) {
            warn!("Could not remove old copy of {}: {:#}", key, e);
        }
    }

    /// Get rid of an installed folder according to the remove policy.
    fn discard_folder(&self, folder: &Path, kind: ContributionType) -> Result<()> {
        let runtime = self.runtime.as_ref();

        if kind.requires_restart() {
            if self.options.backup_on_remove {
                backup_folder(runtime, folder, BackupMode::Copy)?;
            }
            return flag_for_deletion(runtime, folder);
        }

        if self.options.backup_on_remove {
            backup_folder(runtime, folder, BackupMode::Move)?;
        } else {
            runtime
                .remove_dir_all(folder)
                .with_context(|| format!("Could not delete {:?}", folder))?;
        }
        Ok(())
    }
}

/// Check that an advertised contribution can be fetched at all.
fn download_job(
    key: &ContributionKey,
    advertised: Option<Arc<AvailableContribution>>,
) -> Result<InstallJob> {
    let advertised = advertised.ok_or_else(|| InstallError::NotAdvertised(key.clone()))?;
    let url = advertised
        .link
        .clone()
        .ok_or_else(|| InstallError::PlatformUnsupported(key.clone()))?;
    if reqwest::Url::parse(&url).is_err() {
        return Err(InstallError::MalformedUrl(url).into());
    }
    Ok(InstallJob {
        kind: key.kind,
        advertised: Some(advertised),
        source: ArchiveSource::Url(url),
    })
}

/// Hidden sibling of `dest` to park the old occupant in during a commit.
fn staging_path<R: Runtime + ?Sized>(runtime: &R, dest: &Path) -> Result<PathBuf> {
    let parent = dest
        .parent()
        .with_context(|| format!("{:?} has no parent folder", dest))?;
    let name = dest
        .file_name()
        .with_context(|| format!("{:?} has no folder name", dest))?
        .to_string_lossy();
    let staged = unique_backup_name(runtime, parent, &format!(".{}.replaced", name));
    Ok(parent.join(staged))
}

/// Rename, or copy then delete when the rename fails (e.g. across
/// filesystems). A failed copy leaves nothing at `to`.
fn move_folder<R: Runtime + ?Sized>(runtime: &R, from: &Path, to: &Path) -> Result<()> {
    if runtime.rename(from, to).is_ok() {
        return Ok(());
    }

    debug!("Rename failed, copying {:?} to {:?}", from, to);
    if let Err(e) = runtime.copy_dir_all(from, to) {
        if runtime.exists(to) {
            let _ = runtime.remove_dir_all(to);
        }
        return Err(e.context(format!("Could not move {:?} into {:?}", from, to)));
    }
    if let Err(e) = runtime.remove_dir_all(from) {
        debug!("Failed to remove {:?} after copying it: {}", from, e);
    }
    Ok(())
}

/// The advertised fields, keeping the package's own import headers and
/// revision bounds where the listing does not give them.
fn with_package_keys(advertised: &ContributionInfo, own: ContributionInfo) -> ContributionInfo {
    let mut info = advertised.clone();
    if info.imports.is_empty() {
        info.imports = own.imports;
    }
    if info.min_revision == 0 {
        info.min_revision = own.min_revision;
    }
    if info.max_revision == 0 {
        info.max_revision = own.max_revision;
    }
    info
}
