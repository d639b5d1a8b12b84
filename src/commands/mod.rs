//! Command-line use cases.
//!
//! Each command builds a [`Config`] from the runtime and the command-line
//! overrides, then works on a [`Session`]: the cached listing merged with
//! what is installed in the sketchbook.

use anyhow::{Result, bail};
use log::{debug, warn};
use std::sync::Arc;

use crate::archive::ArchiveExtractorImpl;
use crate::cleanup::{self, SharedCleanupContext};
use crate::config::Config;
use crate::contribution::{Contribution, ContributionType};
use crate::installer::{ContributionInstaller, TaskHandle, TaskOutcome};
use crate::listing::ContributionListing;
use crate::progress::{ProgressMonitor, ProgressSink};
use crate::runtime::Runtime;
use crate::scanner::scan_installed;

mod install;
mod list;
mod refresh;
mod remove;
mod restore;
mod suggest;
mod sweep;

pub use install::install;
pub use list::list;
pub use refresh::refresh;
pub use remove::remove;
pub use restore::restore;
pub use suggest::suggest;
pub use sweep::sweep;

/// Catalog state shared by the commands.
pub struct Session<R: Runtime + 'static> {
    pub config: Config<R>,
    pub listing: Arc<ContributionListing>,
    pub cleanup: SharedCleanupContext,
}

impl<R: Runtime + 'static> Session<R> {
    /// Load the cached listing and merge the installed contributions into it.
    #[tracing::instrument(skip(config))]
    pub fn open(config: Config<R>) -> Result<Self> {
        let listing = Arc::new(config.listing());
        let runtime = config.runtime.as_ref();

        if let Err(e) = listing.load_advertised(runtime, &config.listing_cache_path()) {
            warn!("Ignoring unreadable contribution listing: {:#}", e);
        }
        let installed = scan_installed(runtime, &config.sketchbook)?;
        debug!("Merging {} installed contributions", installed.len());
        listing.merge_installed(installed);

        Ok(Self {
            config,
            listing,
            cleanup: cleanup::new_shared(),
        })
    }

    pub fn installer(&self) -> Arc<ContributionInstaller<R, ArchiveExtractorImpl>> {
        Arc::new(
            self.config
                .installer(Arc::clone(&self.listing), Arc::clone(&self.cleanup)),
        )
    }

    /// The one entry called `name`, optionally restricted to `kind`. Exact
    /// names win over case-insensitive ones.
    pub fn resolve(&self, name: &str, kind: Option<ContributionType>) -> Result<Contribution> {
        let of_kind = |c: &Contribution| kind.is_none_or(|k| c.kind() == k);

        let mut found: Vec<Contribution> = self
            .listing
            .find_by_name(name)
            .into_iter()
            .filter(of_kind)
            .collect();
        if found.is_empty() {
            found = self
                .listing
                .contributions()
                .into_iter()
                .filter(|c| c.name().eq_ignore_ascii_case(name))
                .filter(of_kind)
                .collect();
        }

        match found.len() {
            0 => bail!(
                "No contribution named '{}'. Run `contribman refresh` to update the listing.",
                name
            ),
            1 => Ok(found.remove(0)),
            _ => {
                let kinds: Vec<&str> = found.iter().map(|c| c.kind().name()).collect();
                bail!(
                    "'{}' names more than one contribution ({}); pick one with --type",
                    name,
                    kinds.join(", ")
                )
            }
        }
    }
}

/// Progress sink that reports phases on stderr.
#[derive(Default)]
pub struct ConsoleProgress {
    monitor: ProgressMonitor,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn start_task(&self, label: &str, total: Option<u64>) {
        if label != self.monitor.label() {
            eprintln!("{}...", label);
        }
        self.monitor.start_task(label, total);
    }

    fn set_progress(&self, done: u64) {
        self.monitor.set_progress(done);
    }

    fn is_canceled(&self) -> bool {
        self.monitor.is_canceled()
    }

    fn cancel(&self) {
        self.monitor.cancel();
    }

    fn is_error(&self) -> bool {
        self.monitor.is_error()
    }

    fn error(&self, message: &str) {
        self.monitor.error(message);
    }

    fn finished(&self) {
        self.monitor.finished();
    }
}

/// Wait for `handle`, canceling it on Ctrl-C. Scratch paths left in
/// `cleanup` by a canceled task are removed.
pub(crate) async fn run_task<R: Runtime + ?Sized>(
    runtime: &R,
    handle: TaskHandle,
    cleanup: &SharedCleanupContext,
) -> TaskOutcome {
    let progress = Arc::clone(handle.progress());

    let ctrl_c_handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, canceling...");
            progress.cancel();
        }
    });

    let outcome = handle.wait().await;
    ctrl_c_handler.abort();

    if !outcome.is_done() {
        cleanup.lock().unwrap().cleanup(runtime);
    }
    outcome
}

/// Turn a task outcome into the command's result.
pub(crate) fn check_outcome(outcome: TaskOutcome, action: &str) -> Result<()> {
    match outcome {
        TaskOutcome::Done => Ok(()),
        TaskOutcome::Canceled => bail!("{} canceled", action),
        TaskOutcome::Failed(e) => Err(e),
    }
}

/// One line of `list` output.
pub(crate) fn describe(listing: &ContributionListing, c: &Contribution, flagged: bool) -> String {
    let info = c.info();
    let mut line = format!("{} [{}]", info.name, c.kind());
    if !info.pretty_version.is_empty() {
        line.push(' ');
        line.push_str(&info.pretty_version);
    }

    if c.is_installed() {
        line.push_str(" (installed");
        if flagged {
            line.push_str(", removal pending");
        } else if listing.has_updates(c) {
            match listing.latest_version(c) {
                Some(latest) => line.push_str(&format!(", update available: {}", latest)),
                None => line.push_str(", update available"),
            }
        }
        line.push(')');
    }

    if !info.sentence.is_empty() {
        line.push_str(" - ");
        line.push_str(&info.sentence);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const LISTING: &str = "\
library
name=Foo
category=Sound
sentence=Makes noise.
version=3
prettyVersion=1.3
download=http://downloads.example/Foo.zip

tool
name=Foo
version=1
download=http://downloads.example/FooTool.zip

library
name=Bar
version=1
download=http://downloads.example/Bar.zip
";

    fn session(dir: &TempDir) -> Session<RealRuntime> {
        let settings_dir = dir.path().join("settings");
        let sketchbook = dir.path().join("sketchbook");
        fs::create_dir_all(&settings_dir).unwrap();
        fs::write(settings_dir.join("contributions.txt"), LISTING).unwrap();

        let foo = sketchbook.join("libraries/Foo");
        fs::create_dir_all(&foo).unwrap();
        fs::write(
            foo.join("library.properties"),
            "name=Foo\nversion=2\nprettyVersion=1.2\n",
        )
        .unwrap();

        let config = Config::new(
            RealRuntime,
            Overrides {
                sketchbook: Some(sketchbook),
                settings_dir: Some(settings_dir),
                listing_url: None,
            },
        )
        .unwrap();
        Session::open(config).unwrap()
    }

    #[test]
    fn test_session_merges_installed_entries() {
        let dir = tempdir().unwrap();
        let session = session(&dir);

        let foo = session.resolve("Foo", Some(ContributionType::Library)).unwrap();
        assert!(foo.is_installed());
        assert!(session.listing.has_updates(&foo));
    }

    #[test]
    fn test_resolve_requires_type_for_shared_names() {
        let dir = tempdir().unwrap();
        let session = session(&dir);

        let err = session.resolve("Foo", None).unwrap_err();
        assert!(err.to_string().contains("--type"));

        let tool = session.resolve("Foo", Some(ContributionType::Tool)).unwrap();
        assert_eq!(tool.kind(), ContributionType::Tool);
    }

    #[test]
    fn test_resolve_is_case_insensitive_fallback() {
        let dir = tempdir().unwrap();
        let session = session(&dir);

        assert_eq!(session.resolve("bar", None).unwrap().name(), "Bar");
        assert!(session.resolve("Baz", None).is_err());
    }

    #[test]
    fn test_describe() {
        let dir = tempdir().unwrap();
        let session = session(&dir);
        let foo = session.resolve("Foo", Some(ContributionType::Library)).unwrap();
        let bar = session.resolve("Bar", None).unwrap();

        assert_eq!(
            describe(&session.listing, &foo, false),
            "Foo [library] 1.2 (installed, update available: v1.3)"
        );
        assert_eq!(
            describe(&session.listing, &foo, true),
            "Foo [library] 1.2 (installed, removal pending)"
        );
        assert_eq!(describe(&session.listing, &bar, false), "Bar [library]");
    }

    #[test]
    fn test_check_outcome() {
        assert!(check_outcome(TaskOutcome::Done, "Install").is_ok());
        let err = check_outcome(TaskOutcome::Canceled, "Install").unwrap_err();
        assert_eq!(err.to_string(), "Install canceled");
    }
}
