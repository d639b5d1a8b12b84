//! Persisted settings and the wiring of the network and archive stack.

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::ArchiveExtractorImpl;
use crate::cleanup::SharedCleanupContext;
use crate::download::HttpDownloader;
use crate::http::HttpClient;
use crate::installer::{ContributionInstaller, InstallerOptions};
use crate::listing::ContributionListing;
use crate::platform::Platform;
use crate::runtime::Runtime;

pub const DEFAULT_LISTING_URL: &str = "http://download.processing.org/contribs.txt";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LISTING_CACHE_FILE: &str = "contributions.txt";

const SETTINGS_DIR_NAME: &str = "contribman";
const DEFAULT_SKETCHBOOK: &str = "sketchbook";

/// User settings stored as `settings.json`. Missing fields take their
/// defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub sketchbook: Option<PathBuf>,
    pub listing_url: String,
    pub backup_on_install: bool,
    pub backup_on_remove: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sketchbook: None,
            listing_url: DEFAULT_LISTING_URL.to_string(),
            backup_on_install: true,
            backup_on_remove: true,
        }
    }
}

impl Settings {
    /// Read settings from `path`; a missing file yields the defaults.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Invalid settings file {:?}", path))
    }

    pub fn save<R: Runtime + ?Sized>(&self, runtime: &R, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Failed to save settings to {:?}", path))
    }

    pub fn installer_options(&self) -> InstallerOptions {
        InstallerOptions {
            backup_on_install: self.backup_on_install,
            backup_on_remove: self.backup_on_remove,
        }
    }
}

/// Values given on the command line (or through their environment
/// variables). They win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sketchbook: Option<PathBuf>,
    pub settings_dir: Option<PathBuf>,
    pub listing_url: Option<String>,
}

#[tracing::instrument(skip(runtime))]
pub fn default_settings_dir<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let config_dir = runtime
        .config_dir()
        .context("Could not find the user configuration directory")?;
    Ok(config_dir.join(SETTINGS_DIR_NAME))
}

#[tracing::instrument(skip(runtime))]
pub fn default_sketchbook<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime.home_dir().context("Could not find home directory")?;
    Ok(home_dir.join(DEFAULT_SKETCHBOOK))
}

pub struct Config<R: Runtime> {
    pub runtime: Arc<R>,
    pub settings: Settings,
    pub settings_dir: PathBuf,
    pub sketchbook: PathBuf,
    pub listing_url: String,
    pub downloader: Arc<HttpDownloader<R>>,
    pub extractor: Arc<ArchiveExtractorImpl>,
}

impl<R: Runtime + 'static> Config<R> {
    pub fn new(runtime: R, overrides: Overrides) -> Result<Self> {
        let settings_dir = match overrides.settings_dir {
            Some(dir) => dir,
            None => default_settings_dir(&runtime)?,
        };
        let settings = Settings::load(&runtime, &settings_dir.join(SETTINGS_FILE))?;

        let sketchbook = match overrides.sketchbook.or_else(|| settings.sketchbook.clone()) {
            Some(path) => path,
            None => default_sketchbook(&runtime)?,
        };
        let listing_url = overrides
            .listing_url
            .unwrap_or_else(|| settings.listing_url.clone());
        debug!(
            "Using sketchbook {:?}, settings in {:?}",
            sketchbook, settings_dir
        );

        let client = Client::builder()
            .user_agent(concat!("contribman/", env!("CONTRIBMAN_VERSION")))
            .build()?;

        let runtime = Arc::new(runtime);
        let http_client = HttpClient::new(client);
        let downloader = Arc::new(HttpDownloader::new(Arc::clone(&runtime), http_client));
        let extractor = Arc::new(ArchiveExtractorImpl::new());

        Ok(Self {
            runtime,
            settings,
            settings_dir,
            sketchbook,
            listing_url,
            downloader,
            extractor,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_dir.join(SETTINGS_FILE)
    }

    /// Local copy of the advertised listing.
    pub fn listing_cache_path(&self) -> PathBuf {
        self.settings_dir.join(LISTING_CACHE_FILE)
    }

    /// A catalog for the host platform, not loaded yet.
    pub fn listing(&self) -> ContributionListing {
        ContributionListing::new(Platform::detect())
    }

    pub fn installer(
        &self,
        listing: Arc<ContributionListing>,
        cleanup: SharedCleanupContext,
    ) -> ContributionInstaller<R, ArchiveExtractorImpl> {
        ContributionInstaller::new(
            Arc::clone(&self.runtime),
            self.downloader.clone(),
            Arc::clone(&self.extractor),
            listing,
            self.sketchbook.clone(),
        )
        .with_options(self.settings.installer_options())
        .with_cleanup(cleanup)
    }
}
