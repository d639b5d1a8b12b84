//! The contribution catalog.
//!
//! [`ContributionListing`] merges the advertised listing with the installed
//! contributions into one list keyed by `(name, type)`, keeps a category
//! index and an import-header index in step with it, answers filter queries
//! and publishes [`ListingEvent`]s to subscribers.
//!
//! All mutation happens under one lock: the list and the index are updated
//! together and events are sent before the lock is released, so subscribers
//! see changes in the order they were applied.

mod events;
mod filter;
mod parse;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::contribution::{
    AvailableContribution, Contribution, ContributionKey, InstalledContribution,
};
use crate::download::Downloader;
use crate::platform::Platform;
use crate::progress::ProgressSink;
use crate::runtime::Runtime;

pub use events::ListingEvent;
pub use parse::parse_listing;

use filter::{FilterToken, Property, category_matches, parse_token, text_matches};

/// Name of the scratch file a refresh downloads into before replacing the cache.
pub const LISTING_TEMP_FILE: &str = "contributions_temp.txt";

/// What a call to [`ContributionListing::refresh`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call downloaded and loaded the listing
    Loaded,
    /// Another refresh was in flight; this call waited for it instead
    Joined,
}

#[derive(Default)]
struct ListingState {
    advertised: Vec<Arc<AvailableContribution>>,
    all: Vec<Contribution>,
    by_category: HashMap<String, Vec<Contribution>>,
    /// Exported package => the library declaring it
    by_import: HashMap<String, Contribution>,
    subscribers: Vec<mpsc::UnboundedSender<ListingEvent>>,
}

pub struct ContributionListing {
    platform: Platform,
    state: Mutex<ListingState>,
    refresh_lock: tokio::sync::Mutex<()>,
    downloaded_latest: AtomicBool,
    download_failed: AtomicBool,
}

impl ContributionListing {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: Mutex::new(ListingState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            downloaded_latest: AtomicBool::new(false),
            download_failed: AtomicBool::new(false),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Parse the cached listing at `path` and merge it in. A missing file
    /// loads as an empty listing.
    #[tracing::instrument(skip(self, runtime))]
    pub fn load_advertised<R: Runtime + ?Sized>(&self, runtime: &R, path: &Path) -> Result<()> {
        if !runtime.exists(path) {
            info!("No cached contribution listing at {:?}", path);
            self.load_advertised_text("");
            return Ok(());
        }
        let text = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read contribution listing {:?}", path))?;
        self.load_advertised_text(&text);
        Ok(())
    }

    /// Replace the advertised set with the records in `text`.
    ///
    /// Installed entries are never displaced by advertised ones. An
    /// advertised entry already in the list is swapped for its new record,
    /// and advertised entries missing from `text` are removed.
    pub fn load_advertised_text(&self, text: &str) {
        let records: Vec<Arc<AvailableContribution>> = parse_listing(text, &self.platform)
            .into_iter()
            .map(Arc::new)
            .collect();
        debug!("Loaded {} advertised contributions", records.len());

        let mut state = self.state.lock().unwrap();
        let new_keys: HashSet<ContributionKey> = records.iter().map(|r| r.key()).collect();

        let stale: Vec<Contribution> = state
            .all
            .iter()
            .filter(|c| !c.is_installed() && !new_keys.contains(&c.key()))
            .cloned()
            .collect();
        for c in stale {
            state.remove(&c);
        }

        for record in &records {
            let new = Contribution::Available(Arc::clone(record));
            match state.find(&record.key()) {
                Some(existing) if existing.is_installed() => {}
                Some(existing) => {
                    state.replace(&existing, new);
                }
                None => state.add(new),
            }
        }

        state.sort();
        state.advertised = records;
    }

    /// Download the listing from `url` into `cache_path` and load it.
    ///
    /// Refreshes are single-flight: a call made while another is in progress
    /// waits for that one to finish and returns [`RefreshOutcome::Joined`]
    /// without touching the network, or fails if that refresh failed. `progress.finished()` is called exactly
    /// once either way.
    #[tracing::instrument(skip(self, runtime, downloader, progress))]
    pub async fn refresh<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        downloader: &dyn Downloader,
        url: &str,
        cache_path: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<RefreshOutcome> {
        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Listing refresh already in progress, waiting for it");
                let _ = self.refresh_lock.lock().await;
                if self.has_list_download_failed() {
                    let message = "The contribution listing refresh this call waited for failed";
                    progress.error(message);
                    progress.finished();
                    anyhow::bail!(message);
                }
                progress.finished();
                return Ok(RefreshOutcome::Joined);
            }
        };

        let result = self
            .refresh_locked(runtime, downloader, url, cache_path, &progress)
            .await;

        match &result {
            Ok(()) => {
                self.downloaded_latest.store(true, Ordering::SeqCst);
                self.download_failed.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("Failed to refresh contribution listing: {:#}", e);
                self.download_failed.store(true, Ordering::SeqCst);
                if !progress.is_canceled() {
                    progress.error(&format!("{:#}", e));
                }
            }
        }
        progress.finished();
        result.map(|()| RefreshOutcome::Loaded)
    }

    async fn refresh_locked<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        downloader: &dyn Downloader,
        url: &str,
        cache_path: &Path,
        progress: &Arc<dyn ProgressSink>,
    ) -> Result<()> {
        reqwest::Url::parse(url)
            .with_context(|| format!("Malformed contribution listing URL {:?}", url))?;

        let temp_path = cache_path.with_file_name(LISTING_TEMP_FILE);
        if let Some(parent) = cache_path.parent() {
            runtime.create_dir_all(parent)?;
        }

        info!("Downloading contribution listing from {}", url);
        let download = downloader
            .download(url, &temp_path, Arc::clone(progress))
            .await;
        if let Err(e) = download {
            if runtime.exists(&temp_path) {
                let _ = runtime.remove_file(&temp_path);
            }
            return Err(e);
        }
        if progress.is_canceled() {
            anyhow::bail!("Listing download canceled");
        }

        if runtime.exists(cache_path) {
            runtime.remove_file(cache_path)?;
        }
        runtime
            .rename(&temp_path, cache_path)
            .with_context(|| format!("Failed to move listing into {:?}", cache_path))?;

        self.load_advertised(runtime, cache_path)
    }

    pub fn is_downloading_listing(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }

    pub fn has_downloaded_latest_list(&self) -> bool {
        self.downloaded_latest.load(Ordering::SeqCst)
    }

    pub fn has_list_download_failed(&self) -> bool {
        self.download_failed.load(Ordering::SeqCst)
    }

    /// Merge scanned installed contributions: an entry with the same key is
    /// replaced in place, anything else is added.
    #[tracing::instrument(skip(self, installed))]
    pub fn merge_installed(&self, installed: Vec<InstalledContribution>) {
        let mut state = self.state.lock().unwrap();
        for c in installed {
            let new = Contribution::from(c);
            match state.find(&new.key()) {
                Some(existing) => {
                    state.replace(&existing, new);
                }
                None => state.add(new),
            }
        }
    }

    /// Swap `old` for `new` at the same position. Returns false if `old` is
    /// not in the catalog.
    pub fn replace(&self, old: &Contribution, new: Contribution) -> bool {
        self.state.lock().unwrap().replace(old, new)
    }

    pub fn add(&self, contribution: Contribution) {
        self.state.lock().unwrap().add(contribution);
    }

    /// Returns false if `contribution` is not in the catalog.
    pub fn remove(&self, contribution: &Contribution) -> bool {
        self.state.lock().unwrap().remove(contribution)
    }

    /// Subscribe to changes. Every current entry is replayed as
    /// [`ListingEvent::Added`] before any later event is delivered.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ListingEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        for c in &state.all {
            let _ = tx.send(ListingEvent::Added(c.clone()));
        }
        state.subscribers.push(tx);
        rx
    }

    /// Snapshot of the merged list, sorted by case-insensitive name.
    pub fn contributions(&self) -> Vec<Contribution> {
        self.state.lock().unwrap().all.clone()
    }

    pub fn advertised(&self) -> Vec<Arc<AvailableContribution>> {
        self.state.lock().unwrap().advertised.clone()
    }

    pub fn find(&self, key: &ContributionKey) -> Option<Contribution> {
        self.state.lock().unwrap().find(key)
    }

    /// Entries whose name matches, across all types.
    pub fn find_by_name(&self, name: &str) -> Vec<Contribution> {
        self.state
            .lock()
            .unwrap()
            .all
            .iter()
            .filter(|c| c.name() == name)
            .cloned()
            .collect()
    }

    /// The advertised record with the same key as `contribution`.
    pub fn available_for(&self, contribution: &Contribution) -> Option<Arc<AvailableContribution>> {
        self.state.lock().unwrap().available_for(&contribution.key())
    }

    /// Contributions in `category` (`None` or `"Any"` for all) matching every token.
    pub fn filtered_list(&self, category: Option<&str>, tokens: &[&str]) -> Vec<Contribution> {
        let parsed: Vec<FilterToken> = tokens.iter().map(|t| parse_token(t)).collect();
        let state = self.state.lock().unwrap();
        state
            .all
            .iter()
            .filter(|c| category_matches(category, c))
            .filter(|c| parsed.iter().all(|t| state.matches_token(c, t)))
            .cloned()
            .collect()
    }

    pub fn matches(&self, contribution: &Contribution, token: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.matches_token(contribution, &parse_token(token))
    }

    /// True iff `contribution` is installed and its advertised counterpart
    /// has a strictly greater version.
    pub fn has_updates(&self, contribution: &Contribution) -> bool {
        self.state.lock().unwrap().has_updates(contribution)
    }

    pub fn count_updates(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.all.iter().filter(|c| state.has_updates(c)).count()
    }

    pub fn has_any_updates(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.all.iter().any(|c| state.has_updates(c))
    }

    /// Advertised pretty version of `contribution`, prefixed with `v`.
    pub fn latest_version(&self, contribution: &Contribution) -> Option<String> {
        let advertised = self.available_for(contribution)?;
        normalize_pretty_version(&advertised.info.pretty_version)
    }

    /// Sorted, non-blank category names currently in the catalog.
    pub fn categories(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut categories: Vec<String> = state
            .by_category
            .iter()
            .filter(|(name, list)| !name.trim().is_empty() && !list.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        categories.sort();
        categories
    }

    /// The library that exports `header`. A trailing `.*` is ignored, and a
    /// class name (`foo.bar.Baz`) falls back to its package.
    pub fn library_for_import(&self, header: &str) -> Option<Contribution> {
        let header = header.trim();
        let header = header.strip_suffix(".*").unwrap_or(header);
        let state = self.state.lock().unwrap();
        state.by_import.get(header).cloned().or_else(|| {
            let (package, _) = header.rsplit_once('.')?;
            state.by_import.get(package).cloned()
        })
    }

    /// Advertised libraries that would satisfy `headers` but are not
    /// installed. Headers from the host's own packages (`java.`, `javax.`,
    /// `processing.`) are skipped. Each library appears once.
    pub fn missing_libraries(&self, headers: &[&str]) -> Vec<Arc<AvailableContribution>> {
        let mut missing: Vec<Arc<AvailableContribution>> = Vec::new();
        for header in headers {
            if HOST_PACKAGES.iter().any(|p| header.trim().starts_with(*p)) {
                continue;
            }
            let Some(Contribution::Available(library)) = self.library_for_import(header) else {
                continue;
            };
            if !missing.iter().any(|m| Arc::ptr_eq(m, &library)) {
                missing.push(library);
            }
        }
        missing
    }

    /// `list` without the entries that do not run on host `revision`.
    pub fn compatible_list(&self, list: Vec<Contribution>, revision: i64) -> Vec<Contribution> {
        list.into_iter()
            .filter(|c| c.info().is_compatible(revision))
            .collect()
    }
}

/// Package prefixes provided by the host itself.
const HOST_PACKAGES: [&str; 3] = ["java.", "javax.", "processing."];

impl ListingState {
    fn find(&self, key: &ContributionKey) -> Option<Contribution> {
        self.all.iter().find(|c| &c.key() == key).cloned()
    }

    fn available_for(&self, key: &ContributionKey) -> Option<Arc<AvailableContribution>> {
        self.advertised.iter().find(|a| &a.key() == key).cloned()
    }

    fn has_updates(&self, contribution: &Contribution) -> bool {
        if !contribution.is_installed() {
            return false;
        }
        self.available_for(&contribution.key())
            .is_some_and(|advertised| advertised.info.version > contribution.version())
    }

    fn matches_token(&self, contribution: &Contribution, token: &FilterToken) -> bool {
        match token {
            FilterToken::Any => true,
            FilterToken::Text(needle) => text_matches(contribution, needle),
            FilterToken::Property { property, negate } => {
                let value = match property {
                    Property::Updatable => self.has_updates(contribution),
                    Property::Installed => contribution.is_installed(),
                    Property::Type(kind) => contribution.kind() == *kind,
                };
                value != *negate
            }
        }
    }

    fn add(&mut self, contribution: Contribution) {
        if let Some(existing) = self.find(&contribution.key()) {
            debug!("{} is already listed, replacing it", contribution.key());
            self.replace(&existing, contribution);
            return;
        }

        self.index(&contribution);
        self.all.push(contribution.clone());
        self.sort();
        self.notify(ListingEvent::Added(contribution));
    }

    fn replace(&mut self, old: &Contribution, new: Contribution) -> bool {
        let Some(index) = self.all.iter().position(|c| c.same(old)) else {
            debug!("Cannot replace {}: not in the listing", old.key());
            return false;
        };
        self.all[index] = new.clone();

        let new_categories = new.categories();
        for category in old.categories() {
            let Some(list) = self.by_category.get_mut(&category) else {
                continue;
            };
            if new_categories.contains(&category) {
                for slot in list.iter_mut().filter(|c| c.same(old)) {
                    *slot = new.clone();
                }
            } else {
                list.retain(|c| !c.same(old));
                if list.is_empty() {
                    self.by_category.remove(&category);
                }
            }
        }
        let old_categories = old.categories();
        for category in new_categories {
            if !old_categories.contains(&category) {
                let list = self.by_category.entry(category).or_default();
                list.push(new.clone());
                sort_by_name(list);
            }
        }

        self.unindex_imports(old);
        self.index_imports(&new);

        self.notify(ListingEvent::Changed {
            old: old.clone(),
            new,
        });
        true
    }

    fn remove(&mut self, contribution: &Contribution) -> bool {
        let before = self.all.len();
        self.all.retain(|c| !c.same(contribution));
        if self.all.len() == before {
            return false;
        }
        self.unindex(contribution);
        self.notify(ListingEvent::Removed(contribution.clone()));
        true
    }

    fn index(&mut self, contribution: &Contribution) {
        for category in contribution.categories() {
            let list = self.by_category.entry(category).or_default();
            list.push(contribution.clone());
            sort_by_name(list);
        }
        self.index_imports(contribution);
    }

    fn unindex(&mut self, contribution: &Contribution) {
        for category in contribution.categories() {
            if let Some(list) = self.by_category.get_mut(&category) {
                list.retain(|c| !c.same(contribution));
                if list.is_empty() {
                    self.by_category.remove(&category);
                }
            }
        }
        self.unindex_imports(contribution);
    }

    fn index_imports(&mut self, contribution: &Contribution) {
        for header in contribution.imports() {
            self.by_import.insert(header.clone(), contribution.clone());
        }
    }

    /// Drops only the headers still pointing at `contribution`.
    fn unindex_imports(&mut self, contribution: &Contribution) {
        for header in contribution.imports() {
            if self.by_import.get(header).is_some_and(|c| c.same(contribution)) {
                self.by_import.remove(header);
            }
        }
    }

    fn sort(&mut self) {
        sort_by_name(&mut self.all);
    }

    fn notify(&mut self, event: ListingEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn sort_by_name(list: &mut [Contribution]) {
    list.sort_by_cached_key(|c| c.name().to_lowercase());
}

/// `"build 12, 2020"` => `"v12"`, `"v1.2"` unchanged, `"1.2"` => `"v1.2"`.
fn normalize_pretty_version(pretty: &str) -> Option<String> {
    let pretty = pretty.trim();
    if pretty.is_empty() {
        return None;
    }
    let lower = pretty.to_lowercase();
    if lower.starts_with("build") {
        let rest = pretty.get(5..).unwrap_or_default();
        let number = rest.split(',').next().unwrap_or(rest).trim();
        Some(format!("v{}", number))
    } else if lower.starts_with('v') {
        Some(pretty.to_string())
    } else {
        Some(format!("v{}", pretty))
    }
}
