//! Contribution entity model.
//!
//! A contribution is either *available* (described by one record of the
//! advertised listing) or *installed* (backed by a folder in the sketchbook).
//! Both share the describable fields in [`ContributionInfo`]; the catalog holds
//! them behind the [`Contribution`] handle, whose identity is the `Arc` it
//! wraps and whose reconciliation key is `(name, type)`.

pub mod descriptor;
mod kind;

use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::platform::{Platform, resolve_download_link};

pub use kind::ContributionType;

/// Category used when a package does not declare one.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Describable fields shared by available and installed contributions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContributionInfo {
    pub name: String,
    pub category: String,
    pub author_list: String,
    pub url: String,
    pub sentence: String,
    pub paragraph: String,
    /// Monotonically increasing release number used for update checks
    pub version: i64,
    pub pretty_version: String,
    /// Packages a library exports, without the trailing `.*`
    pub imports: Vec<String>,
    /// Oldest host revision the package runs on, 0 for no bound
    pub min_revision: i64,
    /// Newest host revision the package runs on, 0 for no bound
    pub max_revision: i64,
}

impl ContributionInfo {
    /// Build from parsed properties. `fallback_name` is used when the record
    /// carries no `name`; a missing or malformed `version` reads as 0.
    pub fn from_properties(properties: &HashMap<String, String>, fallback_name: &str) -> Self {
        let get = |key: &str| properties.get(key).cloned().unwrap_or_default();

        let name = match properties.get("name") {
            Some(name) if !name.is_empty() => name.clone(),
            _ => fallback_name.to_string(),
        };

        let version = match properties.get("version") {
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                warn!(
                    "The version number for \"{}\" is not set properly ({:?}), treating it as 0",
                    name, raw
                );
                0
            }),
            None => 0,
        };

        let category = match properties.get("category") {
            Some(category) if !category.is_empty() => category.clone(),
            _ => UNKNOWN_CATEGORY.to_string(),
        };

        Self {
            name,
            category,
            author_list: get("authorList"),
            url: get("url"),
            sentence: get("sentence"),
            paragraph: get("paragraph"),
            version,
            pretty_version: get("prettyVersion"),
            imports: properties.get("imports").map(|raw| parse_imports(raw)).unwrap_or_default(),
            min_revision: parse_revision(properties.get("minRevision")),
            max_revision: parse_revision(properties.get("maxRevision")),
        }
    }

    /// The comma-separated `category` value split into its names. Blank
    /// names are dropped; a record with none is in [`UNKNOWN_CATEGORY`].
    pub fn categories(&self) -> Vec<String> {
        let categories: Vec<String> = self
            .category
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if categories.is_empty() {
            vec![UNKNOWN_CATEGORY.to_string()]
        } else {
            categories
        }
    }

    /// Whether the package runs on host `revision`.
    pub fn is_compatible(&self, revision: i64) -> bool {
        (self.min_revision == 0 || revision >= self.min_revision)
            && (self.max_revision == 0 || revision <= self.max_revision)
    }
}

/// `a.*, a.b.*` => `["a", "a.b"]`.
fn parse_imports(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .map(|name| name.strip_suffix(".*").unwrap_or(name))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_revision(raw: Option<&String>) -> i64 {
    raw.and_then(|r| r.trim().parse().ok()).unwrap_or(0)
}

/// Reconciliation key: advertised and installed records with equal keys are
/// the same contribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContributionKey {
    pub name: String,
    pub kind: ContributionType,
}

impl ContributionKey {
    pub fn new(name: impl Into<String>, kind: ContributionType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ContributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// A contribution described by one record of the advertised listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableContribution {
    pub kind: ContributionType,
    pub info: ContributionInfo,
    /// Download link for the host platform, `None` if the package does not
    /// support it
    pub link: Option<String>,
}

impl AvailableContribution {
    pub fn new(kind: ContributionType, info: ContributionInfo, link: Option<String>) -> Self {
        Self { kind, info, link }
    }

    /// Build from the `key=value` body of one listing record, resolving the
    /// download link for `platform`.
    pub fn from_record(
        kind: ContributionType,
        params: &HashMap<String, String>,
        platform: &Platform,
    ) -> Self {
        let info = ContributionInfo::from_properties(params, "");
        let link = resolve_download_link(params, platform);
        Self { kind, info, link }
    }

    pub fn key(&self) -> ContributionKey {
        ContributionKey::new(self.info.name.clone(), self.kind)
    }
}

/// A contribution backed by a folder in the sketchbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledContribution {
    pub kind: ContributionType,
    pub info: ContributionInfo,
    pub folder: PathBuf,
}

impl InstalledContribution {
    pub fn new(kind: ContributionType, info: ContributionInfo, folder: PathBuf) -> Self {
        Self { kind, info, folder }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of this package's descriptor file.
    pub fn descriptor_path(&self) -> PathBuf {
        self.folder.join(self.kind.descriptor_file_name())
    }

    pub fn key(&self) -> ContributionKey {
        ContributionKey::new(self.info.name.clone(), self.kind)
    }
}

/// Shared handle to an entry of the catalog.
#[derive(Debug, Clone)]
pub enum Contribution {
    Available(Arc<AvailableContribution>),
    Installed(Arc<InstalledContribution>),
}

impl Contribution {
    pub fn kind(&self) -> ContributionType {
        match self {
            Contribution::Available(c) => c.kind,
            Contribution::Installed(c) => c.kind,
        }
    }

    pub fn info(&self) -> &ContributionInfo {
        match self {
            Contribution::Available(c) => &c.info,
            Contribution::Installed(c) => &c.info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn category(&self) -> &str {
        &self.info().category
    }

    pub fn categories(&self) -> Vec<String> {
        self.info().categories()
    }

    pub fn imports(&self) -> &[String] {
        &self.info().imports
    }

    pub fn version(&self) -> i64 {
        self.info().version
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Contribution::Installed(_))
    }

    pub fn key(&self) -> ContributionKey {
        ContributionKey::new(self.name(), self.kind())
    }

    pub fn as_installed(&self) -> Option<&Arc<InstalledContribution>> {
        match self {
            Contribution::Installed(c) => Some(c),
            Contribution::Available(_) => None,
        }
    }

    pub fn as_available(&self) -> Option<&Arc<AvailableContribution>> {
        match self {
            Contribution::Available(c) => Some(c),
            Contribution::Installed(_) => None,
        }
    }

    /// Object identity: true only for two handles to the same record.
    pub fn same(&self, other: &Contribution) -> bool {
        match (self, other) {
            (Contribution::Available(a), Contribution::Available(b)) => Arc::ptr_eq(a, b),
            (Contribution::Installed(a), Contribution::Installed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<AvailableContribution> for Contribution {
    fn from(c: AvailableContribution) -> Self {
        Contribution::Available(Arc::new(c))
    }
}

impl From<InstalledContribution> for Contribution {
    fn from(c: InstalledContribution) -> Self {
        Contribution::Installed(Arc::new(c))
    }
}
