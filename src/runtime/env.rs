//! Well-known directories, scratch folders and the local clock.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn config_dir_impl(&self) -> Option<PathBuf> {
        dirs::config_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_temp_dir_impl(&self, prefix: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .context("Failed to create temporary directory")?;
        Ok(dir.keep())
    }

    pub(crate) fn today_impl(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_real_runtime_dirs() {
        let runtime = RealRuntime;

        let home = runtime.home_dir();
        assert!(home.is_some() || cfg!(target_os = "linux")); // CI might not have home
    }

    #[test]
    fn test_real_runtime_temp_dirs_are_unique() {
        let runtime = RealRuntime;

        let a = runtime.create_temp_dir("contribman-test").unwrap();
        let b = runtime.create_temp_dir("contribman-test").unwrap();

        assert_ne!(a, b);
        assert!(runtime.is_dir(&a));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("contribman-test"));

        runtime.remove_dir_all(&a).unwrap();
        runtime.remove_dir_all(&b).unwrap();
    }

    #[test]
    fn test_real_runtime_today_formats_as_iso_date() {
        let today = RealRuntime.today().format("%Y-%m-%d").to_string();
        assert_eq!(today.len(), 10);
        assert_eq!(&today[4..5], "-");
    }
}
