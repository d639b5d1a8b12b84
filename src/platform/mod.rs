//! Host platform detection and download link selection
//!
//! An advertised record may carry several `download.*` keys, one per
//! supported platform. This module detects the host [`Platform`] and picks the
//! most specific key that matches it.

mod detection;
mod resolve;

pub use detection::Platform;
pub use resolve::{download_keys, resolve_download_link};
