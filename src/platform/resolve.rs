use std::collections::HashMap;

use super::Platform;

/// Candidate `download.*` keys for `platform`, most specific first.
pub fn download_keys(platform: &Platform) -> Vec<String> {
    let name = &platform.name;
    let bits = platform.bits;

    let mut keys = Vec::with_capacity(5);
    if let Some(osv) = &platform.os_version {
        keys.push(format!("download.{}{}.{}", name, bits, osv));
        keys.push(format!("download.{}.{}", name, osv));
    }
    keys.push(format!("download.{}{}", name, bits));
    keys.push(format!("download.{}", name));
    keys.push("download".to_string());
    keys
}

/// Pick the download link of a listing record for `platform`.
///
/// Returns `None` when no key matches, meaning the package does not support
/// the host. Empty values count as absent.
pub fn resolve_download_link(
    params: &HashMap<String, String>,
    platform: &Platform,
) -> Option<String> {
    download_keys(platform)
        .iter()
        .filter_map(|key| params.get(key))
        .find(|link| !link.is_empty())
        .cloned()
}
