//! Parser for the advertised listing file.
//!
//! The file is a sequence of blocks. A block opens with a bare type token
//! (`library`, `tool`, ...), continues with `key=value` lines and ends at a
//! blank line or end of file:
//!
//! ```text
//! library
//! name=Foo
//! version=3
//! download=http://example.com/Foo.zip
//!
//! tool
//! name=Bar
//! ```

use log::warn;
use std::collections::HashMap;

use crate::contribution::descriptor::parse_properties;
use crate::contribution::{AvailableContribution, ContributionKey, ContributionType};
use crate::platform::Platform;

/// Parse every well-formed record of `text`.
///
/// Blocks with an unknown type token or without a name are skipped. When two
/// records share a `(name, type)` key the later one wins and takes the
/// earlier one's position.
pub fn parse_listing(text: &str, platform: &Platform) -> Vec<AvailableContribution> {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<AvailableContribution> = Vec::new();
    let mut positions: HashMap<ContributionKey, usize> = HashMap::new();

    let mut start = 0;
    while start < lines.len() {
        let header = lines[start].trim();
        if header.is_empty() {
            start += 1;
            continue;
        }

        let mut end = start + 1;
        while end < lines.len() && !lines[end].trim().is_empty() {
            end += 1;
        }

        match ContributionType::from_name(header).filter(|_| !header.contains('=')) {
            None => {
                warn!(
                    "Error in contribution listing file on line {}: unknown type {:?}",
                    start + 1,
                    header
                );
            }
            Some(kind) => {
                let params = parse_properties(lines[start + 1..end].iter().copied());
                let record = AvailableContribution::from_record(kind, &params, platform);
                if record.info.name.is_empty() {
                    warn!(
                        "Skipping {} record without a name on line {}",
                        kind,
                        start + 1
                    );
                } else {
                    let key = record.key();
                    match positions.get(&key) {
                        Some(&index) => {
                            warn!("Duplicate listing record for {}, keeping the last one", key);
                            out[index] = record;
                        }
                        None => {
                            positions.insert(key, out.len());
                            out.push(record);
                        }
                    }
                }
            }
        }

        start = end + 1;
    }

    out
}
