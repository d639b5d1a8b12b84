//! Search tokens accepted by [`super::ContributionListing::filtered_list`].
//!
//! A token is either a property test (`is:installed`, `has:updates`,
//! `not:tool`, ...) or free text matched case-insensitively against a
//! contribution's name, authors, sentence, paragraph and category. A
//! `prefix:name` token whose name is no known property matches everything.

use crate::contribution::{Contribution, ContributionType};

/// Properties a `prefix:property` token can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Property {
    Updatable,
    Installed,
    Type(ContributionType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilterToken {
    Property { property: Property, negate: bool },
    /// Half-typed property tests match everything so the list does not
    /// flash empty while the user types
    Any,
    Text(String),
}

impl Property {
    fn parse(name: &str) -> Option<Self> {
        if name.starts_with("updat") || name.starts_with("upgrad") {
            Some(Property::Updatable)
        } else if name.starts_with("instal") && !name.starts_with("installabl") {
            Some(Property::Installed)
        } else if name == "tool" {
            Some(Property::Type(ContributionType::Tool))
        } else if name.starts_with("lib") {
            Some(Property::Type(ContributionType::Library))
        } else if name == "mode" {
            Some(Property::Type(ContributionType::Mode))
        } else if name == "compilation" {
            Some(Property::Type(ContributionType::LibraryCompilation))
        } else if name.starts_with("example") {
            Some(Property::Type(ContributionType::Examples))
        } else {
            None
        }
    }
}

pub(crate) fn parse_token(token: &str) -> FilterToken {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return FilterToken::Any;
    }

    if let Some((prefix, name)) = token.split_once(':') {
        let Some(property) = Property::parse(name) else {
            return FilterToken::Any;
        };
        return match prefix {
            "is" | "has" => FilterToken::Property {
                property,
                negate: false,
            },
            "not" => FilterToken::Property {
                property,
                negate: true,
            },
            _ => FilterToken::Text(token),
        };
    }

    FilterToken::Text(token)
}

/// Case-insensitive substring match over the describable fields.
/// `needle` must already be lowercase.
pub(crate) fn text_matches(contribution: &Contribution, needle: &str) -> bool {
    let info = contribution.info();
    [
        &info.name,
        &info.author_list,
        &info.sentence,
        &info.paragraph,
        &info.category,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// `None` and `"Any"` match every category; anything else must equal one
/// of the contribution's categories.
pub(crate) fn category_matches(category: Option<&str>, contribution: &Contribution) -> bool {
    match category {
        None => true,
        Some(wanted) if wanted.eq_ignore_ascii_case("any") => true,
        Some(wanted) => contribution.categories().iter().any(|c| c == wanted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::{AvailableContribution, ContributionInfo};

    #[test]
    fn test_parse_property_tokens() {
        assert_eq!(
            parse_token("is:installed"),
            FilterToken::Property {
                property: Property::Installed,
                negate: false
            }
        );
        assert_eq!(
            parse_token("NOT:Tool"),
            FilterToken::Property {
                property: Property::Type(ContributionType::Tool),
                negate: true
            }
        );
        assert_eq!(
            parse_token("has:upgrades"),
            FilterToken::Property {
                property: Property::Updatable,
                negate: false
            }
        );
        assert_eq!(
            parse_token("is:libraries"),
            FilterToken::Property {
                property: Property::Type(ContributionType::Library),
                negate: false
            }
        );
        assert_eq!(
            parse_token("is:compilation"),
            FilterToken::Property {
                property: Property::Type(ContributionType::LibraryCompilation),
                negate: false
            }
        );
    }

    #[test]
    fn test_parse_incomplete_property_matches_everything() {
        assert_eq!(parse_token("is:"), FilterToken::Any);
        assert_eq!(parse_token("is:inst"), FilterToken::Any);
        assert_eq!(parse_token("has:installable"), FilterToken::Any);
        assert_eq!(parse_token("  "), FilterToken::Any);
    }

    #[test]
    fn test_parse_unknown_property_matches_everything_whatever_the_prefix() {
        assert_eq!(parse_token("foo:bar"), FilterToken::Any);
        assert_eq!(parse_token("http://x.example"), FilterToken::Any);
    }

    #[test]
    fn test_parse_other_prefix_with_known_property_is_text() {
        assert_eq!(parse_token("foo:tool"), FilterToken::Text("foo:tool".to_string()));
        assert_eq!(parse_token("Sound"), FilterToken::Text("sound".to_string()));
    }

    #[test]
    fn test_text_matches_any_field() {
        let c: Contribution = AvailableContribution::new(
            ContributionType::Library,
            ContributionInfo {
                name: "Minim".into(),
                category: "Sound".into(),
                author_list: "Damien Di Fede".into(),
                sentence: "An audio library".into(),
                ..Default::default()
            },
            None,
        )
        .into();

        assert!(text_matches(&c, "minim"));
        assert!(text_matches(&c, "fede"));
        assert!(text_matches(&c, "audio"));
        assert!(text_matches(&c, "sound"));
        assert!(!text_matches(&c, "video"));
    }

    #[test]
    fn test_category_matches() {
        let c: Contribution = AvailableContribution::new(
            ContributionType::Library,
            ContributionInfo {
                name: "Minim".into(),
                category: "Sound".into(),
                ..Default::default()
            },
            None,
        )
        .into();

        assert!(category_matches(None, &c));
        assert!(category_matches(Some("ANY"), &c));
        assert!(category_matches(Some("Sound"), &c));
        assert!(!category_matches(Some("Video"), &c));
    }
}
