use crate::contribution::ContributionKey;

/// User-facing reasons an install or remove task stops.
///
/// Carried inside `anyhow::Error`; recover with `downcast_ref::<InstallError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// No folder in the archive holds a descriptor for the expected type
    NoContributionFound,
    /// More than one folder in the archive holds a descriptor
    AmbiguousArchive(usize),
    /// The listing has no download link for this platform
    PlatformUnsupported(ContributionKey),
    /// The contribution is not in the advertised listing
    NotAdvertised(ContributionKey),
    MalformedUrl(String),
    Canceled,
    NotInstalled(ContributionKey),
}

impl std::fmt::Display for InstallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallError::NoContributionFound => {
                write!(f, "No contribution found in the downloaded archive")
            }
            InstallError::AmbiguousArchive(count) => {
                write!(
                    f,
                    "The archive contains {} contributions instead of one, ignoring it",
                    count
                )
            }
            InstallError::PlatformUnsupported(key) => {
                write!(
                    f,
                    "{} does not support this operating system; see its web page for more info",
                    key
                )
            }
            InstallError::NotAdvertised(key) => {
                write!(f, "{} is not in the contribution listing", key)
            }
            InstallError::MalformedUrl(url) => {
                write!(f, "Malformed download URL: {}", url)
            }
            InstallError::Canceled => write!(f, "Canceled"),
            InstallError::NotInstalled(key) => write!(f, "{} is not installed", key),
        }
    }
}

impl std::error::Error for InstallError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::ContributionType;

    #[test]
    fn test_display() {
        let key = ContributionKey::new("Foo", ContributionType::Library);

        assert!(
            InstallError::NoContributionFound
                .to_string()
                .contains("No contribution found")
        );
        assert!(
            InstallError::AmbiguousArchive(2)
                .to_string()
                .contains("2 contributions")
        );
        assert_eq!(
            InstallError::NotInstalled(key.clone()).to_string(),
            "Foo (library) is not installed"
        );
        assert!(
            InstallError::PlatformUnsupported(key)
                .to_string()
                .contains("does not support")
        );
    }

    #[test]
    fn test_downcast_through_context() {
        use anyhow::Context;

        let err = Err::<(), _>(InstallError::Canceled)
            .context("Installing Foo")
            .unwrap_err();
        assert_eq!(err.downcast_ref::<InstallError>(), Some(&InstallError::Canceled));
    }
}
