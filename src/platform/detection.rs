/// The host as seen by the `download.*` keys of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// `macosx`, `windows` or `linux`
    pub name: String,
    /// Pointer width, 32 or 64
    pub bits: u8,
    /// Major.minor release of the operating system, when known
    pub os_version: Option<String>,
}

impl Platform {
    pub fn new(name: impl Into<String>, bits: u8, os_version: Option<String>) -> Self {
        Self {
            name: name.into(),
            bits,
            os_version,
        }
    }

    /// Detect the current platform
    pub fn detect() -> Self {
        Self {
            name: Self::detect_name(),
            bits: Self::detect_bits(),
            os_version: Self::detect_os_version(),
        }
    }

    fn detect_name() -> String {
        #[cfg(target_os = "macos")]
        {
            "macosx".to_string()
        }
        #[cfg(target_os = "windows")]
        {
            "windows".to_string()
        }
        #[cfg(target_os = "linux")]
        {
            "linux".to_string()
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            std::env::consts::OS.to_string()
        }
    }

    fn detect_bits() -> u8 {
        #[cfg(target_pointer_width = "64")]
        {
            64
        }
        #[cfg(not(target_pointer_width = "64"))]
        {
            32
        }
    }

    fn detect_os_version() -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/sys/kernel/osrelease")
                .ok()
                .and_then(|release| major_minor(&release))
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }
}

/// Reduce a release string such as `6.8.0-45-generic` to `6.8`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn major_minor(release: &str) -> Option<String> {
    let mut parts = release
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty());
    let major = parts.next()?;
    match parts.next() {
        Some(minor) => Some(format!("{}.{}", major, minor)),
        None => Some(major.to_string()),
    }
}
