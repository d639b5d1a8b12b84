use std::fmt;
use std::str::FromStr;

/// The kinds of add-on packages a sketchbook can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContributionType {
    Library,
    LibraryCompilation,
    Tool,
    Mode,
    Examples,
}

impl ContributionType {
    pub const ALL: [ContributionType; 5] = [
        ContributionType::Library,
        ContributionType::LibraryCompilation,
        ContributionType::Tool,
        ContributionType::Mode,
        ContributionType::Examples,
    ];

    /// Parse the bare type token used by the listing file (`library`, `tool`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "library" => Some(ContributionType::Library),
            "compilation" | "librarycompilation" => Some(ContributionType::LibraryCompilation),
            "tool" => Some(ContributionType::Tool),
            "mode" => Some(ContributionType::Mode),
            "examples" => Some(ContributionType::Examples),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContributionType::Library => "library",
            ContributionType::LibraryCompilation => "compilation",
            ContributionType::Tool => "tool",
            ContributionType::Mode => "mode",
            ContributionType::Examples => "examples",
        }
    }

    /// Sketchbook subfolder holding contributions of this type.
    /// Compilations unpack next to regular libraries.
    pub fn folder_name(&self) -> &'static str {
        match self {
            ContributionType::Library | ContributionType::LibraryCompilation => "libraries",
            ContributionType::Tool => "tools",
            ContributionType::Mode => "modes",
            ContributionType::Examples => "examples",
        }
    }

    /// Name of the descriptor file that marks a package root of this type,
    /// e.g. `library.properties`.
    pub fn descriptor_file_name(&self) -> String {
        format!("{}.properties", self.name())
    }

    /// Tools and modes keep code loaded in the host process, so removing them
    /// is deferred to the next start.
    pub fn requires_restart(&self) -> bool {
        matches!(self, ContributionType::Tool | ContributionType::Mode)
    }
}

impl fmt::Display for ContributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContributionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContributionType::from_name(s).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown contribution type '{}'. Expected one of: library, compilation, tool, mode, examples",
                s
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_listing_tokens() {
        assert_eq!(ContributionType::from_name("library"), Some(ContributionType::Library));
        assert_eq!(ContributionType::from_name("Tool"), Some(ContributionType::Tool));
        assert_eq!(ContributionType::from_name(" mode "), Some(ContributionType::Mode));
        assert_eq!(
            ContributionType::from_name("librarycompilation"),
            Some(ContributionType::LibraryCompilation)
        );
        assert_eq!(ContributionType::from_name("examples"), Some(ContributionType::Examples));
        assert_eq!(ContributionType::from_name("plugin"), None);
        assert_eq!(ContributionType::from_name("name=Foo"), None);
    }

    #[test]
    fn test_name_round_trips_through_from_name() {
        for kind in ContributionType::ALL {
            assert_eq!(ContributionType::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_folders_and_descriptors() {
        assert_eq!(ContributionType::Library.folder_name(), "libraries");
        assert_eq!(ContributionType::LibraryCompilation.folder_name(), "libraries");
        assert_eq!(ContributionType::Tool.folder_name(), "tools");
        assert_eq!(ContributionType::Mode.folder_name(), "modes");
        assert_eq!(ContributionType::Library.descriptor_file_name(), "library.properties");
        assert_eq!(ContributionType::Tool.descriptor_file_name(), "tool.properties");
    }

    #[test]
    fn test_requires_restart() {
        assert!(ContributionType::Tool.requires_restart());
        assert!(ContributionType::Mode.requires_restart());
        assert!(!ContributionType::Library.requires_restart());
        assert!(!ContributionType::LibraryCompilation.requires_restart());
        assert!(!ContributionType::Examples.requires_restart());
    }

    #[test]
    fn test_from_str_error_lists_choices() {
        let err = "widget".parse::<ContributionType>().unwrap_err();
        assert!(err.to_string().contains("library, compilation, tool, mode, examples"));
    }
}
