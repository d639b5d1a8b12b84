//! `key=value` property files: the per-package descriptor
//! (`library.properties`, `tool.properties`, ...) and the record bodies of the
//! advertised listing share this syntax.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::runtime::Runtime;

use super::ContributionInfo;

/// Keys written to a descriptor on install, in this exact order.
pub const DESCRIPTOR_KEYS: [&str; 8] = [
    "name",
    "category",
    "authorList",
    "url",
    "sentence",
    "paragraph",
    "version",
    "prettyVersion",
];

/// Parse `key=value` lines. Blank lines and `#` comments are skipped, both
/// sides are trimmed, and only the first `=` splits. Later keys win.
pub fn parse_properties<'a, I>(lines: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut properties = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            properties.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    properties
}

/// Render the canonical descriptor for `info`. The package-only keys
/// (`imports`, `minRevision`, `maxRevision`) follow the canonical block when
/// they are set.
pub fn render_descriptor(info: &ContributionInfo) -> String {
    let version = info.version.to_string();
    let values = [
        info.name.as_str(),
        info.category.as_str(),
        info.author_list.as_str(),
        info.url.as_str(),
        info.sentence.as_str(),
        info.paragraph.as_str(),
        version.as_str(),
        info.pretty_version.as_str(),
    ];

    let mut out = String::new();
    for (key, value) in DESCRIPTOR_KEYS.iter().zip(values) {
        out.push_str(key);
        out.push('=');
        // One property per line
        out.push_str(&value.replace(['\r', '\n'], " "));
        out.push('\n');
    }

    if !info.imports.is_empty() {
        let imports: Vec<String> = info.imports.iter().map(|i| format!("{}.*", i)).collect();
        out.push_str(&format!("imports={}\n", imports.join(",")));
    }
    if info.min_revision != 0 {
        out.push_str(&format!("minRevision={}\n", info.min_revision));
    }
    if info.max_revision != 0 {
        out.push_str(&format!("maxRevision={}\n", info.max_revision));
    }
    out
}

#[tracing::instrument(skip(runtime))]
pub fn read_descriptor<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
) -> Result<HashMap<String, String>> {
    let content = runtime
        .read_to_string(path)
        .with_context(|| format!("Failed to read descriptor {:?}", path))?;
    Ok(parse_properties(content.lines()))
}

/// Overwrite the descriptor at `path` with the canonical fields of `info`.
#[tracing::instrument(skip(runtime, info))]
pub fn write_descriptor<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    info: &ContributionInfo,
) -> Result<()> {
    runtime
        .write(path, render_descriptor(info).as_bytes())
        .with_context(|| format!("Failed to write descriptor {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    fn sample_info() -> ContributionInfo {
        ContributionInfo {
            name: "Foo".into(),
            category: "Sound".into(),
            author_list: "[Ada](http://ada.example)".into(),
            url: "http://foo.example".into(),
            sentence: "Makes noise.".into(),
            paragraph: "Loud\nnoise".into(),
            version: 3,
            pretty_version: "1.2".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_properties() {
        let text = "# comment\nname = Foo \n\nurl=http://x.example/a=b\nbroken line\nname=Bar";
        let props = parse_properties(text.lines());

        assert_eq!(props.get("name").map(String::as_str), Some("Bar"));
        assert_eq!(props.get("url").map(String::as_str), Some("http://x.example/a=b"));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_render_descriptor_uses_fixed_key_order() {
        let rendered = render_descriptor(&sample_info());
        let keys: Vec<&str> = rendered
            .lines()
            .map(|l| l.split_once('=').unwrap().0)
            .collect();

        assert_eq!(keys, DESCRIPTOR_KEYS);
        assert!(rendered.contains("paragraph=Loud noise\n"));
        assert!(rendered.contains("version=3\n"));
    }

    #[test]
    fn test_rendered_descriptor_parses_back() {
        let info = sample_info();
        let props = parse_properties(render_descriptor(&info).lines());
        let parsed = ContributionInfo::from_properties(&props, "fallback");

        assert_eq!(parsed.name, info.name);
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.pretty_version, "1.2");
    }

    #[test]
    fn test_render_descriptor_keeps_package_keys_after_canonical_block() {
        let info = ContributionInfo {
            imports: vec!["foo".into(), "foo.extra".into()],
            min_revision: 228,
            ..sample_info()
        };
        let rendered = render_descriptor(&info);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), DESCRIPTOR_KEYS.len() + 2);
        assert_eq!(lines[8], "imports=foo.*,foo.extra.*");
        assert_eq!(lines[9], "minRevision=228");

        let parsed = ContributionInfo::from_properties(&parse_properties(rendered.lines()), "x");
        assert_eq!(parsed.imports, info.imports);
        assert_eq!(parsed.min_revision, 228);
    }

    #[test]
    fn test_write_descriptor_goes_through_runtime() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/sketchbook/libraries/Foo/library.properties");
        let expected = render_descriptor(&sample_info()).into_bytes();

        runtime
            .expect_write()
            .with(eq(path.clone()), eq(expected))
            .times(1)
            .returning(|_, _| Ok(()));

        write_descriptor(&runtime, &path, &sample_info()).unwrap();
    }

    #[test]
    fn test_write_descriptor_failure_is_reported() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_write()
            .returning(|_, _| Err(anyhow::anyhow!("read-only filesystem")));

        let result = write_descriptor(&runtime, Path::new("/ro/library.properties"), &sample_info());
        assert!(result.is_err());
    }
}
