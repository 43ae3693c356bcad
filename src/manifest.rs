use derive_more::Display;
use lazy_static::lazy_static;
use regex::Regex;
use semver::Version;
use std::io;
use std::path::Path;

/// File name of the build configuration read from every repository
pub const MANIFEST: &str = "Cargo.toml";

#[derive(Debug, Display)]
pub enum ManifestError {
    #[display(fmt = "Unable to read {}: {}", path, source)]
    Read { path: String, source: io::Error },
    #[display(fmt = "Can not get {} version from {}", dependency, origin)]
    MissingVersion { dependency: String, origin: String },
}

impl std::error::Error for ManifestError {}

pub type ManifestResult<T> = Result<T, ManifestError>;

lazy_static! {
    static ref TABLE_DECLARATION: Regex = Regex::new(
        r#"^\s*([A-Za-z0-9_-]+)\s*=\s*\{\s*version\s*=\s*"[^0-9"]*(\d+\.\d+\.\d+)[^"]*""#
    )
    .expect("table declaration pattern");
    static ref BARE_DECLARATION: Regex =
        Regex::new(r#"^\s*([A-Za-z0-9_-]+)\s*=\s*"[^0-9"]*(\d+\.\d+\.\d+)[^"]*""#)
            .expect("bare declaration pattern");
}

/// Ways a dependency version can be declared on a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationShape {
    /// `name = { version = "1.2.3", ... }`
    Table,
    /// `name = "1.2.3"`
    Bare,
}

impl DeclarationShape {
    /// Every shape in the order they are tried
    pub const ALL: [DeclarationShape; 2] = [DeclarationShape::Table, DeclarationShape::Bare];

    fn pattern(self) -> &'static Regex {
        match self {
            DeclarationShape::Table => &TABLE_DECLARATION,
            DeclarationShape::Bare => &BARE_DECLARATION,
        }
    }

    /// Returns the `major.minor.patch` part of the version declared for
    /// `name` on this line. Range operators before the version and
    /// qualifiers after it are dropped
    pub fn parse_line<'a>(self, line: &'a str, name: &str) -> Option<&'a str> {
        let captures = self.pattern().captures(line)?;
        if captures.get(1)?.as_str() != name {
            return None;
        }
        Some(captures.get(2)?.as_str())
    }
}

/// Finds the version declared for `name`. Shapes are tried in order
/// and the first matching line of a shape wins
pub fn find_version<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    DeclarationShape::ALL
        .iter()
        .find_map(|shape| text.lines().find_map(|line| shape.parse_line(line, name)))
}

/// Extracts the version declared for `name` as a semantic version.
/// `origin` names where the text came from for the error
pub fn extract_version(text: &str, name: &str, origin: &str) -> ManifestResult<Version> {
    find_version(text, name)
        .and_then(|version| Version::parse(version).ok())
        .ok_or_else(|| ManifestError::MissingVersion {
            dependency: name.to_string(),
            origin: origin.to_string(),
        })
}

/// Reads the manifest at `path` and extracts the version declared for `name`
pub async fn read_version(path: &Path, name: &str) -> ManifestResult<Version> {
    let origin = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ManifestError::Read {
            path: origin.clone(),
            source,
        })?;
    extract_version(&text, name, &origin)
}

#[cfg(test)]
mod test {
    use crate::manifest::{extract_version, find_version, read_version, DeclarationShape};
    use semver::Version;

    const DENO_MANIFEST: &str = r#"
[workspace.dependencies]
deno_ast_macros = "0.99.0"
deno_ast = { version = "0.34.1", features = ["transpiling"] }
deno_core = { version = "=0.264.0" }
deno_lint = "~0.56.0-beta"
serde = { version = "1.0", features = ["derive"] }
"#;

    #[test]
    fn table_declaration() {
        assert_eq!(find_version(DENO_MANIFEST, "deno_ast"), Some("0.34.1"));
        assert_eq!(find_version(DENO_MANIFEST, "deno_core"), Some("0.264.0"));
    }

    #[test]
    fn bare_declaration() {
        assert_eq!(find_version(DENO_MANIFEST, "deno_lint"), Some("0.56.0"));
        assert_eq!(find_version(DENO_MANIFEST, "deno_ast_macros"), Some("0.99.0"));
    }

    #[test]
    fn table_is_preferred_over_bare() {
        let text = "deno_ast = \"0.30.0\"\ndeno_ast = { version = \"0.34.1\" }\n";
        assert_eq!(find_version(text, "deno_ast"), Some("0.34.1"));
    }

    #[test]
    fn shapes_parse_single_lines() {
        let table = "  deno_ast = { version = \"^0.34.1\", default-features = false }";
        assert_eq!(DeclarationShape::Table.parse_line(table, "deno_ast"), Some("0.34.1"));
        assert_eq!(DeclarationShape::Bare.parse_line(table, "deno_ast"), None);
        assert_eq!(DeclarationShape::Table.parse_line(table, "deno"), None);

        let bare = "deno_ast = \"0.34.1\"";
        assert_eq!(DeclarationShape::Bare.parse_line(bare, "deno_ast"), Some("0.34.1"));
        assert_eq!(DeclarationShape::Table.parse_line(bare, "deno_ast"), None);
    }

    #[test]
    fn missing_or_partial_versions() {
        assert_eq!(find_version(DENO_MANIFEST, "deno_graph"), None);
        // Two component versions don't match the expected pattern
        assert_eq!(find_version(DENO_MANIFEST, "serde"), None);
        assert_eq!(find_version("deno_ast = { workspace = true }", "deno_ast"), None);

        let err = extract_version(DENO_MANIFEST, "serde", "deno/Cargo.toml").unwrap_err();
        assert_eq!(err.to_string(), "Can not get serde version from deno/Cargo.toml");
    }

    #[tokio::test]
    async fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cargo.toml");
        std::fs::write(&path, DENO_MANIFEST).unwrap();

        let version = read_version(&path, "deno_ast").await.unwrap();
        assert_eq!(version, Version::new(0, 34, 1));

        let missing = read_version(&dir.path().join("cli").join("Cargo.toml"), "deno_lint").await;
        assert!(missing.is_err());
    }
}
