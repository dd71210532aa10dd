//! Resource lookup
//!
//! Resolves logical resource names (e.g. `"applets/skin/images/bg.png"`)
//! against a list of directory prefixes.

use std::path::{Path, PathBuf};

/// Ordered list of prefixes searched by [`SearchPath::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    prefixes: Vec<String>,
}

impl SearchPath {
    /// Create an empty search path (only the literal path is tried)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `;`-separated prefix list
    ///
    /// Prefixes are concatenated verbatim with the logical path, so they
    /// normally end in a path separator. Empty segments are skipped.
    pub fn parse(list: &str) -> Self {
        Self {
            prefixes: list
                .split(';')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Build a search path from a scripting-runtime package path
    ///
    /// Each entry of a package path is a template such as `lib/?.lua` or
    /// `share/?/init.lua`. The template tail starting at `?` is dropped and
    /// runs of separators collapse to one, so
    /// `"lib/?.lua;;share/?/init.lua"` yields the prefixes `lib/` and
    /// `share/`.
    pub fn from_package_path(package_path: &str) -> Self {
        let mut out = String::with_capacity(package_path.len());
        let mut chars = package_path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '?' => {
                    while chars.next_if(|&c| c != ';').is_some() {}
                }
                ';' => {
                    out.push(';');
                    while chars.next_if_eq(&';').is_some() {}
                }
                other => out.push(other),
            }
        }

        Self::parse(&out)
    }

    /// Append a prefix
    pub fn push(&mut self, prefix: impl Into<String>) {
        self.prefixes.push(prefix.into());
    }

    /// Configured prefixes, in search order
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Find a readable file for `logical`
    ///
    /// The path is tried as given first, then appended to each prefix in
    /// order. The first existing regular file wins.
    pub fn find(&self, logical: impl AsRef<Path>) -> Option<PathBuf> {
        let logical = logical.as_ref();

        if logical.is_file() {
            return Some(logical.to_path_buf());
        }

        let tail = logical.to_string_lossy();
        self.prefixes
            .iter()
            .map(|prefix| native_separators(&format!("{prefix}{tail}")))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(windows)]
fn native_separators(path: &str) -> PathBuf {
    PathBuf::from(path.replace('/', "\\"))
}

#[cfg(not(windows))]
fn native_separators(path: &str) -> PathBuf {
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_skips_empty_segments() {
        let sp = SearchPath::parse("a/;;b/;");
        assert_eq!(sp.prefixes(), &["a/".to_string(), "b/".to_string()]);
    }

    #[test]
    fn test_from_package_path() {
        let sp = SearchPath::from_package_path("lib/?.lua;;share/?/init.lua;./?.lua");
        assert_eq!(
            sp.prefixes(),
            &["lib/".to_string(), "share/".to_string(), "./".to_string()]
        );
    }

    #[test]
    fn test_find_literal_then_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let skin = dir.path().join("skin");
        fs::create_dir_all(&skin).unwrap();
        fs::write(skin.join("bg.png"), b"x").unwrap();

        let mut sp = SearchPath::new();
        sp.push(format!("{}/", dir.path().join("missing").display()));
        sp.push(format!("{}/", skin.display()));

        assert_eq!(sp.find("bg.png"), Some(skin.join("bg.png")));

        let literal = skin.join("bg.png");
        assert_eq!(SearchPath::new().find(&literal), Some(literal.clone()));
        assert_eq!(sp.find("nope.png"), None);
    }

    #[test]
    fn test_directories_do_not_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        let sp = SearchPath::parse(&format!("{}/", dir.path().display()));
        assert_eq!(sp.find("images"), None);
    }
}
