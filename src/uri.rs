//! File URI - the location half of every entity identity
//!
//! Format: `file:///<absolute path>`
//!
//! Every node carries one of these. Nothing is built on top of a path that does
//! not match the scheme, since a bad prefix would leak into every descendant id.

use crate::{Error, Result};
use lsp_types::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Required scheme prefix for every entity path
pub const FILE_SCHEME: &str = "file://";

/// An absolute `file://` location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileUri(String);

impl FileUri {
    /// Parse a URI string, rejecting anything outside the file scheme
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| Error::InvalidPath(uri.to_string()))?;
        if rest.is_empty() {
            return Err(Error::InvalidPath(uri.to_string()));
        }
        Ok(Self(uri.to_string()))
    }

    /// Build a URI from a filesystem path. Relative paths are rejected.
    pub fn from_path(path: &Path) -> Result<Self> {
        let url = Url::from_file_path(path)
            .map_err(|_| Error::InvalidPath(path.display().to_string()))?;
        Self::parse(url.as_str())
    }

    /// Convert from a URL reported by a language server
    pub fn from_url(url: &Url) -> Result<Self> {
        Self::parse(url.as_str())
    }

    /// The URL form used on the LSP wire
    pub fn to_url(&self) -> Result<Url> {
        Url::parse(&self.0).map_err(|_| Error::InvalidPath(self.0.clone()))
    }

    /// Filesystem path, if the URI is well formed
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.to_url().ok()?.to_file_path().ok()
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Lower-cased extension without the dot, empty when there is none
    pub fn extension(&self) -> String {
        match self.file_name().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => String::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FileUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FileUri {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileUri::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_other_schemes() {
        assert!(FileUri::parse("src/main.py").is_err());
        assert!(FileUri::parse("http://example.com/a.py").is_err());
        assert!(FileUri::parse("/abs/a.py").is_err());
        assert!(FileUri::parse("file://").is_err());
    }

    #[test]
    fn test_extension_and_name() {
        let uri = FileUri::parse("file:///repo/src/Auth.PY").unwrap();
        assert_eq!(uri.file_name(), "Auth.PY");
        assert_eq!(uri.extension(), "py");

        let dotfile = FileUri::parse("file:///repo/.bashrc").unwrap();
        assert_eq!(dotfile.extension(), "");

        let bare = FileUri::parse("file:///repo/Makefile").unwrap();
        assert_eq!(bare.extension(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path() {
        let uri = FileUri::from_path(Path::new("/repo/src/main.rs")).unwrap();
        assert_eq!(uri.as_str(), "file:///repo/src/main.rs");
        assert_eq!(uri.to_file_path().unwrap(), PathBuf::from("/repo/src/main.rs"));

        assert!(FileUri::from_path(Path::new("relative/main.rs")).is_err());
    }
}
