use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Archive container recognised from an asset file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Zip,
    Unknown,
}

impl ArchiveKind {
    /// Suffix test on the name as published; `.TAR.GZ` is not a tarball here.
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveKind::Tar
        } else if name.ends_with(".zip") {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Unknown
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Tar => write!(f, "tar"),
            ArchiveKind::Zip => write!(f, "zip"),
            ArchiveKind::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityVerdict {
    pub is_compatible: bool,
    pub reason: String,
}

impl CompatibilityVerdict {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            is_compatible: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            is_compatible: false,
            reason: reason.into(),
        }
    }
}

/// An asset that failed the compatibility filter, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub asset: String,
    pub reason: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.asset, self.reason)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: String,
    /// Local wall-clock time, ISO 8601 without offset.
    pub installation_date: NaiveDateTime,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_kind_from_suffix() {
        assert_eq!(ArchiveKind::from_name("rg-14.1.0-x86_64.tar.gz"), ArchiveKind::Tar);
        assert_eq!(ArchiveKind::from_name("fd-linux-amd64.tgz"), ArchiveKind::Tar);
        assert_eq!(ArchiveKind::from_name("bat_linux_amd64.zip"), ArchiveKind::Zip);
        assert_eq!(ArchiveKind::from_name("tool.zip.sha256"), ArchiveKind::Unknown);
        assert_eq!(ArchiveKind::from_name("TOOL-LINUX.TAR.GZ"), ArchiveKind::Unknown);
    }

    #[test]
    fn release_deserializes_github_payload() {
        let json = r#"{
            "tag_name": "v1.2.3",
            "html_url": "https://github.com/o/r/releases/tag/v1.2.3",
            "published_at": "2024-05-01T10:00:00Z",
            "body": "notes",
            "assets": [
                {"name": "r-linux-amd64.tar.gz", "browser_download_url": "https://example.com/a", "size": 10}
            ]
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag_name, "v1.2.3");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].download_url, "https://example.com/a");
        assert_eq!(release.published_at.as_deref(), Some("2024-05-01T10:00:00Z"));
    }
}
