use crate::types::{Release, VersionRecord};
use anyhow::{Context, Result};
use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Last installed release per program, persisted as JSON.
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    records: BTreeMap<String, VersionRecord>,
}

impl VersionStore {
    pub fn load(path: &Path) -> Result<Self> {
        let records: BTreeMap<String, VersionRecord> = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Could not read version file at {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Could not parse version file {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        tracing::debug!("Loaded {} version record(s) from {}", records.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn get_version(&self, program: &str) -> Option<&str> {
        self.records.get(program).map(|r| r.version.as_str())
    }

    pub fn get(&self, program: &str) -> Option<&VersionRecord> {
        self.records.get(program)
    }

    pub fn record(&mut self, program: &str, release: &Release) {
        self.records.insert(
            program.to_string(),
            VersionRecord {
                version: release.tag_name.clone(),
                installation_date: Local::now().naive_local(),
                release_date: release.published_at.clone(),
                source_url: release.html_url.clone(),
            },
        );
    }

    /// Writes through a sibling temp file so a crash never truncates the
    /// existing records.
    pub fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid version file path"))?;
        fs::create_dir_all(dir)?;

        let content = serde_json::to_string_pretty(&self.records)?;
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(content.as_bytes())?;
        staged
            .persist(&self.path)
            .with_context(|| format!("Could not write version file {}", self.path.display()))?;
        Ok(())
    }
}
