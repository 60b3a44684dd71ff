//! Per-program update loop: release lookup, asset choice, download,
//! extraction, binary selection, install and version bookkeeping.

use crate::compat::AssetFilter;
use crate::config::Config;
use crate::download::download_file;
use crate::error::ResolveError;
use crate::extract::extract;
use crate::github::GitHubClient;
use crate::install::install_binary;
use crate::select::select_binary;
use crate::types::{ArchiveKind, Release};
use crate::versions::VersionStore;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Updated { version: String, path: PathBuf },
    UpToDate { version: String },
}

#[derive(Debug)]
pub struct Failure {
    pub program: String,
    pub error: anyhow::Error,
}

pub struct Updater {
    github: GitHubClient,
    filter: AssetFilter,
    versions: VersionStore,
    bin_dir: PathBuf,
    temp_dir: PathBuf,
    show_progress: bool,
}

impl Updater {
    pub fn new(
        config: &Config,
        github: GitHubClient,
        filter: AssetFilter,
        show_progress: bool,
    ) -> Result<Self> {
        Ok(Self {
            github,
            filter,
            versions: VersionStore::load(&config.version_file)?,
            bin_dir: config.bin_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            show_progress,
        })
    }

    /// Processes every program in order; failures are collected, not fatal.
    pub async fn run(&mut self, programs: &IndexMap<String, String>) -> Vec<Failure> {
        let mut failures = Vec::new();
        for (program, repo) in programs {
            if let Err(error) = self.process_program(program, repo).await {
                tracing::error!(program = %program, "Failed to process: {:#}", error);
                failures.push(Failure {
                    program: program.clone(),
                    error,
                });
            }
        }
        failures
    }

    pub async fn process_program(&mut self, program: &str, repo: &str) -> Result<Outcome> {
        let span = tracing::info_span!("program", name = %program);
        self.process_inner(program, repo).instrument(span).await
    }

    async fn process_inner(&mut self, program: &str, repo: &str) -> Result<Outcome> {
        tracing::info!("Processing {} from {}", program, repo);

        let release = self
            .github
            .latest_release(repo)
            .await
            .with_context(|| format!("Could not get latest release of {}", repo))?;
        tracing::info!("Latest version: {}", release.tag_name);
        tracing::trace!(
            notes = release.body.as_deref().unwrap_or_default(),
            "Release notes"
        );

        self.apply_release(program, release).await
    }

    fn is_current(&self, program: &str, release: &Release) -> bool {
        self.versions.get_version(program) == Some(release.tag_name.as_str())
    }

    /// Brings `program` to `release` unless it is already installed.
    async fn apply_release(&mut self, program: &str, release: Release) -> Result<Outcome> {
        if self.is_current(program, &release) {
            tracing::info!("Already at latest version {}", release.tag_name);
            return Ok(Outcome::UpToDate {
                version: release.tag_name,
            });
        }

        let (asset, kind) = match self.filter.resolve(&release, program) {
            Ok(found) => found,
            Err(ResolveError::NoCompatibleAsset { tag, rejected }) => {
                for rejection in &rejected {
                    tracing::warn!(asset = %rejection.asset, reason = %rejection.reason, "Rejected asset");
                }
                return Err(ResolveError::NoCompatibleAsset { tag, rejected }.into());
            }
            Err(e) => return Err(e.into()),
        };

        fs::create_dir_all(&self.temp_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", program))
            .tempdir_in(&self.temp_dir)
            .with_context(|| format!("Could not create scratch directory in {}", self.temp_dir.display()))?;

        let archive_path = scratch.path().join(archive_file_name(&asset.name));
        tracing::info!("Downloading from: {}", asset.download_url);
        download_file(
            self.github.http(),
            &asset.download_url,
            &archive_path,
            self.show_progress,
        )
        .await?;

        let installed = self.install_from_archive(&archive_path, kind, program, scratch.path())?;
        self.record(program, &release)?;

        tracing::info!("Successfully updated to version {}", release.tag_name);
        Ok(Outcome::Updated {
            version: release.tag_name,
            path: installed,
        })
    }

    /// Extracts into a directory under `scratch` named after the archive stem,
    /// picks the binary and installs it. Nothing is installed when any step
    /// fails.
    pub fn install_from_archive(
        &self,
        archive_path: &Path,
        kind: ArchiveKind,
        program: &str,
        scratch: &Path,
    ) -> Result<PathBuf> {
        // top-level members get this directory as parent, e.g. bottom_x86_64.tar/btm
        let extract_dir = scratch.join(extract_dir_name(archive_path));
        let entries = extract(archive_path, kind, &extract_dir)?;

        let binary = select_binary(&entries, program).ok_or_else(|| ResolveError::NoBinaryFound {
            program: program.to_string(),
        })?;
        tracing::info!(path = %binary.display(), "Selected binary");

        install_binary(&binary, &self.bin_dir, program)
    }

    fn record(&mut self, program: &str, release: &Release) -> Result<()> {
        self.versions.record(program, release);
        self.versions.save()
    }
}

fn extract_dir_name(archive_path: &Path) -> String {
    archive_path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string())
}

/// Asset names come from the network; keep only the final path segment.
fn archive_file_name(asset_name: &str) -> String {
    Path::new(asset_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "asset".to_string())
}
