//! GitHub API interaction module
//!
//! Fetches the latest published release of a repository.

use crate::types::Release;
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use std::error::Error;
use std::fmt;

pub const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug)]
pub enum GitHubError {
    ReleaseNotFound { repo: String },
    RequestFailed { repo: String, status: StatusCode },
}

impl fmt::Display for GitHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitHubError::ReleaseNotFound { repo } => {
                write!(f, "No releases found for {}", repo)
            }
            GitHubError::RequestFailed { repo, status } => {
                write!(f, "Failed to get release info for {}: {}", repo, status)
            }
        }
    }
}

impl Error for GitHubError {}

/// Build GitHub API URL for the latest release of `owner/repo`
pub fn build_latest_release_url(repo: &str) -> String {
    format!("{}/repos/{}/releases/latest", GITHUB_API, repo)
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
}

impl GitHubClient {
    /// Sends `GITHUB_TOKEN` as authorization when it is set.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("binmgr/{}", env!("CARGO_PKG_VERSION")))?,
        );
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            let mut value = HeaderValue::from_str(&format!("token {}", token))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            tracing::debug!("Using GITHUB_TOKEN");
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    /// Shared HTTP client, also used for asset downloads.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn latest_release(&self, repo: &str) -> Result<Release> {
        let url = build_latest_release_url(repo);
        tracing::debug!("Fetching GitHub release info from: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                return Err(GitHubError::ReleaseNotFound {
                    repo: repo.to_string(),
                }
                .into());
            }
            return Err(GitHubError::RequestFailed {
                repo: repo.to_string(),
                status,
            }
            .into());
        }

        let release: Release = response.json().await?;
        Ok(release)
    }
}
