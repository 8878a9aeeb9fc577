//! GitHub release API client for slipway.
//!
//! This crate finds or creates a draft release for a tag and uploads the
//! built artifact to its upload endpoint.
//!
//! # Example
//!
//! ```ignore
//! use slipway_github::{ReleaseClient, Repository};
//!
//! let repo: Repository = "acme/widget".parse().expect("repo");
//! let client = ReleaseClient::new(slipway_github::GITHUB_API, "token").expect("client");
//!
//! let release = client
//!     .get_or_create_release(&repo, "v1.2.3", "deadbeef", "v1.2.3", "Release notes.")
//!     .expect("release");
//! client
//!     .upload_asset(&release.upload_url, std::path::Path::new("target/release/widget"), "widget")
//!     .expect("upload");
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default API endpoint for github.com.
pub const GITHUB_API: &str = "https://api.github.com";

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for API requests.
pub const USER_AGENT: &str = concat!("slipway/", env!("CARGO_PKG_VERSION"));

/// A repository on the hosting platform, `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl FromStr for Repository {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => bail!("invalid repository (expected owner/repo): {s}"),
        }
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A release record on the hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Release id
    pub id: u64,
    /// Tag the release is attached to
    pub tag_name: String,
    /// Upload URL template for attaching assets
    pub upload_url: String,
    /// Whether the release is a draft
    pub draft: bool,
    /// Whether the release is marked prerelease
    pub prerelease: bool,
}

#[derive(Debug, Serialize)]
struct NewRelease<'a> {
    tag_name: &'a str,
    target_commitish: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

/// Blocking client for the releases API.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl ReleaseClient {
    /// Create a client against an API base URL.
    ///
    /// The base URL is overridable so tests can point the client at a
    /// local mock server.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up an existing release by tag.
    pub fn get_release_by_tag(&self, repo: &Repository, tag: &str) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{}",
            self.base_url, repo.owner, repo.repo, tag
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .context("failed to query release by tag")?;

        if !response.status().is_success() {
            bail!(
                "no release found for tag {tag}: status {}",
                response.status()
            );
        }

        response.json().context("failed to parse release response")
    }

    /// Create a new draft release.
    pub fn create_release(
        &self,
        repo: &Repository,
        tag: &str,
        commit: &str,
        name: &str,
        body: &str,
    ) -> Result<Release> {
        let url = format!("{}/repos/{}/{}/releases", self.base_url, repo.owner, repo.repo);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&NewRelease {
                tag_name: tag,
                target_commitish: commit,
                name,
                body,
                draft: true,
                prerelease: false,
            })
            .send()
            .context("failed to create release")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("failed to create release for tag {tag}: {status} - {body}");
        }

        response.json().context("failed to parse release response")
    }

    /// Find a release for `tag`, creating a draft release when the lookup
    /// fails.
    ///
    /// Rerunning against the same tag finds the existing release instead
    /// of creating a duplicate. Any lookup failure, including transport
    /// errors, falls through to creation; only a creation failure after a
    /// failed lookup is fatal.
    pub fn get_or_create_release(
        &self,
        repo: &Repository,
        tag: &str,
        commit: &str,
        name: &str,
        body: &str,
    ) -> Result<Release> {
        match self.get_release_by_tag(repo, tag) {
            Ok(release) => Ok(release),
            Err(_) => self.create_release(repo, tag, commit, name, body),
        }
    }

    /// Upload a local file as a release asset.
    ///
    /// The bytes are POSTed as `application/octet-stream` with an explicit
    /// `content-length`. Success is strictly HTTP 201; anything else fails
    /// with the status and response body.
    pub fn upload_asset(
        &self,
        upload_url: &str,
        asset_path: &Path,
        asset_name: &str,
    ) -> Result<()> {
        let asset_path = asset_path
            .canonicalize()
            .with_context(|| format!("asset not found: {}", asset_path.display()))?;
        let size = std::fs::metadata(&asset_path)
            .with_context(|| format!("failed to stat asset: {}", asset_path.display()))?
            .len();
        let bytes = std::fs::read(&asset_path)
            .with_context(|| format!("failed to read asset: {}", asset_path.display()))?;

        let url = upload_endpoint(upload_url, asset_name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("content-type", "application/octet-stream")
            .header("content-length", size.to_string())
            .body(bytes)
            .send()
            .context("failed to send asset upload request")?;

        let status = response.status();
        if status.as_u16() != 201 {
            let body = response.text().unwrap_or_default();
            bail!("failed to upload asset: {status} - {body}");
        }

        Ok(())
    }
}

/// Build the concrete upload endpoint for an asset.
///
/// The API returns the upload URL as a URI template ending in
/// `{?name,label}`; the template suffix is stripped and the asset name is
/// passed as a query parameter.
pub fn upload_endpoint(upload_url: &str, asset_name: &str) -> String {
    let base = match upload_url.find('{') {
        Some(idx) => &upload_url[..idx],
        None => upload_url,
    };
    format!("{base}?name={asset_name}")
}
