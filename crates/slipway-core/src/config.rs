//! Run configuration and the `.slipway.toml` file layer.
//!
//! The engine never reads the environment itself; callers build a
//! [`RunConfig`] from their own inputs. A `.slipway.toml` next to the
//! project can fill in values the caller left at their defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use slipway_github::{GITHUB_API, Repository};
use slipway_manifest::{ArtifactKind, MANIFEST_FILE};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".slipway.toml";

/// Default release body text.
pub const DEFAULT_RELEASE_BODY: &str = "Description of the release.";

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Explicit target triple; empty/absent means auto-detect
    pub target: Option<String>,
    /// Explicit OS hint overriding runtime detection (CI runner label)
    pub os_hint: Option<String>,
    /// Path to the package manifest
    pub manifest_path: PathBuf,
    /// Whether to draft a release and upload the artifact after the build
    pub publish_release: bool,
    /// API token; required only when publishing
    pub github_token: Option<String>,
    /// Repository the release belongs to; required only when publishing
    pub repository: Option<Repository>,
    /// Commit the release tag points at; required only when publishing
    pub commit: Option<String>,
    /// Release API base URL
    pub api_base: String,
    /// Body text for a newly created release
    pub release_body: String,
    /// What kind of artifact the build produces
    pub artifact_kind: ArtifactKind,
    /// Full override for the artifact path; defaults to
    /// `target/<triple>/release/<artifact-file-name>`
    pub artifact_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: None,
            os_hint: None,
            manifest_path: PathBuf::from(MANIFEST_FILE),
            publish_release: false,
            github_token: None,
            repository: None,
            commit: None,
            api_base: GITHUB_API.to_string(),
            release_body: DEFAULT_RELEASE_BODY.to_string(),
            artifact_kind: ArtifactKind::default(),
            artifact_path: None,
        }
    }
}

/// Values read from a `.slipway.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Explicit target triple
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Path to the package manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
    /// Whether to publish a release after the build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_release: Option<bool>,
    /// Release settings
    #[serde(default)]
    pub release: ReleaseSection,
    /// Artifact settings
    #[serde(default)]
    pub artifact: ArtifactSection,
}

/// `[release]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseSection {
    /// Release API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Body text for a newly created release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// `[artifact]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactSection {
    /// Artifact kind: `bin` or `cdylib`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Full override for the artifact path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileConfig {
    /// Fill in `cfg` fields the caller left at their defaults.
    ///
    /// Caller-supplied values always take precedence over the file.
    pub fn apply_to(&self, cfg: &mut RunConfig) -> Result<()> {
        if cfg.target.is_none() {
            cfg.target = self.target.clone();
        }
        if cfg.manifest_path == Path::new(MANIFEST_FILE)
            && let Some(path) = &self.manifest_path
        {
            cfg.manifest_path = path.clone();
        }
        if let Some(publish) = self.publish_release {
            cfg.publish_release = cfg.publish_release || publish;
        }
        if cfg.api_base == GITHUB_API
            && let Some(api_base) = &self.release.api_base
        {
            cfg.api_base = api_base.clone();
        }
        if cfg.release_body == DEFAULT_RELEASE_BODY
            && let Some(body) = &self.release.body
        {
            cfg.release_body = body.clone();
        }
        if cfg.artifact_kind == ArtifactKind::default()
            && let Some(kind) = &self.artifact.kind
        {
            cfg.artifact_kind = kind.parse()?;
        }
        if cfg.artifact_path.is_none() {
            cfg.artifact_path = self.artifact.path.clone();
        }
        Ok(())
    }
}

/// Load a `.slipway.toml` from a directory; a missing file yields defaults.
pub fn load_config(dir: &Path) -> Result<FileConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    Ok(config)
}
