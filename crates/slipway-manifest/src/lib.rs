//! Cargo manifest reading and artifact naming for slipway.
//!
//! This crate loads a package manifest, extracts the name and semantic
//! version, and derives the release tag and the platform-specific file
//! name of the built artifact.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use slipway_manifest::Manifest;
//!
//! let manifest = Manifest::load(Path::new("Cargo.toml")).expect("load manifest");
//! assert!(manifest.release_tag().starts_with('v'));
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use slipway_target::{is_apple_triple, is_windows_triple};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "Cargo.toml";

/// Package metadata read from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Package name
    pub name: String,
    /// Semantic version string
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    package: RawPackage,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,
}

impl Manifest {
    /// Load a manifest from a file path.
    ///
    /// Read or parse failure is fatal; no partial manifest is tolerated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Parse manifest contents.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)?;
        Ok(Self {
            name: raw.package.name,
            version: raw.package.version,
        })
    }

    /// Release tag derived from the version, e.g. `v1.2.3`.
    pub fn release_tag(&self) -> String {
        format!("v{}", self.version)
    }

    /// File name of the built artifact for this package on a target.
    pub fn artifact_file_name(&self, kind: ArtifactKind, target: &str) -> String {
        artifact_file_name(&self.name, kind, target)
    }
}

/// What kind of artifact the build produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactKind {
    /// An executable binary
    #[default]
    Binary,
    /// A `cdylib` dynamic library
    DynamicLibrary,
}

impl std::str::FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bin" | "binary" => Ok(ArtifactKind::Binary),
            "cdylib" | "dylib" | "lib" => Ok(ArtifactKind::DynamicLibrary),
            other => Err(anyhow::anyhow!("unknown artifact kind: {other}")),
        }
    }
}

/// Compute the platform-specific artifact file name.
///
/// Binaries keep the package name as-is, with `.exe` on Windows targets.
/// Dynamic libraries use the crate name (hyphens become underscores) with
/// the platform's prefix and suffix: `lib*.so`, `lib*.dylib`, or `*.dll`.
pub fn artifact_file_name(package: &str, kind: ArtifactKind, target: &str) -> String {
    match kind {
        ArtifactKind::Binary => {
            if is_windows_triple(target) {
                format!("{package}.exe")
            } else {
                package.to_string()
            }
        }
        ArtifactKind::DynamicLibrary => {
            let stem = package.replace('-', "_");
            if is_windows_triple(target) {
                format!("{stem}.dll")
            } else if is_apple_triple(target) {
                format!("lib{stem}.dylib")
            } else {
                format!("lib{stem}.so")
            }
        }
    }
}
