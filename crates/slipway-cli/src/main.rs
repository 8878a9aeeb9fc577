use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use slipway_core::{ArtifactKind, Reporter, Repository, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "slipway", version)]
#[command(about = "Compile a Rust project for a target platform and draft a release with the artifact")]
struct Cli {
    /// Explicit target triple; overrides OS detection when set.
    #[arg(long)]
    target: Option<String>,

    /// Operating system hint (CI runner label, e.g. "ubuntu-latest").
    /// Defaults to the runtime's reported OS.
    #[arg(long)]
    os: Option<String>,

    /// Path to the package Cargo.toml.
    #[arg(long, default_value = "Cargo.toml")]
    manifest_path: PathBuf,

    /// Draft a release and upload the built artifact after the build.
    #[arg(long)]
    publish_release: bool,

    /// API token; required only with --publish-release.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Repository the release belongs to, as owner/repo.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Commit the release tag should point at.
    #[arg(long, env = "GITHUB_SHA")]
    commit: Option<String>,

    /// Release API base URL.
    #[arg(long, default_value = slipway_core::GITHUB_API)]
    api_base: String,

    /// Body text for a newly created release.
    #[arg(long)]
    release_body: Option<String>,

    /// Artifact kind: bin or cdylib.
    #[arg(long)]
    artifact_kind: Option<String>,

    /// Full override for the built artifact path.
    #[arg(long)]
    artifact_path: Option<PathBuf>,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = RunConfig {
        target: cli.target,
        os_hint: cli.os,
        manifest_path: cli.manifest_path,
        publish_release: cli.publish_release,
        github_token: cli.github_token,
        repository: cli
            .repository
            .as_deref()
            .map(str::parse::<Repository>)
            .transpose()?,
        commit: cli.commit,
        api_base: cli.api_base,
        ..Default::default()
    };
    if let Some(body) = cli.release_body {
        cfg.release_body = body;
    }
    if let Some(kind) = cli.artifact_kind.as_deref() {
        cfg.artifact_kind = kind.parse::<ArtifactKind>()?;
    }
    cfg.artifact_path = cli.artifact_path;

    // Project-local config fills anything still at its default.
    let config_dir = cfg
        .manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = slipway_core::load_config(&config_dir)?;
    file.apply_to(&mut cfg)?;

    let mut reporter = CliReporter;
    let outcome = slipway_core::run(&cfg, &mut reporter)?;

    println!("{}", outcome.message());
    Ok(())
}
