//! The run engine.
//!
//! One run is the linear sequence resolve target → build → read manifest →
//! (publish → upload, when enabled). Each step returns `Result`; the first
//! failure short-circuits the rest of the run. There is no rollback: a
//! release created before a failed upload is left in place as a draft.

use std::env;
use std::path::PathBuf;

use slipway_cargo as cargo;
use slipway_github::ReleaseClient;
use slipway_manifest::Manifest;
use slipway_target::{host_triple, resolve_target};
use thiserror::Error;

use crate::config::RunConfig;

/// Progress sink for a run.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Build succeeded; publishing was not requested
    Compiled,
    /// Build succeeded and the artifact was attached to a draft release
    CompiledAndPublished,
}

impl RunOutcome {
    /// Human-readable success message for the CI output.
    pub fn message(&self) -> &'static str {
        match self {
            RunOutcome::Compiled => "Successfully compiled Rust code.",
            RunOutcome::CompiledAndPublished => {
                "Successfully compiled and drafted your Rust code."
            }
        }
    }
}

/// Why a run failed.
///
/// Every failure is terminal; no category is retried.
#[derive(Debug, Error)]
pub enum RunError {
    /// Bad or missing configuration (unsupported OS, missing credential)
    #[error("configuration error: {0}")]
    Config(String),
    /// Manifest unreadable or unparsable
    #[error("manifest error: {0:#}")]
    Manifest(anyhow::Error),
    /// The build tool failed or exited non-zero
    #[error("build failed: {0:#}")]
    Build(anyhow::Error),
    /// Release creation or asset upload failed
    #[error("publish failed: {0:#}")]
    Publish(anyhow::Error),
}

/// Execute one run.
///
/// Publishing is gated on `cfg.publish_release`; when disabled the run
/// stops successfully right after the build. The token, repository, and
/// commit are each checked exactly once, after the build, before any
/// network call.
pub fn run(cfg: &RunConfig, reporter: &mut dyn Reporter) -> Result<RunOutcome, RunError> {
    let os = cfg
        .os_hint
        .clone()
        .unwrap_or_else(|| env::consts::OS.to_string());

    let target = resolve_target(cfg.target.as_deref(), &os, env::consts::ARCH)
        .map_err(|e| RunError::Config(format!("{e:#}")))?;
    reporter.info(&format!("resolved target triple: {target}"));

    let workspace_root = workspace_root(cfg);

    // Cross-compiling needs the std component for the target installed.
    if let Ok(host) = host_triple()
        && host != target
    {
        reporter.info(&format!("installing build target {target}..."));
        let installed = cargo::rustup_target_add(&target).map_err(RunError::Build)?;
        installed.ok().map_err(RunError::Build)?;
    }

    reporter.info(&format!("running cargo build --release --target {target}..."));
    let built = cargo::cargo_build(&workspace_root, &target).map_err(RunError::Build)?;
    built.ok().map_err(RunError::Build)?;

    let manifest = Manifest::load(&cfg.manifest_path).map_err(RunError::Manifest)?;

    if !cfg.publish_release {
        return Ok(RunOutcome::Compiled);
    }

    // Fail-fast credential gate, checked once, before any publish call.
    let token = cfg
        .github_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            RunError::Config("github-token is required when publish-release is enabled".to_string())
        })?;
    let repo = cfg.repository.clone().ok_or_else(|| {
        RunError::Config("repository (owner/repo) is required when publish-release is enabled".to_string())
    })?;
    let commit = cfg.commit.as_deref().filter(|c| !c.is_empty()).ok_or_else(|| {
        RunError::Config("target commit is required when publish-release is enabled".to_string())
    })?;

    let tag = manifest.release_tag();
    let artifact_path = cfg.artifact_path.clone().unwrap_or_else(|| {
        workspace_root
            .join("target")
            .join(&target)
            .join("release")
            .join(manifest.artifact_file_name(cfg.artifact_kind, &target))
    });
    let asset_name = artifact_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RunError::Config(format!(
                "artifact path has no file name: {}",
                artifact_path.display()
            ))
        })?;

    let client = ReleaseClient::new(&cfg.api_base, token).map_err(RunError::Publish)?;

    reporter.info(&format!("finding or creating release for tag {tag}..."));
    let release = client
        .get_or_create_release(&repo, &tag, commit, &tag, &cfg.release_body)
        .map_err(RunError::Publish)?;

    reporter.info(&format!("uploading {asset_name} to release {tag}..."));
    client
        .upload_asset(&release.upload_url, &artifact_path, &asset_name)
        .map_err(RunError::Publish)?;
    reporter.info(&format!("uploaded asset {asset_name}"));

    Ok(RunOutcome::CompiledAndPublished)
}

fn workspace_root(cfg: &RunConfig) -> PathBuf {
    match cfg.manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use serial_test::serial;
    use tiny_http::{Header, Response, Server, StatusCode};

    use super::*;
    use crate::config::RunConfig;

    #[derive(Default)]
    struct CollectingReporter {
        infos: Vec<String>,
        warns: Vec<String>,
        errors: Vec<String>,
    }

    impl Reporter for CollectingReporter {
        fn info(&mut self, msg: &str) {
            self.infos.push(msg.to_string());
        }

        fn warn(&mut self, msg: &str) {
            self.warns.push(msg.to_string());
        }

        fn error(&mut self, msg: &str) {
            self.errors.push(msg.to_string());
        }
    }

    #[cfg(windows)]
    fn fake_tool_path(bin_dir: &Path, name: &str) -> PathBuf {
        bin_dir.join(format!("{name}.cmd"))
    }

    #[cfg(not(windows))]
    fn fake_tool_path(bin_dir: &Path, name: &str) -> PathBuf {
        bin_dir.join(name)
    }

    fn write_fake_tool(bin_dir: &Path, name: &str) -> PathBuf {
        let path = fake_tool_path(bin_dir, name);

        #[cfg(windows)]
        {
            fs::write(
                &path,
                "@echo off\r\nif not \"%SLIPWAY_ARGS_LOG%\"==\"\" echo %*>>\"%SLIPWAY_ARGS_LOG%\"\r\nexit /b 0\r\n",
            )
            .expect("write fake tool");
        }

        #[cfg(not(windows))]
        {
            use std::os::unix::fs::PermissionsExt;

            fs::write(
                &path,
                "#!/usr/bin/env sh\nif [ -n \"$SLIPWAY_ARGS_LOG\" ]; then\n  echo \"$*\" >>\"$SLIPWAY_ARGS_LOG\"\nfi\nexit 0\n",
            )
            .expect("write fake tool");
            let mut perms = fs::metadata(&path).expect("meta").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).expect("chmod");
        }

        path
    }

    /// Env var triples for pointing the engine at fake tools.
    fn fake_tool_vars(
        bin_dir: &Path,
        args_log: &Path,
    ) -> Vec<(&'static str, Option<String>)> {
        let cargo = write_fake_tool(bin_dir, "cargo");
        let rustup = write_fake_tool(bin_dir, "rustup");
        vec![
            (
                "SLIPWAY_CARGO_BIN",
                Some(cargo.to_str().expect("utf8").to_string()),
            ),
            (
                "SLIPWAY_RUSTUP_BIN",
                Some(rustup.to_str().expect("utf8").to_string()),
            ),
            (
                "SLIPWAY_ARGS_LOG",
                Some(args_log.to_str().expect("utf8").to_string()),
            ),
        ]
    }

    fn write_manifest(root: &Path, name: &str, version: &str) -> PathBuf {
        let path = root.join("Cargo.toml");
        fs::write(
            &path,
            format!("[package]\nname = \"{name}\"\nversion = \"{version}\"\n"),
        )
        .expect("write manifest");
        path
    }

    #[test]
    #[serial]
    fn unsupported_os_fails_before_any_build() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let cfg = RunConfig {
            os_hint: Some("freebsd".to_string()),
            manifest_path: write_manifest(td.path(), "demo", "0.1.0"),
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let err = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect_err("must fail");

        assert!(matches!(err, RunError::Config(_)));
        assert!(err.to_string().contains("unsupported operating system"));
        assert!(!args_log.exists(), "no build tool was invoked");
    }

    #[test]
    #[serial]
    fn explicit_target_override_wins() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let cfg = RunConfig {
            target: Some("riscv64gc-unknown-linux-gnu".to_string()),
            os_hint: Some("freebsd".to_string()),
            manifest_path: write_manifest(td.path(), "demo", "0.1.0"),
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let outcome = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect("run");

        assert_eq!(outcome, RunOutcome::Compiled);
        let logged = fs::read_to_string(&args_log).expect("args log");
        assert!(logged.contains("target add riscv64gc-unknown-linux-gnu"));
        assert!(logged.contains("build --release --target riscv64gc-unknown-linux-gnu"));
    }

    #[test]
    #[serial]
    fn non_publishing_run_stops_after_build() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let cfg = RunConfig {
            os_hint: Some("linux".to_string()),
            manifest_path: write_manifest(td.path(), "demo", "1.2.3"),
            // Unroutable: the run must not make any network call.
            api_base: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let outcome = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect("run");

        assert_eq!(outcome, RunOutcome::Compiled);
        assert_eq!(outcome.message(), "Successfully compiled Rust code.");
        let logged = fs::read_to_string(&args_log).expect("args log");
        assert!(logged.contains("build --release --target x86_64-unknown-linux-gnu"));
    }

    #[test]
    #[serial]
    fn missing_token_fails_before_any_publish_call() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let cfg = RunConfig {
            os_hint: Some("linux".to_string()),
            manifest_path: write_manifest(td.path(), "demo", "1.2.3"),
            publish_release: true,
            repository: Some("acme/demo".parse().expect("repo")),
            commit: Some("deadbeef".to_string()),
            api_base: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let err = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect_err("must fail");

        assert!(matches!(err, RunError::Config(_)));
        assert!(err.to_string().contains("github-token"));
    }

    #[test]
    #[serial]
    fn missing_repository_is_a_config_error() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let cfg = RunConfig {
            os_hint: Some("linux".to_string()),
            manifest_path: write_manifest(td.path(), "demo", "1.2.3"),
            publish_release: true,
            github_token: Some("token".to_string()),
            commit: Some("deadbeef".to_string()),
            api_base: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let err = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect_err("must fail");

        assert!(matches!(err, RunError::Config(_)));
        assert!(err.to_string().contains("repository"));
    }

    #[test]
    #[serial]
    fn unreadable_manifest_is_a_manifest_error() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let cfg = RunConfig {
            os_hint: Some("linux".to_string()),
            manifest_path: td.path().join("missing").join("Cargo.toml"),
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let err = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect_err("must fail");

        assert!(matches!(err, RunError::Manifest(_)));
    }

    #[test]
    #[serial]
    fn publishing_run_drafts_release_and_uploads_artifact() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let manifest_path = write_manifest(td.path(), "demo", "1.2.3");
        let artifact_dir = td
            .path()
            .join("target")
            .join("x86_64-unknown-linux-gnu")
            .join("release");
        fs::create_dir_all(&artifact_dir).expect("mkdir");
        fs::write(artifact_dir.join("demo"), b"\x7fELFfake").expect("write artifact");

        // Lookup misses, creation succeeds, upload returns 201. The upload
        // URL in the creation response points back at this server.
        let server = Server::http("127.0.0.1:0").expect("server");
        let base_url = format!("http://{}", server.server_addr());
        let body = format!(
            r#"{{"id":7,"tag_name":"v1.2.3","upload_url":"{base_url}/upload/7{{?name,label}}","draft":true,"prerelease":false}}"#
        );
        let seen = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
        let seen_thread = Arc::clone(&seen);
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                let req = server.recv().expect("request");
                let method = req.method().to_string();
                let path = req.url().to_string();
                seen_thread
                    .lock()
                    .expect("lock")
                    .push((method.clone(), path.clone()));

                let (status, response_body) = match (method.as_str(), path.as_str()) {
                    ("GET", "/repos/acme/demo/releases/tags/v1.2.3") => (404, "{}".to_string()),
                    ("POST", "/repos/acme/demo/releases") => (201, body.clone()),
                    ("POST", "/upload/7?name=demo") => (201, "{}".to_string()),
                    _ => (404, "{}".to_string()),
                };

                let resp = Response::from_string(response_body)
                    .with_status_code(StatusCode(status))
                    .with_header(
                        Header::from_bytes("Content-Type", "application/json").expect("header"),
                    );
                req.respond(resp).expect("respond");
            }
        });

        let cfg = RunConfig {
            os_hint: Some("linux".to_string()),
            manifest_path,
            publish_release: true,
            github_token: Some("token".to_string()),
            repository: Some("acme/demo".parse().expect("repo")),
            commit: Some("deadbeef".to_string()),
            api_base: base_url,
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let outcome = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect("run");

        assert_eq!(outcome, RunOutcome::CompiledAndPublished);
        assert_eq!(
            outcome.message(),
            "Successfully compiled and drafted your Rust code."
        );

        handle.join().expect("join server");
        let seen = seen.lock().expect("lock");
        // Tag derived from the manifest version drives the lookup path.
        assert_eq!(
            seen[0],
            (
                "GET".to_string(),
                "/repos/acme/demo/releases/tags/v1.2.3".to_string()
            )
        );
        assert_eq!(
            seen[1],
            ("POST".to_string(), "/repos/acme/demo/releases".to_string())
        );
        assert_eq!(
            seen[2],
            ("POST".to_string(), "/upload/7?name=demo".to_string())
        );
        assert!(reporter.infos.iter().any(|m| m.contains("uploaded asset demo")));
    }

    #[test]
    #[serial]
    fn rerun_against_existing_release_does_not_create_again() {
        let td = tempfile::tempdir().expect("tempdir");
        let args_log = td.path().join("args.log");
        let vars = fake_tool_vars(td.path(), &args_log);

        let manifest_path = write_manifest(td.path(), "demo", "1.2.3");
        let artifact_dir = td
            .path()
            .join("target")
            .join("x86_64-unknown-linux-gnu")
            .join("release");
        fs::create_dir_all(&artifact_dir).expect("mkdir");
        fs::write(artifact_dir.join("demo"), b"bytes").expect("write artifact");

        let server = Server::http("127.0.0.1:0").expect("server");
        let base_url = format!("http://{}", server.server_addr());
        let body = format!(
            r#"{{"id":7,"tag_name":"v1.2.3","upload_url":"{base_url}/upload/7{{?name,label}}","draft":true,"prerelease":false}}"#
        );
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen_thread = Arc::clone(&seen);
        let handle = thread::spawn(move || {
            for _ in 0..2 {
                let req = server.recv().expect("request");
                let key = format!("{} {}", req.method(), req.url());
                seen_thread.lock().expect("lock").push(key.clone());

                let (status, response_body) = match key.as_str() {
                    "GET /repos/acme/demo/releases/tags/v1.2.3" => (200, body.clone()),
                    "POST /upload/7?name=demo" => (201, "{}".to_string()),
                    _ => (404, "{}".to_string()),
                };

                let resp = Response::from_string(response_body)
                    .with_status_code(StatusCode(status))
                    .with_header(
                        Header::from_bytes("Content-Type", "application/json").expect("header"),
                    );
                req.respond(resp).expect("respond");
            }
        });

        let cfg = RunConfig {
            os_hint: Some("linux".to_string()),
            manifest_path,
            publish_release: true,
            github_token: Some("token".to_string()),
            repository: Some("acme/demo".parse().expect("repo")),
            commit: Some("deadbeef".to_string()),
            api_base: base_url,
            ..Default::default()
        };

        let mut reporter = CollectingReporter::default();
        let outcome = temp_env::with_vars(vars, || run(&cfg, &mut reporter)).expect("run");

        assert_eq!(outcome, RunOutcome::CompiledAndPublished);
        handle.join().expect("join server");
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2, "lookup hit, then upload; no creation");
        assert!(seen[0].starts_with("GET "));
    }
}
