//! Core engine behind the slipway CLI.
//!
//! slipway compiles a Rust project for a resolved target triple and, when
//! publishing is enabled, drafts a release on the hosting platform and
//! attaches the built artifact to it. The run is a single linear sequence;
//! the first failure terminates it.
//!
//! The engine takes an explicit [`config::RunConfig`] and returns a typed
//! [`engine::RunOutcome`] or [`engine::RunError`], so the sequencing logic
//! is testable without touching process-global state.

pub mod config;
pub mod engine;

pub use config::{FileConfig, RunConfig, load_config};
pub use engine::{Reporter, RunError, RunOutcome, run};

pub use slipway_github::{GITHUB_API, Repository};
pub use slipway_manifest::ArtifactKind;
