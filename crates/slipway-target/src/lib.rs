//! Target triple resolution for slipway.
//!
//! This crate maps a declared or detected operating system to the target
//! triple handed to the build tool. An explicit target always wins over
//! detection.
//!
//! # Example
//!
//! ```
//! use slipway_target::resolve_target;
//!
//! let triple = resolve_target(None, "ubuntu-latest", "x86_64").expect("resolve");
//! assert_eq!(triple, "x86_64-unknown-linux-gnu");
//! ```

use std::env;

use anyhow::{Result, bail};

/// Target triple for x86-64 Linux (GNU libc).
pub const LINUX_X86_64: &str = "x86_64-unknown-linux-gnu";
/// Target triple for x86-64 Windows (MSVC).
pub const WINDOWS_X86_64: &str = "x86_64-pc-windows-msvc";
/// Target triple for x86-64 macOS.
pub const MACOS_X86_64: &str = "x86_64-apple-darwin";
/// Target triple for Apple Silicon macOS.
pub const MACOS_AARCH64: &str = "aarch64-apple-darwin";

/// Resolve the target triple for a run.
///
/// A non-empty `explicit` target is returned unchanged. Otherwise the OS
/// identifier is mapped to a triple; both CI runner labels
/// (`ubuntu-latest`, `windows-2022`, `macos-14`) and runtime identifiers
/// (`linux`, `win32`, `darwin`) are accepted. macOS resolves by the
/// reported architecture.
///
/// An unrecognized OS is a configuration error and fails the run before
/// any build attempt.
pub fn resolve_target(explicit: Option<&str>, os: &str, arch: &str) -> Result<String> {
    if let Some(target) = explicit
        && !target.is_empty()
    {
        return Ok(target.to_string());
    }

    let os_lower = os.to_ascii_lowercase();

    if os_lower.contains("ubuntu") || os_lower.contains("linux") {
        Ok(LINUX_X86_64.to_string())
    } else if os_lower.contains("windows") || os_lower.contains("win32") {
        Ok(WINDOWS_X86_64.to_string())
    } else if os_lower.contains("macos") || os_lower.contains("darwin") {
        if arch == "aarch64" {
            Ok(MACOS_AARCH64.to_string())
        } else {
            Ok(MACOS_X86_64.to_string())
        }
    } else {
        bail!("unsupported operating system: {os}");
    }
}

/// Resolve the triple for the machine slipway itself is running on.
pub fn host_triple() -> Result<String> {
    resolve_target(None, env::consts::OS, env::consts::ARCH)
}

/// Extract the architecture component of a target triple.
pub fn triple_arch(triple: &str) -> &str {
    triple.split('-').next().unwrap_or(triple)
}

/// Whether a target triple names a Windows platform.
pub fn is_windows_triple(triple: &str) -> bool {
    triple.contains("windows")
}

/// Whether a target triple names an Apple platform.
pub fn is_apple_triple(triple: &str) -> bool {
    triple.contains("apple")
}
