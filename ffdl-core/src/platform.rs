//! Mapping from host facts to the version index's platform keys.
//!
//! The index publishes one entry per key (`windows-64`, `linux-arm64`,
//! `osx-64`, ...). Resolution never fails: an unknown OS/architecture pair
//! still produces a key, and the lookup in [`crate::links`] reports it as
//! unsupported.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Host Facts
// ============================================================================

/// Operating system and CPU facts the resolver depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// OS name in `std::env::consts::OS` spelling (`linux`, `macos`, `windows`).
    pub os: String,
    /// CPU architecture in `std::env::consts::ARCH` spelling (`x86_64`, `aarch64`).
    pub arch: String,
    /// Whether a 32-bit ARM host uses the hard-float ABI.
    pub hard_float: bool,
}

impl HostFacts {
    /// Facts about the running process.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            hard_float: cfg!(target_abi = "eabihf"),
        }
    }

    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            hard_float: false,
        }
    }

    pub fn with_hard_float(mut self, hard_float: bool) -> Self {
        self.hard_float = hard_float;
        self
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

// ============================================================================
// Platform Key
// ============================================================================

/// Identifier of an OS + architecture combination in the version index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformKey(String);

impl PlatformKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the platform key for the given host.
pub fn resolve(host: &HostFacts) -> PlatformKey {
    let key = match (host.os.as_str(), host.arch.as_str()) {
        ("windows", "x86") => "windows-32",
        ("windows", "x86_64" | "aarch64") => "windows-64",
        ("linux", "x86") => "linux-32",
        ("linux", "x86_64") => "linux-64",
        ("linux", "aarch64") => "linux-arm64",
        ("linux", "arm") if host.hard_float => "linux-armhf",
        ("linux", "arm") => "linux-armel",
        // Only Intel builds are published; Apple Silicon runs them under Rosetta.
        ("macos", _) => "osx-64",
        (os, arch) => return PlatformKey(format!("{}-{}", os, arch)),
    };
    PlatformKey::new(key)
}
