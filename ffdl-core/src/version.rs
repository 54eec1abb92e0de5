//! Numeric, dot-separated version numbers as published by the version index.
//!
//! Versions such as `6.1` or `4.4.1` are compared component by component as
//! integers, so `6.10` sorts after `6.9`. Missing trailing components count as
//! zero: `6.1` and `6.1.0` are equal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a version string was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version string is empty")]
    Empty,
    #[error("invalid version component '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },
}

/// A parsed tool version. Keeps the original text for display and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolVersion {
    raw: String,
    components: Vec<u64>,
}

impl ToolVersion {
    /// Parses a version string like `"6.1"`.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let components = raw
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionParseError::InvalidComponent {
                        input: raw.to_string(),
                        component: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    /// The version exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric components, most significant first.
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ToolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ToolVersion {}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ToolVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ToolVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ToolVersion> for String {
    fn from(version: ToolVersion) -> Self {
        version.raw
    }
}
