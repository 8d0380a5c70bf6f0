//! Engine configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What `rem_part` does when hom values still reference the removed part.
///
/// The policy is fixed per instance at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Clear every hom value that references the part, then remove it.
    #[default]
    Cascade,
    /// Refuse the removal with `AcsetError::StillReferenced` while another
    /// part's hom value points at it. A self-reference does not block.
    Reject,
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeletionPolicy::Cascade => "cascade",
            DeletionPolicy::Reject => "reject",
        })
    }
}

impl FromStr for DeletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(DeletionPolicy::Cascade),
            "reject" => Ok(DeletionPolicy::Reject),
            other => Err(format!(
                "unknown deletion policy `{other}` (expected cascade or reject)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcsetConfig {
    #[serde(default)]
    pub deletion: DeletionPolicy,
    /// Run a full integrity scan after every mutation. Off by default; the
    /// check is a `debug_assert!`, so it only fires in debug builds.
    #[serde(default)]
    pub verify_after_mutation: bool,
}

impl Default for AcsetConfig {
    fn default() -> Self {
        Self {
            deletion: DeletionPolicy::default(),
            verify_after_mutation: false,
        }
    }
}

impl AcsetConfig {
    pub fn with_deletion(mut self, deletion: DeletionPolicy) -> Self {
        self.deletion = deletion;
        self
    }

    pub fn with_verification(mut self, verify_after_mutation: bool) -> Self {
        self.verify_after_mutation = verify_after_mutation;
        self
    }
}
