pub mod regex_profile;

pub use regex_profile::{ProfileParams, RegexProfile};

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::log::types::FileName;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid pattern '{pattern}' in profile {profile}: {source}")]
    InvalidPattern {
        profile: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid parameters for profile {profile}: {reason}")]
    InvalidParams { profile: String, reason: String },

    #[error("Unknown profile '{name}' (known profiles: {known})")]
    Unknown { name: String, known: String },
}

/// Raw fields of a numstat line, before the counts are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFields<'a> {
    pub added: &'a str,
    pub removed: &'a str,
    pub path: &'a str,
}

/// The paths named by a `diff --git a/<old> b/<new>` line.
///
/// Either side is `None` when the line could not be split unambiguously.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPaths {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// An `index <old>..<new> [mode]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLine {
    pub mode: Option<String>,
}

/// A preimage (`---`) or postimage (`+++`) filename line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNameLine {
    Old(FileName),
    New(FileName),
}

/// The location tuple and context name of a `@@ ... @@` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_len: u32,
    pub new_start: u32,
    pub new_len: u32,
    pub function: Option<String>,
}

/// The line-matching rules for one source repository's log output.
///
/// A profile is chosen once before a run and shared read-only by every
/// stage, including the parallel segmentation workers.
pub trait PatternProfile: Send + Sync + std::fmt::Debug {
    /// Name the profile is registered under (e.g. "go-ethereum")
    fn name(&self) -> &str;

    /// Token separating the fields of a commit header line.
    fn delimiter(&self) -> &str;

    fn is_commit(&self, line: &str) -> bool;

    fn match_stat<'a>(&self, line: &'a str) -> Option<StatFields<'a>>;

    /// A file header line, with the paths it names.
    fn match_diff_start(&self, line: &str) -> Option<DiffPaths>;

    fn match_index(&self, line: &str) -> Option<IndexLine>;

    fn match_filename(&self, line: &str) -> Option<FileNameLine>;

    fn match_hunk_header(&self, line: &str) -> Option<HunkHeader>;

    /// Context, added, removed or "no newline" marker line.
    fn is_raw_diff_line(&self, line: &str) -> bool;
}

/// Lookup from repository identifier to profile.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<dyn PatternProfile>>,
}

impl ProfileRegistry {
    /// A registry holding the built-in `go-ethereum` and `js-ipfs` profiles.
    pub fn with_builtins() -> Result<Self, ProfileError> {
        let mut registry = Self::default();
        for (name, params) in regex_profile::builtin_params() {
            registry.register(Arc::new(RegexProfile::compile(name, &params)?));
        }
        Ok(registry)
    }

    /// Add a profile, replacing any profile already registered under its name.
    pub fn register(&mut self, profile: Arc<dyn PatternProfile>) {
        debug!(profile = profile.name(), "registering pattern profile");
        self.profiles.insert(profile.name().to_string(), profile);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn PatternProfile>, ProfileError> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ProfileError::Unknown {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ProfileRegistry::with_builtins().unwrap();
        assert_eq!(registry.names(), vec!["go-ethereum", "js-ipfs"]);
        assert_eq!(registry.get("js-ipfs").unwrap().name(), "js-ipfs");
    }

    #[test]
    fn test_unknown_profile_lists_known_names() {
        let registry = ProfileRegistry::with_builtins().unwrap();
        let err = registry.get("linux").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("linux"));
        assert!(message.contains("go-ethereum, js-ipfs"));
    }

    #[test]
    fn test_register_custom_profile() {
        let mut registry = ProfileRegistry::with_builtins().unwrap();
        let params = ProfileParams {
            hash_len: 64,
            abbrev_len: 12,
            ext_len: 4,
            delimiter: "|||".to_string(),
        };
        registry.register(Arc::new(RegexProfile::compile("sha256-repo", &params).unwrap()));
        let profile = registry.get("sha256-repo").unwrap();
        assert_eq!(profile.delimiter(), "|||");
        assert_eq!(registry.names().len(), 3);
    }
}
