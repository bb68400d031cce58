// crates/plan-gate-config/src/loader.rs
// ============================================================================
// Module: Policy Set Loader
// Description: Loads declarative rule files from a directory.
// Purpose: Build a validated, ordered PolicySet or fail fast naming the file.
// Dependencies: plan-gate-core, ron, serde, toml
// ============================================================================

//! ## Overview
//! A policy directory holds TOML or RON rule files, each declaring one or
//! more rules under a top-level `rules` list. Files are read in file-name
//! order so insertion order (and therefore report order) is stable across
//! hosts. Other files are ignored. Loading is sequential and stops at the
//! first problem; nothing is evaluated by the loader.
//! Security posture: rule files are untrusted and size-limited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use plan_gate_core::PolicySet;
use plan_gate_core::PolicySetError;
use plan_gate_core::RuleId;
use plan_gate_core::RuleSpec;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a single rule file in bytes.
pub const MAX_RULE_FILE_BYTES: usize = 1024 * 1024;
/// Maximum number of rule files in one directory.
pub const MAX_RULE_FILES: usize = 256;

// ============================================================================
// SECTION: Rule Files
// ============================================================================

/// Supported rule file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFileFormat {
    /// TOML rule file.
    Toml,
    /// RON rule file.
    Ron,
}

impl RuleFileFormat {
    /// Returns the lowercase label for the format.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Ron => "ron",
        }
    }

    /// Parses a format from a file extension.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "ron" => Some(Self::Ron),
            _ => None,
        }
    }

    /// Returns the format for a path, if it is a rule file.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }
}

impl fmt::Display for RuleFileFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// Contents of one rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    /// Rules declared by the file, in order.
    pub rules: Vec<RuleSpec>,
}

impl RuleFile {
    /// Parses rule file text in the given format.
    ///
    /// # Errors
    ///
    /// Returns the parser message when the text is not a rule file.
    pub fn parse(input: &str, format: RuleFileFormat) -> Result<Self, String> {
        match format {
            RuleFileFormat::Toml => toml::from_str(input).map_err(|err| err.to_string()),
            RuleFileFormat::Ron => ron::from_str(input).map_err(|err| err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads policy sets from rule directories.
#[derive(Debug, Clone, Copy)]
pub struct PolicySetLoader {
    /// Per-file size limit in bytes.
    max_file_bytes: usize,
    /// Maximum number of rule files.
    max_files: usize,
}

impl Default for PolicySetLoader {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_RULE_FILE_BYTES,
            max_files: MAX_RULE_FILES,
        }
    }
}

/// Policy set plus the files it came from.
#[derive(Debug, Clone)]
pub struct LoadedPolicy {
    /// Validated policy set.
    pub policy: PolicySet,
    /// Rule files read, in load order.
    pub files: Vec<PathBuf>,
}

impl PolicySetLoader {
    /// Creates a loader with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every rule file in `dir` into one policy set.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyLoadError`] naming the offending file on any I/O,
    /// size, parse, validation, or duplicate-id failure, and when the
    /// directory holds no rule files.
    pub fn load_dir(&self, dir: &Path) -> Result<LoadedPolicy, PolicyLoadError> {
        let files = self.rule_files(dir)?;
        let mut policy = PolicySet::new();
        let mut origins: HashMap<RuleId, PathBuf> = HashMap::new();
        for path in &files {
            for rule in self.load_file(path)?.rules {
                let id = rule.id.clone();
                match policy.insert(rule) {
                    Ok(()) => {
                        origins.insert(id, path.clone());
                    }
                    Err(PolicySetError::DuplicateRuleId(id)) => {
                        let first = origins.get(&id).cloned().unwrap_or_else(|| path.clone());
                        return Err(PolicyLoadError::DuplicateRuleId {
                            id,
                            first,
                            second: path.clone(),
                        });
                    }
                    Err(PolicySetError::InvalidRule {
                        id,
                        message,
                    }) => {
                        return Err(PolicyLoadError::InvalidRule {
                            path: path.clone(),
                            id,
                            message,
                        });
                    }
                }
            }
        }
        Ok(LoadedPolicy {
            policy,
            files,
        })
    }

    /// Reads and parses one rule file.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyLoadError`] when the file is unreadable, oversized,
    /// unparseable, or declares no rules.
    pub fn load_file(&self, path: &Path) -> Result<RuleFile, PolicyLoadError> {
        let format = RuleFileFormat::from_path(path).ok_or_else(|| PolicyLoadError::Parse {
            path: path.to_path_buf(),
            message: "unsupported rule file extension".to_string(),
        })?;
        let bytes = fs::read(path).map_err(|err| PolicyLoadError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if bytes.len() > self.max_file_bytes {
            return Err(PolicyLoadError::TooLarge {
                path: path.to_path_buf(),
                actual: bytes.len(),
                limit: self.max_file_bytes,
            });
        }
        let text = std::str::from_utf8(&bytes).map_err(|_| PolicyLoadError::Parse {
            path: path.to_path_buf(),
            message: "rule file must be utf-8".to_string(),
        })?;
        let file = RuleFile::parse(text, format).map_err(|message| PolicyLoadError::Parse {
            path: path.to_path_buf(),
            message: format!("{format}: {message}"),
        })?;
        if file.rules.is_empty() {
            return Err(PolicyLoadError::Parse {
                path: path.to_path_buf(),
                message: "rule file declares no rules".to_string(),
            });
        }
        Ok(file)
    }

    /// Lists rule files in file-name order.
    fn rule_files(&self, dir: &Path) -> Result<Vec<PathBuf>, PolicyLoadError> {
        let io_error = |err: std::io::Error| PolicyLoadError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && RuleFileFormat::from_path(&path).is_some() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(PolicyLoadError::EmptyDirectory(dir.to_path_buf()));
        }
        if files.len() > self.max_files {
            return Err(PolicyLoadError::TooManyFiles {
                path: dir.to_path_buf(),
                limit: self.max_files,
            });
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy directory load failures. Each names the file involved.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    /// File or directory could not be read.
    #[error("policy load error: {}: {message}", .path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// I/O error message.
        message: String,
    },
    /// Rule file exceeds the size limit.
    #[error("policy load error: {}: {actual} bytes exceeds limit of {limit}", .path.display())]
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Observed size.
        actual: usize,
        /// Size limit.
        limit: usize,
    },
    /// Directory holds more rule files than allowed.
    #[error("policy load error: {}: more than {limit} rule files", .path.display())]
    TooManyFiles {
        /// Policy directory.
        path: PathBuf,
        /// File count limit.
        limit: usize,
    },
    /// Rule file is not well-formed.
    #[error("policy load error: {}: {message}", .path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// Rule definition failed validation.
    #[error("policy load error: {}: invalid rule {id}: {message}", .path.display())]
    InvalidRule {
        /// Offending file.
        path: PathBuf,
        /// Offending rule id.
        id: RuleId,
        /// Validation message.
        message: String,
    },
    /// Two rules share an id.
    #[error(
        "policy load error: duplicate rule id {id} in {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateRuleId {
        /// Colliding id.
        id: RuleId,
        /// File that declared the id first.
        first: PathBuf,
        /// File that declared it again.
        second: PathBuf,
    },
    /// Directory contains no rule files.
    #[error("policy load error: {}: no rule files found", .0.display())]
    EmptyDirectory(PathBuf),
}
