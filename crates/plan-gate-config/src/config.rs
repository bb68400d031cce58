// crates/plan-gate-config/src/config.rs
// ============================================================================
// Module: Plan Gate Configuration
// Description: Configuration loading and validation for Plan Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: plan-gate-core, serde, toml, base64
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and defaults to the reference behavior: the
//! built-in policy set, sequential evaluation, stderr audit output, and no
//! identity pin. Unknown keys are rejected.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use plan_gate_core::AuditSink;
use plan_gate_core::EngineConfig;
use plan_gate_core::ExpectedIdentity;
use plan_gate_core::FileAuditSink;
use plan_gate_core::NoopAuditSink;
use plan_gate_core::StderrAuditSink;
use plan_gate_core::TrustRoot;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "plan-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PLAN_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum evaluation worker count.
pub const MAX_WORKERS: usize = 64;
/// Maximum number of trusted root keys.
pub const MAX_TRUST_ROOT_KEYS: usize = 16;
/// Maximum length of a pinned identity or issuer string.
pub const MAX_IDENTITY_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Plan Gate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanGateConfig {
    /// Policy source configuration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Rule engine configuration.
    #[serde(default)]
    pub engine: EngineSection,
    /// Expected signer identity for verification.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Trusted signing authorities.
    #[serde(default)]
    pub trust: TrustConfig,
    /// Audit output configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl PlanGateConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then `PLAN_GATE_CONFIG`, then `plan-gate.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        self.engine.validate()?;
        self.identity.validate()?;
        self.trust.validate()?;
        self.audit.validate()
    }
}

/// Policy source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Directory of rule files; the built-in reference set is used when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl PolicyConfig {
    /// Validates the policy directory path.
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.dir {
            Some(dir) => validate_path_string("policy.dir", &dir.to_string_lossy()),
            None => Ok(()),
        }
    }
}

/// Rule engine configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Worker threads for rule evaluation.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl EngineSection {
    /// Returns the core engine configuration.
    #[must_use]
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.workers,
        }
    }

    /// Validates worker bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "engine.workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        Ok(())
    }
}

/// Default worker count.
const fn default_workers() -> usize {
    1
}

/// Expected signer identity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Expected certificate identity (exact match).
    #[serde(default)]
    pub expected_identity: Option<String>,
    /// Expected OIDC issuer (exact match).
    #[serde(default)]
    pub expected_issuer: Option<String>,
}

impl IdentityConfig {
    /// Returns the identity pin, if configured.
    #[must_use]
    pub fn expected(&self) -> Option<ExpectedIdentity> {
        match (&self.expected_identity, &self.expected_issuer) {
            (Some(identity), Some(issuer)) => Some(ExpectedIdentity::new(identity, issuer)),
            _ => None,
        }
    }

    /// Requires both pin fields or neither.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.expected_identity, &self.expected_issuer) {
            (None, None) => Ok(()),
            (Some(identity), Some(issuer)) => {
                validate_claim("identity.expected_identity", identity)?;
                validate_claim("identity.expected_issuer", issuer)
            }
            _ => Err(ConfigError::Invalid(
                "identity.expected_identity and identity.expected_issuer must be set together"
                    .to_string(),
            )),
        }
    }
}

/// Validates one pinned claim string.
fn validate_claim(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_IDENTITY_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Trusted authority configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustConfig {
    /// Base64-encoded ed25519 public keys of trusted root authorities.
    #[serde(default)]
    pub root_keys: Vec<String>,
}

impl TrustConfig {
    /// Builds the verifier trust root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a key does not decode to a valid
    /// ed25519 public key.
    pub fn trust_root(&self) -> Result<TrustRoot, ConfigError> {
        let keys = self
            .root_keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                STANDARD.decode(key.trim()).map_err(|err| {
                    ConfigError::Invalid(format!("trust.root_keys[{index}] is not base64: {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        TrustRoot::from_public_keys(&keys).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Validates key count and encoding.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_keys.len() > MAX_TRUST_ROOT_KEYS {
            return Err(ConfigError::Invalid(format!(
                "trust.root_keys exceeds {MAX_TRUST_ROOT_KEYS} entries"
            )));
        }
        self.trust_root().map(|_| ())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Audit output disabled.
    None,
}

/// Audit output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Opens the configured sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_sink(&self) -> Result<Box<dyn AuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::Stderr, _) => Ok(Box::new(StderrAuditSink)),
            (AuditSinkKind::None, _) => Ok(Box::new(NoopAuditSink)),
            (AuditSinkKind::File, Some(path)) => FileAuditSink::new(path)
                .map(|sink| Box::new(sink) as Box<dyn AuditSink>)
                .map_err(|err| ConfigError::Io(format!("audit log {}: {err}", path.display()))),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }

    /// Requires a path exactly when the file sink is selected.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
