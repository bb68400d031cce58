//! Config load validation tests for plan-gate-config.
// crates/plan-gate-config/tests/config_load.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards and section rules.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use plan_gate_config::AuditSinkKind;
use plan_gate_config::ConfigError;
use plan_gate_config::PlanGateConfig;
use plan_gate_core::AuditEvent;
use plan_gate_core::AuditLevel;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

/// RFC 8032 test vector 1 public key.
const AUTHORITY_KEY: &str = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";

fn assert_invalid(result: Result<PlanGateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

// ============================================================================
// SECTION: Load Guards
// ============================================================================

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        PlanGateConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        PlanGateConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&vec![b'#'; 1_048_577]).map_err(|err| err.to_string())?;
    assert_invalid(PlanGateConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(PlanGateConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let missing = dir.path().join("plan-gate.toml");
    assert_invalid(PlanGateConfig::load(Some(&missing)), "config io error")
}

// ============================================================================
// SECTION: Sections
// ============================================================================

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = PlanGateConfig::from_toml_str("").map_err(|err| err.to_string())?;
    if config.policy.dir.is_some() || config.engine.workers != 1 {
        return Err("unexpected policy or engine defaults".to_string());
    }
    if config.identity.expected().is_some() || config.audit.sink != AuditSinkKind::Stderr {
        return Err("unexpected identity or audit defaults".to_string());
    }
    Ok(())
}

#[test]
fn full_config_parses() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let text = format!(
        r#"
[policy]
dir = "policies"

[engine]
workers = 4

[identity]
expected_identity = "deploy@acme.example"
expected_issuer = "https://issuer.acme.example"

[trust]
root_keys = ["{AUTHORITY_KEY}"]

[audit]
sink = "none"
"#
    );
    file.write_all(text.as_bytes()).map_err(|err| err.to_string())?;
    let config = PlanGateConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let expected = config.identity.expected().ok_or("identity pin missing")?;
    if expected.identity != "deploy@acme.example" || config.engine.engine_config().workers != 4 {
        return Err("config values not applied".to_string());
    }
    let root = config.trust.trust_root().map_err(|err| err.to_string())?;
    if root.is_empty() {
        return Err("trust root should hold one key".to_string());
    }
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> TestResult {
    assert_invalid(PlanGateConfig::from_toml_str("[engine]\nthreads = 2\n"), "config parse error")?;
    assert_invalid(PlanGateConfig::from_toml_str("[server]\nport = 1\n"), "config parse error")
}

#[test]
fn identity_requires_both_fields() -> TestResult {
    assert_invalid(
        PlanGateConfig::from_toml_str("[identity]\nexpected_identity = \"ci\"\n"),
        "must be set together",
    )?;
    assert_invalid(
        PlanGateConfig::from_toml_str(
            "[identity]\nexpected_identity = \" \"\nexpected_issuer = \"https://issuer\"\n",
        ),
        "must be non-empty",
    )
}

#[test]
fn workers_are_bounded() -> TestResult {
    assert_invalid(PlanGateConfig::from_toml_str("[engine]\nworkers = 0\n"), "engine.workers")?;
    assert_invalid(PlanGateConfig::from_toml_str("[engine]\nworkers = 65\n"), "engine.workers")
}

#[test]
fn trust_keys_must_decode() -> TestResult {
    assert_invalid(
        PlanGateConfig::from_toml_str("[trust]\nroot_keys = [\"not base64!\"]\n"),
        "not base64",
    )?;
    assert_invalid(
        PlanGateConfig::from_toml_str("[trust]\nroot_keys = [\"AAAA\"]\n"),
        "invalid trust root",
    )
}

#[test]
fn file_sink_requires_path() -> TestResult {
    assert_invalid(
        PlanGateConfig::from_toml_str("[audit]\nsink = \"file\"\n"),
        "audit.path is required",
    )?;
    assert_invalid(
        PlanGateConfig::from_toml_str("[audit]\nsink = \"stderr\"\npath = \"audit.log\"\n"),
        "only valid for the file sink",
    )
}

#[test]
fn file_sink_appends_json_lines() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let log = dir.path().join("audit.log");
    let text = format!("[audit]\nsink = \"file\"\npath = {:?}\n", log.to_string_lossy());
    let config = PlanGateConfig::from_toml_str(&text).map_err(|err| err.to_string())?;
    let sink = config.audit.build_sink().map_err(|err| err.to_string())?;
    for event in ["policy_set_loaded", "gate_evaluated"] {
        sink.record(&AuditEvent::new(event, AuditLevel::Info));
    }
    let written = std::fs::read_to_string(&log).map_err(|err| err.to_string())?;
    let lines: Vec<&str> = written.lines().collect();
    if lines.len() != 2 || !lines[1].contains("\"event\":\"gate_evaluated\"") {
        return Err(format!("unexpected audit log: {written}"));
    }
    Ok(())
}
