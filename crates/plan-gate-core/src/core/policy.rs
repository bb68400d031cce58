// crates/plan-gate-core/src/core/policy.rs
// ============================================================================
// Module: Plan Gate Policy Definitions
// Description: Declarative rule specifications and ordered policy sets.
// Purpose: Describe deny/warn rules as data that the rule engine can execute.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`RuleSpec`] names a rule, fixes its [`Severity`], and selects one
//! [`CheckSpec`]: a built-in check with parameters, or a generic attribute
//! comparison. Specs are plain data so rule files can be authored in TOML or
//! RON. A [`PolicySet`] keeps rules in insertion order (which is also report
//! order) and rejects duplicate identifiers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::finding::Severity;
use crate::core::identifiers::RuleId;

// ============================================================================
// SECTION: Reference Constants
// ============================================================================

/// Public access block flags that must never be `false`.
pub const PUBLIC_ACCESS_BLOCK_ATTRIBUTES: [&str; 4] =
    ["block_public_acls", "block_public_policy", "ignore_public_acls", "restrict_public_buckets"];
/// Ports that must not be reachable from the whole internet.
pub const SENSITIVE_PORTS: [u16; 2] = [22, 3389];
/// CIDR ranges that denote "anyone".
pub const DANGEROUS_CIDRS: [&str; 2] = ["0.0.0.0/0", "::/0"];

/// Reference rule id for the public access block check.
pub const RULE_PUBLIC_ACCESS_BLOCK: &str = "s3_public_access_block";
/// Reference rule id for the missing public access block signal.
pub const RULE_MISSING_PUBLIC_ACCESS_BLOCK: &str = "s3_missing_public_access_block";
/// Reference rule id for the open ingress check.
pub const RULE_OPEN_INGRESS: &str = "sg_open_sensitive_ingress";
/// Reference rule id for the IAM wildcard check.
pub const RULE_IAM_WILDCARD: &str = "iam_wildcard";

// ============================================================================
// SECTION: Rule Specification
// ============================================================================

/// One named deny/warn rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Identifier, unique within a policy set.
    pub id: RuleId,
    /// Severity stamped onto every finding.
    pub severity: Severity,
    /// Optional human description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional remediation hint attached to findings.
    #[serde(default)]
    pub remediation: Option<String>,
    /// Check executed by the rule.
    pub check: CheckSpec,
}

impl RuleSpec {
    /// Creates a rule spec without description or remediation.
    #[must_use]
    pub fn new(id: impl Into<RuleId>, severity: Severity, check: CheckSpec) -> Self {
        Self {
            id: id.into(),
            severity,
            description: None,
            remediation: None,
            check,
        }
    }

    /// Attaches a remediation hint.
    #[must_use]
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates the rule definition.
    ///
    /// # Errors
    ///
    /// Returns [`PolicySetError::InvalidRule`] when the id is blank or the
    /// check parameters are unusable.
    pub fn validate(&self) -> Result<(), PolicySetError> {
        if self.id.as_str().trim().is_empty() {
            return Err(PolicySetError::InvalidRule {
                id: self.id.clone(),
                message: "id must be non-empty".to_string(),
            });
        }
        self.check.validate().map_err(|message| PolicySetError::InvalidRule {
            id: self.id.clone(),
            message,
        })
    }
}

/// Check selected by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckSpec {
    /// Public access block flags explicitly set to `false`.
    PublicAccessBlock(PublicAccessBlockCheck),
    /// Buckets without any associated public access block.
    MissingPublicAccessBlock(MissingPublicAccessBlockCheck),
    /// Sensitive ports open to dangerous CIDRs.
    OpenIngress(OpenIngressCheck),
    /// IAM statements granting wildcard actions or resources.
    IamWildcard(IamWildcardCheck),
    /// Generic attribute comparison.
    Attribute(AttributeCheck),
}

impl CheckSpec {
    /// Returns the stable kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PublicAccessBlock(_) => "public_access_block",
            Self::MissingPublicAccessBlock(_) => "missing_public_access_block",
            Self::OpenIngress(_) => "open_ingress",
            Self::IamWildcard(_) => "iam_wildcard",
            Self::Attribute(_) => "attribute",
        }
    }

    /// Validates check parameters.
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::PublicAccessBlock(check) => {
                require_non_empty("resource_types", &check.resource_types)?;
                require_non_empty("attributes", &check.attributes)
            }
            Self::MissingPublicAccessBlock(check) => {
                require_non_empty("bucket_types", &check.bucket_types)?;
                require_non_empty("block_types", &check.block_types)
            }
            Self::OpenIngress(check) => {
                if check.sensitive_ports.is_empty() {
                    return Err("sensitive_ports must be non-empty".to_string());
                }
                require_non_empty("dangerous_cidrs", &check.dangerous_cidrs)?;
                if check.security_group_types.is_empty()
                    && check.rule_types.is_empty()
                    && check.ingress_rule_types.is_empty()
                {
                    return Err("at least one resource type list must be non-empty".to_string());
                }
                Ok(())
            }
            Self::IamWildcard(check) => {
                require_non_empty("resource_types", &check.resource_types)?;
                require_non_empty("document_attributes", &check.document_attributes)
            }
            Self::Attribute(check) => check.validate(),
        }
    }
}

/// Ensures a string list is non-empty and has no blank entries.
fn require_non_empty(field: &str, values: &[String]) -> Result<(), String> {
    if values.is_empty() {
        return Err(format!("{field} must be non-empty"));
    }
    if values.iter().any(|value| value.trim().is_empty()) {
        return Err(format!("{field} must not contain blank entries"));
    }
    Ok(())
}

/// Converts a string slice list into owned strings.
fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

// ============================================================================
// SECTION: Built-in Check Parameters
// ============================================================================

/// Parameters for the public access block check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicAccessBlockCheck {
    /// Resource types carrying public access block flags.
    #[serde(default = "default_block_types")]
    pub resource_types: Vec<String>,
    /// Flags that must not be `false`.
    #[serde(default = "default_block_attributes")]
    pub attributes: Vec<String>,
}

impl Default for PublicAccessBlockCheck {
    fn default() -> Self {
        Self {
            resource_types: default_block_types(),
            attributes: default_block_attributes(),
        }
    }
}

/// Parameters for the missing public access block signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissingPublicAccessBlockCheck {
    /// Bucket resource types.
    #[serde(default = "default_bucket_types")]
    pub bucket_types: Vec<String>,
    /// Public access block resource types.
    #[serde(default = "default_block_types")]
    pub block_types: Vec<String>,
}

impl Default for MissingPublicAccessBlockCheck {
    fn default() -> Self {
        Self {
            bucket_types: default_bucket_types(),
            block_types: default_block_types(),
        }
    }
}

/// Parameters for the open ingress check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenIngressCheck {
    /// Ports that must not be exposed.
    #[serde(default = "default_sensitive_ports")]
    pub sensitive_ports: Vec<u16>,
    /// CIDRs that denote unrestricted sources.
    #[serde(default = "default_dangerous_cidrs")]
    pub dangerous_cidrs: Vec<String>,
    /// Security group types with nested `ingress` blocks.
    #[serde(default = "default_security_group_types")]
    pub security_group_types: Vec<String>,
    /// Standalone rule types gated on `type == "ingress"`.
    #[serde(default = "default_rule_types")]
    pub rule_types: Vec<String>,
    /// Provider-specific ingress rule types using `cidr_ipv4`/`cidr_ipv6`.
    #[serde(default = "default_ingress_rule_types")]
    pub ingress_rule_types: Vec<String>,
}

impl Default for OpenIngressCheck {
    fn default() -> Self {
        Self {
            sensitive_ports: default_sensitive_ports(),
            dangerous_cidrs: default_dangerous_cidrs(),
            security_group_types: default_security_group_types(),
            rule_types: default_rule_types(),
            ingress_rule_types: default_ingress_rule_types(),
        }
    }
}

/// Parameters for the IAM wildcard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IamWildcardCheck {
    /// Resource types carrying a policy document.
    #[serde(default = "default_iam_types")]
    pub resource_types: Vec<String>,
    /// Attributes checked in order for the policy document.
    #[serde(default = "default_document_attributes")]
    pub document_attributes: Vec<String>,
}

impl Default for IamWildcardCheck {
    fn default() -> Self {
        Self {
            resource_types: default_iam_types(),
            document_attributes: default_document_attributes(),
        }
    }
}

/// Default public access block resource types.
fn default_block_types() -> Vec<String> {
    owned(&["aws_s3_bucket_public_access_block"])
}

/// Default public access block flag names.
fn default_block_attributes() -> Vec<String> {
    owned(&PUBLIC_ACCESS_BLOCK_ATTRIBUTES)
}

/// Default bucket resource types.
fn default_bucket_types() -> Vec<String> {
    owned(&["aws_s3_bucket"])
}

/// Default sensitive ports.
fn default_sensitive_ports() -> Vec<u16> {
    SENSITIVE_PORTS.to_vec()
}

/// Default dangerous CIDRs.
fn default_dangerous_cidrs() -> Vec<String> {
    owned(&DANGEROUS_CIDRS)
}

/// Default security group types.
fn default_security_group_types() -> Vec<String> {
    owned(&["aws_security_group"])
}

/// Default standalone rule types.
fn default_rule_types() -> Vec<String> {
    owned(&["aws_security_group_rule"])
}

/// Default provider-specific ingress rule types.
fn default_ingress_rule_types() -> Vec<String> {
    owned(&["aws_vpc_security_group_ingress_rule"])
}

/// Default IAM policy-bearing types.
fn default_iam_types() -> Vec<String> {
    owned(&[
        "aws_iam_policy",
        "aws_iam_role_policy",
        "aws_iam_user_policy",
        "aws_iam_group_policy",
        "aws_iam_policy_document",
    ])
}

/// Default policy document attribute names.
fn default_document_attributes() -> Vec<String> {
    owned(&["policy", "json"])
}

// ============================================================================
// SECTION: Attribute Check
// ============================================================================

/// Comparator used by attribute checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeComparator {
    /// Attribute equals `value`.
    Equals,
    /// Attribute is present and differs from `value`.
    NotEquals,
    /// Attribute is present and not null.
    Exists,
    /// Attribute is absent or null.
    NotExists,
    /// Attribute equals one member of the `value` array.
    InSet,
    /// Attribute string contains, or attribute array holds, `value`.
    Contains,
}

impl AttributeComparator {
    /// Returns true when the comparator needs an expected value.
    #[must_use]
    pub const fn requires_value(self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

/// Generic declarative check: a finding for each matching resource whose
/// post-change attribute at `path` satisfies `comparator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeCheck {
    /// Resource types the check applies to.
    pub resource_types: Vec<String>,
    /// Dotted attribute path into `after`; numeric segments index arrays.
    pub path: String,
    /// Comparator applied to the attribute.
    pub comparator: AttributeComparator,
    /// Expected value for comparators that need one.
    #[serde(default)]
    pub value: Option<Value>,
    /// Message template with `{address}`, `{path}`, and `{value}` placeholders.
    #[serde(default)]
    pub message: Option<String>,
}

impl AttributeCheck {
    /// Validates attribute check parameters.
    fn validate(&self) -> Result<(), String> {
        require_non_empty("resource_types", &self.resource_types)?;
        if self.path.trim().is_empty() || self.path.split('.').any(str::is_empty) {
            return Err("path must be a non-empty dotted path".to_string());
        }
        if self.comparator.requires_value() && self.value.is_none() {
            return Err("comparator requires a value".to_string());
        }
        if self.comparator == AttributeComparator::InSet
            && !matches!(self.value, Some(Value::Array(_)))
        {
            return Err("in_set requires an array value".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Policy Set
// ============================================================================

/// Ordered collection of rules keyed by id.
///
/// # Invariants
/// - Rule ids are unique.
/// - Every rule passed [`RuleSpec::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicySet {
    /// Rules in insertion order.
    rules: Vec<RuleSpec>,
    /// Rule id to position index.
    index: HashMap<RuleId, usize>,
}

impl PolicySet {
    /// Creates an empty policy set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a policy set from rules in order.
    ///
    /// # Errors
    ///
    /// Returns [`PolicySetError`] on an invalid rule or duplicate id.
    pub fn from_rules(rules: impl IntoIterator<Item = RuleSpec>) -> Result<Self, PolicySetError> {
        let mut set = Self::new();
        for rule in rules {
            set.insert(rule)?;
        }
        Ok(set)
    }

    /// Appends a rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicySetError`] on an invalid rule or duplicate id.
    pub fn insert(&mut self, rule: RuleSpec) -> Result<(), PolicySetError> {
        rule.validate()?;
        if self.index.contains_key(&rule.id) {
            return Err(PolicySetError::DuplicateRuleId(rule.id));
        }
        self.index.insert(rule.id.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Returns the rules in insertion order.
    #[must_use]
    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    /// Looks up a rule by id.
    #[must_use]
    pub fn get(&self, id: &RuleId) -> Option<&RuleSpec> {
        self.index.get(id).and_then(|position| self.rules.get(*position))
    }

    /// Returns true when a rule id is present.
    #[must_use]
    pub fn contains(&self, id: &RuleId) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the reference rule set: public access block (deny), missing
    /// public access block (warn), open ingress (deny), IAM wildcard (deny).
    #[must_use]
    pub fn reference() -> Self {
        let rules = vec![
            RuleSpec::new(
                RULE_PUBLIC_ACCESS_BLOCK,
                Severity::Deny,
                CheckSpec::PublicAccessBlock(PublicAccessBlockCheck::default()),
            )
            .with_description("Public access block flags must never be explicitly disabled.")
            .with_remediation("set every public access block flag to true"),
            RuleSpec::new(
                RULE_MISSING_PUBLIC_ACCESS_BLOCK,
                Severity::Warn,
                CheckSpec::MissingPublicAccessBlock(MissingPublicAccessBlockCheck::default()),
            )
            .with_description("Buckets should ship with a public access block in the same plan.")
            .with_remediation("add an aws_s3_bucket_public_access_block for the bucket"),
            RuleSpec::new(
                RULE_OPEN_INGRESS,
                Severity::Deny,
                CheckSpec::OpenIngress(OpenIngressCheck::default()),
            )
            .with_description("Sensitive management ports open to 0.0.0.0/0 or ::/0.")
            .with_remediation("restrict the ingress source to a trusted CIDR or a bastion"),
            RuleSpec::new(
                RULE_IAM_WILDCARD,
                Severity::Deny,
                CheckSpec::IamWildcard(IamWildcardCheck::default()),
            )
            .with_description("Policies granting Action \"*\" or allowing Resource \"*\".")
            .with_remediation("list explicit actions and resource ARNs"),
        ];
        let mut set = Self::new();
        for rule in rules {
            set.index.insert(rule.id.clone(), set.rules.len());
            set.rules.push(rule);
        }
        set
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy set construction errors.
#[derive(Debug, Error)]
pub enum PolicySetError {
    /// Two rules share an id.
    #[error("duplicate rule id {0}")]
    DuplicateRuleId(RuleId),
    /// A rule definition is unusable.
    #[error("invalid rule {id}: {message}")]
    InvalidRule {
        /// Offending rule id.
        id: RuleId,
        /// Validation message.
        message: String,
    },
}
