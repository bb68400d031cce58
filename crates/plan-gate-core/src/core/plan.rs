// crates/plan-gate-core/src/core/plan.rs
// ============================================================================
// Module: Plan Gate Change Document Model
// Description: Typed representation of a proposed infrastructure change set.
// Purpose: Parse provisioning plans into validated, read-only documents.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`ChangeDocument`] is built once from the provisioning engine's plan JSON
//! (`{resource_changes: [{address, type, change: {actions, before, after}}]}`)
//! and is read-only afterwards: there is no mutable accessor, so rules only
//! ever see shared views.
//!
//! Unknown fields at the document, resource, and change level are kept in
//! `extra` maps and written back on serialization. Structural problems in the
//! required fields surface as [`MalformedInput`] and nothing is evaluated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ResourceAddress;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted size of a serialized change document in bytes.
pub const MAX_CHANGE_DOCUMENT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Planned action applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Resource will be created.
    Create,
    /// Data source will be read.
    Read,
    /// Resource will be updated in place.
    Update,
    /// Resource will be destroyed.
    Delete,
    /// No change is planned.
    NoOp,
}

impl Action {
    /// Returns the wire label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoOp => "no-op",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Resource Changes
// ============================================================================

/// Attribute mapping of a resource before or after the change.
pub type Attributes = Map<String, Value>;

/// Action list and attribute snapshots for one resource change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetail {
    /// Ordered, non-empty set of planned actions.
    pub actions: Vec<Action>,
    /// Attributes before the change; absent on create.
    #[serde(default)]
    pub before: Option<Attributes>,
    /// Attributes after the change; absent on delete.
    #[serde(default)]
    pub after: Option<Attributes>,
    /// Unrecognized fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One planned mutation to one infrastructure resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Unique address within the plan.
    pub address: ResourceAddress,
    /// Resource type tag (for example `aws_security_group`).
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Planned change.
    pub change: ChangeDetail,
    /// Unrecognized fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResourceChange {
    /// Creates a resource change with the given actions and attribute snapshots.
    #[must_use]
    pub fn new(
        address: impl Into<ResourceAddress>,
        resource_type: impl Into<String>,
        actions: Vec<Action>,
        before: Option<Attributes>,
        after: Option<Attributes>,
    ) -> Self {
        Self {
            address: address.into(),
            resource_type: resource_type.into(),
            change: ChangeDetail {
                actions,
                before,
                after,
                extra: BTreeMap::new(),
            },
            extra: BTreeMap::new(),
        }
    }

    /// Returns the planned actions.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.change.actions
    }

    /// Returns true when the only planned action is deletion.
    #[must_use]
    pub fn is_delete_only(&self) -> bool {
        self.change.actions.iter().all(|action| *action == Action::Delete)
    }

    /// Returns the attributes after the change, if any.
    #[must_use]
    pub const fn after(&self) -> Option<&Attributes> {
        self.change.after.as_ref()
    }

    /// Returns the attributes before the change, if any.
    #[must_use]
    pub const fn before(&self) -> Option<&Attributes> {
        self.change.before.as_ref()
    }

    /// Returns one attribute from the post-change snapshot.
    #[must_use]
    pub fn after_attr(&self, name: &str) -> Option<&Value> {
        self.after().and_then(|attrs| attrs.get(name))
    }

    /// Validates required-field invariants for a single change.
    fn validate(&self) -> Result<(), String> {
        if self.address.as_str().trim().is_empty() {
            return Err("address must be non-empty".to_string());
        }
        if self.resource_type.trim().is_empty() {
            return Err("type must be non-empty".to_string());
        }
        if self.change.actions.is_empty() {
            return Err("change.actions must be non-empty".to_string());
        }
        for (index, action) in self.change.actions.iter().enumerate() {
            if self.change.actions[.. index].contains(action) {
                return Err(format!("change.actions repeats {action}"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Change Document
// ============================================================================

/// Full proposed change set, immutable after construction.
///
/// # Invariants
/// - Every address is unique.
/// - Every change carries a non-empty action set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeDocument {
    /// Ordered resource changes.
    resource_changes: Vec<ResourceChange>,
    /// Unrecognized top-level fields preserved for forward compatibility.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
    /// Address to position index used for deterministic ordering.
    #[serde(skip)]
    positions: HashMap<ResourceAddress, usize>,
}

/// Wire shape used to read the top-level document before per-entry validation.
#[derive(Deserialize)]
struct RawChangeDocument {
    /// Raw resource change entries.
    #[serde(default)]
    resource_changes: Option<Vec<Value>>,
    /// Remaining top-level fields.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl ChangeDocument {
    /// Builds a document from already-typed resource changes.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput`] when a change violates its invariants or an
    /// address repeats.
    pub fn new(resource_changes: Vec<ResourceChange>) -> Result<Self, MalformedInput> {
        Self::with_extra(resource_changes, BTreeMap::new())
    }

    /// Returns an empty document.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            resource_changes: Vec::new(),
            extra: BTreeMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Parses a document from plan JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput`] when the bytes are oversized, not JSON, or
    /// structurally invalid.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, MalformedInput> {
        if bytes.len() > MAX_CHANGE_DOCUMENT_BYTES {
            return Err(MalformedInput::TooLarge {
                actual: bytes.len(),
                limit: MAX_CHANGE_DOCUMENT_BYTES,
            });
        }
        let value: Value =
            serde_json::from_slice(bytes).map_err(|err| MalformedInput::Json(err.to_string()))?;
        Self::from_value(value)
    }

    /// Parses a document from an in-memory JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput`] when the value is structurally invalid.
    pub fn from_value(value: Value) -> Result<Self, MalformedInput> {
        if !value.is_object() {
            return Err(MalformedInput::Document("document must be a json object".to_string()));
        }
        let raw: RawChangeDocument = serde_json::from_value(value)
            .map_err(|err| MalformedInput::Document(err.to_string()))?;
        let mut changes = Vec::new();
        for (index, entry) in raw.resource_changes.unwrap_or_default().into_iter().enumerate() {
            let change: ResourceChange =
                serde_json::from_value(entry).map_err(|err| MalformedInput::Resource {
                    index,
                    message: err.to_string(),
                })?;
            changes.push(change);
        }
        Self::with_extra(changes, raw.extra)
    }

    /// Validates changes and builds the position index.
    fn with_extra(
        resource_changes: Vec<ResourceChange>,
        extra: BTreeMap<String, Value>,
    ) -> Result<Self, MalformedInput> {
        let mut positions = HashMap::with_capacity(resource_changes.len());
        for (index, change) in resource_changes.iter().enumerate() {
            change.validate().map_err(|message| MalformedInput::Resource {
                index,
                message,
            })?;
            if positions.insert(change.address.clone(), index).is_some() {
                return Err(MalformedInput::DuplicateAddress(change.address.clone()));
            }
        }
        Ok(Self {
            resource_changes,
            extra,
            positions,
        })
    }

    /// Returns the ordered resource changes.
    #[must_use]
    pub fn resource_changes(&self) -> &[ResourceChange] {
        &self.resource_changes
    }

    /// Returns preserved top-level fields.
    #[must_use]
    pub const fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// Returns the number of resource changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resource_changes.len()
    }

    /// Returns true when the document plans no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_changes.is_empty()
    }

    /// Returns the document position of an address.
    #[must_use]
    pub fn position_of(&self, address: &ResourceAddress) -> Option<usize> {
        self.positions.get(address).copied()
    }

    /// Looks up a change by address.
    #[must_use]
    pub fn get(&self, address: &ResourceAddress) -> Option<&ResourceChange> {
        self.position_of(address).and_then(|index| self.resource_changes.get(index))
    }

    /// Iterates over changes whose type is in `types`, in document order.
    pub fn resources_of_type<'a>(
        &'a self,
        types: &'a [String],
    ) -> impl Iterator<Item = &'a ResourceChange> + 'a {
        self.resource_changes.iter().filter(move |change| types.contains(&change.resource_type))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural validation failures for change documents.
#[derive(Debug, Error)]
pub enum MalformedInput {
    /// Input is not parseable JSON.
    #[error("malformed change document: invalid json: {0}")]
    Json(String),
    /// Input exceeds the accepted size.
    #[error("malformed change document: {actual} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Observed size in bytes.
        actual: usize,
        /// Maximum accepted size in bytes.
        limit: usize,
    },
    /// Top-level shape is invalid.
    #[error("malformed change document: {0}")]
    Document(String),
    /// A resource change entry is invalid.
    #[error("malformed change document: resource_changes[{index}]: {message}")]
    Resource {
        /// Zero-based entry index.
        index: usize,
        /// Validation message.
        message: String,
    },
    /// Two entries share an address.
    #[error("malformed change document: duplicate address {0}")]
    DuplicateAddress(ResourceAddress),
}
