// crates/plan-gate-core/src/rules/open_ingress.rs
// ============================================================================
// Module: Open Ingress Check
// Description: Sensitive ports exposed to unrestricted CIDRs.
// Purpose: Deny SSH/RDP-style ingress from anywhere across all rule shapes.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Three resource shapes carry ingress: security groups with nested
//! `ingress` blocks, standalone rules gated on `type = "ingress"`, and
//! provider-specific ingress rule resources with single `cidr_ipv4` /
//! `cidr_ipv6` values. Each shape reports against its own address. One match
//! is produced per (sensitive port, dangerous CIDR) pair per ingress entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::ChangeDocument;
use crate::core::OpenIngressCheck;
use crate::core::ResourceChange;
use crate::rules::Check;
use crate::rules::CheckMatch;
use crate::rules::value_as_port;
use crate::rules::value_as_strings;

// ============================================================================
// SECTION: Check
// ============================================================================

impl Check for OpenIngressCheck {
    fn evaluate(&self, document: &ChangeDocument) -> Vec<CheckMatch> {
        let mut out = Vec::new();
        for change in document.resource_changes() {
            if change.is_delete_only() {
                continue;
            }
            let Some(after) = change.after() else {
                continue;
            };
            let kind = &change.resource_type;
            if self.security_group_types.contains(kind) {
                let Some(Value::Array(entries)) = after.get("ingress") else {
                    continue;
                };
                for (index, entry) in entries.iter().enumerate() {
                    let Some(entry) = entry.as_object() else {
                        continue;
                    };
                    let cidrs = entry_cidrs(entry, "cidr_blocks", "ipv6_cidr_blocks");
                    let label = format!("security group {} ingress[{index}]", change.address);
                    self.report(change, entry, &cidrs, &label, &mut out);
                }
            } else if self.rule_types.contains(kind) {
                if after.get("type").and_then(Value::as_str) != Some("ingress") {
                    continue;
                }
                let cidrs = entry_cidrs(after, "cidr_blocks", "ipv6_cidr_blocks");
                let label = format!("security group rule {}", change.address);
                self.report(change, after, &cidrs, &label, &mut out);
            } else if self.ingress_rule_types.contains(kind) {
                let cidrs = entry_cidrs(after, "cidr_ipv4", "cidr_ipv6");
                let label = format!("ingress rule {}", change.address);
                self.report(change, after, &cidrs, &label, &mut out);
            }
        }
        out
    }
}

impl OpenIngressCheck {
    /// Appends matches for one ingress entry.
    fn report(
        &self,
        change: &ResourceChange,
        entry: &Map<String, Value>,
        cidrs: &[&str],
        label: &str,
        out: &mut Vec<CheckMatch>,
    ) {
        let Some((from, to)) = port_range(entry) else {
            return;
        };
        let open: Vec<&str> = cidrs
            .iter()
            .copied()
            .filter(|cidr| self.dangerous_cidrs.iter().any(|danger| danger == cidr))
            .collect();
        if open.is_empty() {
            return;
        }
        for port in &self.sensitive_ports {
            let port_value = i64::from(*port);
            if port_value < from || port_value > to {
                continue;
            }
            for cidr in &open {
                out.push(CheckMatch::at(
                    &change.address,
                    format!("{label} opens port {port} to {cidr}"),
                ));
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the `[from_port, to_port]` interval.
fn port_range(entry: &Map<String, Value>) -> Option<(i64, i64)> {
    let from = entry.get("from_port").and_then(value_as_port)?;
    let to = entry.get("to_port").and_then(value_as_port)?;
    Some((from, to))
}

/// Collects IPv4 then IPv6 CIDRs without duplicates.
fn entry_cidrs<'a>(entry: &'a Map<String, Value>, ipv4: &str, ipv6: &str) -> Vec<&'a str> {
    let mut cidrs: Vec<&str> = Vec::new();
    let v4 = value_as_strings(entry.get(ipv4));
    let v6 = value_as_strings(entry.get(ipv6));
    for cidr in v4.into_iter().chain(v6) {
        if !cidrs.contains(&cidr) {
            cidrs.push(cidr);
        }
    }
    cidrs
}
