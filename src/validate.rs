//! The semantic validator: checks a [TlvTree] against a target DOCSIS version and reports
//! [ValidationIssue]s. Never mutates the tree, never raises — issues are returned as data for the
//! caller to act on, per the error handling design notes.

use std::collections::HashMap;

use crate::registry::{self, Entry, Uniqueness, Version};
use crate::tree::{TlvRecord, TlvTree};
use crate::types::TlvPath;
use crate::value::DecodedValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub tlv_path: TlvPath,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn error(code: &'static str, tlv_path: TlvPath, message: String) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            code,
            tlv_path,
            message,
            suggestion: None,
        }
    }

    fn warning(code: &'static str, tlv_path: TlvPath, message: String) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            code,
            tlv_path,
            message,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Validate `tree` against `version`. Pure and re-entrant: calling this twice with the same
/// inputs always yields the same (order-preserving) result.
pub fn validate(tree: &TlvTree, version: Version) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_counts: HashMap<u8, u32> = HashMap::new();

    for record in tree.records.iter() {
        if record.is_pad() || record.is_end_of_data() {
            continue;
        }
        let path = TlvPath::root(record.tlv_type);
        let entry = &record.metadata.entry;

        check_common(record, &path, entry, version, &mut issues);

        if registry::is_vendor(record.tlv_type) {
            issues.push(ValidationIssue::warning(
                "VENDOR_SPECIFIC_TLV",
                path.clone(),
                format!("TLV {} is vendor-specific; semantics are not defined by CableLabs", record.tlv_type),
            ));
        } else if is_unknown(entry) {
            issues.push(ValidationIssue::warning(
                "UNKNOWN_TLV",
                path.clone(),
                format!("TLV {} has no registry entry", record.tlv_type),
            ));
        }

        let count = seen_counts.entry(record.tlv_type).or_insert(0);
        *count += 1;
        if entry.uniqueness == Uniqueness::Single && *count > 1 {
            issues.push(ValidationIssue::error(
                "DUPLICATE_TLV",
                path.clone(),
                format!("TLV {} ({}) may appear at most once", record.tlv_type, entry.name),
            ));
        }

        check_children(&record.children, record.tlv_type, &path, version, &mut issues);
    }

    for t in registry::required_top_level_types() {
        if tree.first(t).is_none() {
            let entry = registry::info(t);
            issues.push(ValidationIssue::error(
                "MISSING_REQUIRED_TLV",
                TlvPath::root(t),
                format!("required TLV {} ({}) is missing", t, entry.name),
            ));
        }
    }

    issues
}

fn check_children(children: &[TlvRecord], parent_type: u8, parent_path: &TlvPath, version: Version, issues: &mut Vec<ValidationIssue>) {
    for child in children {
        let path = parent_path.child(child.tlv_type);
        let entry = registry::info_sub(parent_type, child.tlv_type);
        check_common(child, &path, &entry, version, issues);
        check_children(&child.children, child.tlv_type, &path, version, issues);
    }
}

/// Checks 1, 4 and 5: version gating, range/enum constraints, length caps. Shared between
/// top-level records and sub-TLVs, per the "apply 1-5 to children" rule.
fn check_common(record: &TlvRecord, path: &TlvPath, entry: &Entry, version: Version, issues: &mut Vec<ValidationIssue>) {
    if !registry::is_vendor(record.tlv_type) && entry.introduced_version > version {
        issues.push(ValidationIssue::error(
            "TLV_VERSION_MISMATCH",
            path.clone(),
            format!(
                "TLV {} ({}) requires DOCSIS {}, but target is {}",
                record.tlv_type, entry.name, entry.introduced_version, version
            ),
        ));
    }

    if let Some(range) = entry.value_constraint {
        if let Some(value) = numeric_value(&record.decoded_value) {
            if value < range.min || value > range.max {
                issues.push(ValidationIssue::error(
                    "VALUE_OUT_OF_RANGE",
                    path.clone(),
                    format!(
                        "TLV {} value {} is outside the allowed range {}..={}",
                        record.tlv_type, value, range.min, range.max
                    ),
                ));
            }
        }
    }

    if let DecodedValue::Enum { value, label: None } = &record.decoded_value {
        issues.push(ValidationIssue::error(
            "VALUE_OUT_OF_RANGE",
            path.clone(),
            format!("TLV {} value {} is not in the enum table", record.tlv_type, value),
        ));
    }

    if let Some(max_length) = entry.max_length {
        if record.length() > max_length {
            issues.push(ValidationIssue::error(
                "LENGTH_EXCEEDS_MAX",
                path.clone(),
                format!(
                    "TLV {} length {} exceeds the maximum of {}",
                    record.tlv_type,
                    record.length(),
                    max_length
                ),
            ));
        }
    }
}

fn numeric_value(value: &DecodedValue) -> Option<i64> {
    match value {
        DecodedValue::U8(v) => Some(*v as i64),
        DecodedValue::U16(v) => Some(*v as i64),
        DecodedValue::U32(v) => Some(*v as i64),
        _ => None,
    }
}

fn is_unknown(entry: &Entry) -> bool {
    entry.name.starts_with("Unknown TLV ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TlvRecord;

    #[test]
    fn version_mismatch_on_tlv_77_at_3_0() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_compound(77, Vec::new()),
        ]);
        let issues = validate(&tree, Version::V3_0);
        assert!(issues.iter().any(|i| i.code == "TLV_VERSION_MISMATCH" && i.tlv_path == TlvPath::root(77)));
    }

    #[test]
    fn duplicate_single_tlv_flagged() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(6, vec![0; 16]),
            TlvRecord::new_scalar(6, vec![1; 16]),
        ]);
        let issues = validate(&tree, Version::V3_1);
        assert!(issues.iter().any(|i| i.code == "DUPLICATE_TLV"));
    }

    #[test]
    fn missing_required_tlv_flagged() {
        let tree = TlvTree::new(vec![TlvRecord::new_scalar(2, vec![1])]);
        let issues = validate(&tree, Version::V3_1);
        assert!(issues.iter().any(|i| i.code == "MISSING_REQUIRED_TLV" && i.tlv_path == TlvPath::root(1)));
    }

    #[test]
    fn out_of_range_value_flagged() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(3, vec![5]),
        ]);
        let issues = validate(&tree, Version::V3_1);
        assert!(issues.iter().any(|i| i.code == "VALUE_OUT_OF_RANGE" && i.tlv_path == TlvPath::root(3)));
    }

    #[test]
    fn length_exceeds_max_flagged() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(6, vec![0u8; 20]),
        ]);
        let issues = validate(&tree, Version::V3_1);
        assert!(issues.iter().any(|i| i.code == "LENGTH_EXCEEDS_MAX"));
    }

    #[test]
    fn vendor_tlv_gets_warning_and_skips_version_gate() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(210, vec![1, 2, 3]),
        ]);
        let issues = validate(&tree, Version::V1_0);
        assert!(issues.iter().any(|i| i.code == "VENDOR_SPECIFIC_TLV"));
        assert!(!issues.iter().any(|i| i.code == "TLV_VERSION_MISMATCH" && i.tlv_path == TlvPath::root(210)));
    }

    #[test]
    fn unknown_tlv_gets_warning() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(150, vec![1]),
        ]);
        let issues = validate(&tree, Version::V3_1);
        assert!(issues.iter().any(|i| i.code == "UNKNOWN_TLV"));
    }

    #[test]
    fn validation_is_idempotent() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(3, vec![9]),
        ]);
        assert_eq!(validate(&tree, Version::V2_0), validate(&tree, Version::V2_0));
    }

    #[test]
    fn sub_tlv_range_violation_is_recursive() {
        // Sub-schema (17, 1) is Uint16, no range constraint, with no bearing on the unrelated
        // top-level meaning of type 1 ("Downstream Frequency").
        let sub = TlvRecord::new_sub_scalar(17, 1, vec![0, 1]);
        assert_eq!(sub.decoded_value, DecodedValue::U16(1));
        let parent = TlvRecord::new_compound(17, vec![sub]);
        let tree = TlvTree::new(vec![TlvRecord::new_scalar(1, vec![0, 0, 0, 1]), parent]);
        // No panics, and the parent's own check runs alongside the child's.
        let issues = validate(&tree, Version::V1_1);
        assert!(!issues.iter().any(|i| i.code == "TLV_VERSION_MISMATCH" && i.tlv_path == TlvPath::root(17)));
    }
}
