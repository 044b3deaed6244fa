//! The semantic tree: [TlvRecord] and the ordered collection of top-level records ([TlvTree])
//! produced by the codec and consumed by the validator, the MIC engine, and (outside this
//! crate) text-format serializers.

use crate::registry::{self, Entry};
use crate::types::LengthEncoding;
use crate::value::DecodedValue;

/// Metadata looked up from the [crate::registry] for display/validation purposes. Never part of
/// a record's identity: two records with the same `(type, raw_value, children)` are
/// structurally equal regardless of what the registry currently says about that type.
#[derive(Clone, Debug)]
pub struct Metadata {
    pub entry: Entry,
}

/// One TLV (or sub-TLV) node. See the data model invariants in the top-level design notes:
/// `length == byte_length(raw_value)` always; for compound records `raw_value` is the
/// concatenation of the serialized children; for scalar records `children` is empty.
#[derive(Clone, Debug)]
pub struct TlvRecord {
    pub tlv_type: u8,
    pub raw_value: Vec<u8>,
    pub decoded_value: DecodedValue,
    pub children: Vec<TlvRecord>,
    pub metadata: Metadata,
    /// The length encoding to prefer when this exact record is re-serialized. `None` means
    /// "choose the minimal encoding", which is what a programmatically constructed record gets.
    pub length_encoding: Option<LengthEncoding>,
}

impl TlvRecord {
    /// The wire length of this record's value, per invariant 1.
    pub fn length(&self) -> u32 {
        self.raw_value.len() as u32
    }

    pub fn is_compound(&self) -> bool {
        !self.children.is_empty() || matches!(self.metadata.entry.value_kind, crate::value::ValueKind::Compound)
    }

    pub fn is_pad(&self) -> bool {
        self.tlv_type == crate::types::PAD_TYPE
    }

    pub fn is_end_of_data(&self) -> bool {
        self.tlv_type == crate::types::END_OF_DATA_TYPE
    }

    /// Construct a new scalar record, decoding `raw_value` via the registry-declared kind for
    /// `tlv_type`. This is the entry point external collaborators use to build top-level records
    /// from text-format user input (see the value coder for the reverse, `decode`). For a record
    /// nested under a compound TLV, use [Self::new_sub_scalar] instead: the registry's sub-TLV
    /// schema is keyed by `(parent_type, tlv_type)`, not `tlv_type` alone.
    pub fn new_scalar(tlv_type: u8, raw_value: Vec<u8>) -> Self {
        Self::scalar_with_entry(tlv_type, raw_value, registry::info(tlv_type))
    }

    /// Construct a new scalar record nested under `parent_type`, looked up via
    /// `registry::info_sub` rather than the top-level table.
    pub fn new_sub_scalar(parent_type: u8, tlv_type: u8, raw_value: Vec<u8>) -> Self {
        Self::scalar_with_entry(tlv_type, raw_value, registry::info_sub(parent_type, tlv_type))
    }

    fn scalar_with_entry(tlv_type: u8, raw_value: Vec<u8>, entry: Entry) -> Self {
        let (decoded_value, _warning) = crate::value::decode(&entry.value_kind, &raw_value);
        TlvRecord {
            tlv_type,
            raw_value,
            decoded_value,
            children: Vec::new(),
            metadata: Metadata { entry },
            length_encoding: None,
        }
    }

    /// Construct a new top-level compound record from already-built children; `raw_value` is
    /// derived by serializing the children (invariant 2). For a compound record nested under
    /// another compound TLV, use [Self::new_sub_compound] instead.
    pub fn new_compound(tlv_type: u8, children: Vec<TlvRecord>) -> Self {
        Self::compound_with_entry(tlv_type, children, registry::info(tlv_type))
    }

    /// Construct a new compound record nested under `parent_type`.
    pub fn new_sub_compound(parent_type: u8, tlv_type: u8, children: Vec<TlvRecord>) -> Self {
        Self::compound_with_entry(tlv_type, children, registry::info_sub(parent_type, tlv_type))
    }

    fn compound_with_entry(tlv_type: u8, children: Vec<TlvRecord>, entry: Entry) -> Self {
        let raw_value = crate::codec::serialize_records(&children);
        TlvRecord {
            tlv_type,
            decoded_value: DecodedValue::Raw(raw_value.clone()),
            raw_value,
            children,
            metadata: Metadata { entry },
            length_encoding: None,
        }
    }

    /// Construct a new top-level scalar record from an already-decoded value, encoding it to wire
    /// bytes via the value coder. This is the entry point external collaborators use when they
    /// have a typed value in hand (e.g. a text-format parser) rather than raw bytes. For a record
    /// nested under a compound TLV, use [Self::from_decoded_value_sub] instead.
    pub fn from_decoded_value(
        tlv_type: u8,
        decoded_value: DecodedValue,
    ) -> Result<Self, crate::error::GenerationError> {
        Self::decoded_value_with_entry(tlv_type, decoded_value, registry::info(tlv_type))
    }

    /// Construct a new scalar record nested under `parent_type` from an already-decoded value.
    pub fn from_decoded_value_sub(
        parent_type: u8,
        tlv_type: u8,
        decoded_value: DecodedValue,
    ) -> Result<Self, crate::error::GenerationError> {
        Self::decoded_value_with_entry(tlv_type, decoded_value, registry::info_sub(parent_type, tlv_type))
    }

    fn decoded_value_with_entry(
        tlv_type: u8,
        decoded_value: DecodedValue,
        entry: Entry,
    ) -> Result<Self, crate::error::GenerationError> {
        let raw_value = crate::value::encode(&decoded_value, &entry.value_kind).map_err(|_| {
            crate::error::GenerationError::new(
                crate::error::GenerationErrorKind::ValueOutOfRange {
                    value_kind: entry.value_kind.clone(),
                },
                crate::error::ErrorLocation::unknown(),
            )
        })?;
        Ok(TlvRecord {
            tlv_type,
            raw_value,
            decoded_value,
            children: Vec::new(),
            metadata: Metadata { entry },
            length_encoding: None,
        })
    }

    /// Return a new record with `raw_value` (and its decoded form) replaced. Records are
    /// immutable in principle; mutation is modeled as producing a new record.
    pub fn with_raw_value(&self, raw_value: Vec<u8>) -> Self {
        let (decoded_value, _warning) = crate::value::decode(&self.metadata.entry.value_kind, &raw_value);
        TlvRecord {
            raw_value,
            decoded_value,
            children: Vec::new(),
            length_encoding: None,
            ..self.clone()
        }
    }

    /// Append a child to a compound record, returning a new record whose `raw_value` reflects
    /// the appended child.
    pub fn with_appended_child(&self, child: TlvRecord) -> Self {
        let mut children = self.children.clone();
        children.push(child);
        let raw_value = crate::codec::serialize_records(&children);
        TlvRecord {
            raw_value: raw_value.clone(),
            decoded_value: DecodedValue::Raw(raw_value),
            children,
            length_encoding: None,
            ..self.clone()
        }
    }

    /// Find the first child of the given type, if any.
    pub fn child(&self, tlv_type: u8) -> Option<&TlvRecord> {
        self.children.iter().find(|c| c.tlv_type == tlv_type)
    }

    /// Find all children of the given type.
    pub fn children_of(&self, tlv_type: u8) -> impl Iterator<Item = &TlvRecord> {
        self.children.iter().filter(move |c| c.tlv_type == tlv_type)
    }
}

/// Structural equality: `(type, raw_value, children)` only. Metadata, which is a lookup result
/// rather than persisted state, plays no part.
impl PartialEq for TlvRecord {
    fn eq(&self, other: &Self) -> bool {
        self.tlv_type == other.tlv_type
            && self.raw_value == other.raw_value
            && self.children == other.children
    }
}

/// An ordered sequence of top-level [TlvRecord]s. Order is semantically significant (some TLVs
/// require specific ordering) and MUST be preserved through round-trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TlvTree {
    pub records: Vec<TlvRecord>,
}

impl TlvTree {
    pub fn new(records: Vec<TlvRecord>) -> Self {
        TlvTree { records }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TlvRecord> {
        self.records.iter()
    }

    pub fn first(&self, tlv_type: u8) -> Option<&TlvRecord> {
        self.records.iter().find(|r| r.tlv_type == tlv_type)
    }

    pub fn all(&self, tlv_type: u8) -> Vec<&TlvRecord> {
        self.records.iter().filter(|r| r.tlv_type == tlv_type).collect()
    }

    pub fn required(&self, tlv_type: u8) -> Result<&TlvRecord, String> {
        self.first(tlv_type)
            .ok_or_else(|| format!("required TLV {} is missing", tlv_type))
    }

    pub fn append(&self, record: TlvRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        TlvTree { records }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn structural_equality_ignores_metadata_only() {
        let a = TlvRecord::new_scalar(1, vec![0, 0, 0, 1]);
        let b = TlvRecord::new_scalar(1, vec![0, 0, 0, 1]);
        assert_eq!(a, b);
    }

    #[test]
    fn structural_equality_sees_raw_value_changes() {
        let a = TlvRecord::new_scalar(1, vec![0, 0, 0, 1]);
        let b = TlvRecord::new_scalar(1, vec![0, 0, 0, 2]);
        assert_ne!(a, b);
    }

    #[test]
    fn compound_raw_value_is_derived_from_children() {
        // Sub-TLV 2 under parent 20 (Downstream Packet Classification) is "Classifier ID", not
        // the top-level "Upstream Channel ID" that type 2 means at the top level.
        let child = TlvRecord::new_sub_scalar(20, 2, vec![5]);
        let parent = TlvRecord::new_compound(20, vec![child]);
        assert_eq!(parent.raw_value, vec![2, 1, 5]);
    }

    #[test]
    fn new_sub_scalar_uses_sub_schema_not_top_level() {
        // Type 1 at the top level is "Downstream Frequency" (Uint32); nested under parent 18 it
        // is "Service Flow Reference" (Uint16).
        let sub = TlvRecord::new_sub_scalar(18, 1, vec![0, 1]);
        assert_eq!(sub.metadata.entry.name, "Service Flow Reference");
        assert_eq!(sub.decoded_value, DecodedValue::U16(1));
    }

    #[test]
    fn from_decoded_value_sub_uses_sub_schema() {
        let sub = TlvRecord::from_decoded_value_sub(18, 1, DecodedValue::U16(7)).unwrap();
        assert_eq!(sub.raw_value, vec![0, 7]);
    }

    #[test]
    fn from_decoded_value_encodes_then_decodes_back() {
        let record = TlvRecord::from_decoded_value(2, DecodedValue::U8(5)).unwrap();
        assert_eq!(record.raw_value, vec![5]);
        assert_eq!(record.decoded_value, DecodedValue::U8(5));
    }

    #[test]
    fn from_decoded_value_rejects_mismatched_kind() {
        // TLV 2 is Uint8; a string value does not fit.
        let err = TlvRecord::from_decoded_value(2, DecodedValue::Str("x".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn tree_lookup_helpers() {
        let tree = TlvTree::new(vec![
            TlvRecord::new_scalar(1, vec![0, 0, 0, 1]),
            TlvRecord::new_scalar(2, vec![1]),
        ]);
        assert!(tree.first(1).is_some());
        assert!(tree.first(99).is_none());
        assert_eq!(tree.all(1).len(), 1);
        assert!(tree.required(2).is_ok());
        assert!(tree.required(99).is_err());
    }
}
