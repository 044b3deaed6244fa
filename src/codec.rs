//! The binary codec: parses a DOCSIS byte stream into a [TlvTree], and serializes a tree back to
//! bytes such that `serialize(parse(bytes)) == bytes` for any input that parsed without
//! warnings (the round-trip invariant).

use std::io::{Cursor, Read};

use tracing::warn;

use crate::error::{ErrorLocation, GenerationError, GenerationErrorKind, ParseError, ParseErrorKind};
use crate::registry::{self, Version};
use crate::tree::{Metadata, TlvRecord, TlvTree};
use crate::types::{self, ByteOffset, LengthEncoding, TlvPath, END_OF_DATA_TYPE, PAD_TYPE};
use crate::value::{self, DecodedValue};

/// Cap on sub-TLV recursion depth, guarding against pathologically nested crafted input. DOCSIS
/// configurations are bounded to 64 KB so unbounded recursion isn't reachable from well-formed
/// data, but a crafted file could still nest shallow TLVs arbitrarily deep.
pub const DEFAULT_MAX_NESTING_DEPTH: u32 = 32;

#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Hint used only to annotate warnings; validation against a target version happens in
    /// `crate::validate`, not here.
    pub docsis_version: Option<Version>,
    pub max_nesting_depth: u32,
    /// Gates the informally-reported vendor 2-byte length encoding (see the design notes' open
    /// question). Off by default.
    pub enable_vendor_two_byte_length: bool,
    /// Whether to attempt sub-TLV parsing of a vendor (200-253) TLV's value even though the
    /// registry has no compound hint for it. Off by default: vendor TLVs are preserved as bytes
    /// unless the caller opts in.
    pub parse_vendor_as_compound: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            docsis_version: None,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            enable_vendor_two_byte_length: false,
            parse_vendor_as_compound: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SerializeOptions {
    /// When true, recompute the minimal length encoding for every record rather than reusing the
    /// encoding recorded at parse time. Defaults to false: a record round-trips with the exact
    /// length form it was parsed with, which is what the round-trip invariant requires.
    pub prefer_minimal_length_encoding: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            prefer_minimal_length_encoding: false,
        }
    }
}

/// A non-fatal annotation produced during parsing: a sub-TLV that could not be parsed and was
/// preserved as opaque bytes instead, or a scalar whose bytes did not match its declared kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseWarning {
    pub path: TlvPath,
    pub message: String,
}

struct Cursor2<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> Cursor2<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor2 { cur: Cursor::new(bytes) }
    }

    fn offset(&self) -> u64 {
        self.cur.position()
    }

    fn remaining(&self) -> usize {
        let pos = self.cur.position() as usize;
        self.cur.get_ref().len().saturating_sub(pos)
    }
}

/// Parse `bytes` into an ordered sequence of top-level records. Returns the tree plus any
/// non-fatal [ParseWarning]s; a [ParseError] aborts the entire parse with no partial tree.
pub fn parse(bytes: &[u8], options: &ParseOptions) -> Result<(TlvTree, Vec<ParseWarning>), ParseError> {
    let mut warnings = Vec::new();
    let records = parse_records(bytes, None, 0, options, &mut warnings)?;
    Ok((TlvTree::new(records), warnings))
}

fn parse_records(
    bytes: &[u8],
    parent_path: Option<&TlvPath>,
    depth: u32,
    options: &ParseOptions,
    warnings: &mut Vec<ParseWarning>,
) -> Result<Vec<TlvRecord>, ParseError> {
    if depth > options.max_nesting_depth {
        return Err(ParseError::new(
            ParseErrorKind::NestingTooDeep {
                limit: options.max_nesting_depth,
            },
            ErrorLocation::unknown(),
        ));
    }

    let mut cursor = Cursor2::new(bytes);
    let mut records = Vec::new();

    while cursor.remaining() > 0 {
        let start_offset = cursor.offset();
        let tlv_type = types::read_type(&mut cursor.cur)
            .map_err(|e| parse_err(e, start_offset))?;

        if tlv_type == END_OF_DATA_TYPE {
            records.push(end_of_data_record());
            break;
        }

        if tlv_type == PAD_TYPE {
            records.push(pad_record());
            continue;
        }

        let path = match parent_path {
            Some(p) => p.child(tlv_type),
            None => TlvPath::root(tlv_type),
        };

        let is_vendor = types::is_vendor_type(tlv_type);
        let (length, encoding) = types::read_length(
            &mut cursor.cur,
            is_vendor,
            options.enable_vendor_two_byte_length,
        )
        .map_err(|e| parse_err(e, cursor.offset()))?;

        if cursor.remaining() < length as usize {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedEof {
                    expected_bytes: length,
                    got_bytes: cursor.remaining() as u32,
                },
                ErrorLocation::at_offset(cursor.offset()).with_path(path),
            ));
        }

        let mut raw_value = vec![0u8; length as usize];
        cursor
            .cur
            .read_exact(&mut raw_value)
            .map_err(|e| parse_err(e.into(), cursor.offset()))?;

        // A non-root path's last element is the immediate parent this record nests under; the
        // registry's sub-TLV schema (§4.A's `(parent_type, sub_tlv_type, version)` lookup) only
        // applies one level down, so this is always the correct key even past depth 1.
        let entry = match parent_path.and_then(|p| p.0.last().copied()) {
            Some(parent_type) => registry::info_sub(parent_type, tlv_type),
            None => registry::info(tlv_type),
        };
        let wants_compound = matches!(entry.value_kind, crate::value::ValueKind::Compound)
            || (is_vendor && options.parse_vendor_as_compound);

        let (children, decoded_value) = if wants_compound {
            match parse_records(&raw_value, Some(&path), depth + 1, options, warnings) {
                Ok(children) => {
                    let decoded = DecodedValue::Raw(raw_value.clone());
                    (children, decoded)
                }
                // Exceeding the nesting cap is a hard failure, not a recoverable one: it exists
                // to bound recursion, so swallowing it here would defeat the purpose.
                Err(e) if matches!(e.kind(), ParseErrorKind::NestingTooDeep { .. }) => {
                    return Err(e);
                }
                Err(_) => {
                    let message = "sub-TLV parse failed; preserved as opaque bytes".to_string();
                    warn!(tlv_path = %path, "{}", message);
                    warnings.push(ParseWarning { path: path.clone(), message });
                    (Vec::new(), DecodedValue::Raw(raw_value.clone()))
                }
            }
        } else {
            let (decoded, warning) = value::decode(&entry.value_kind, &raw_value);
            if let Some(w) = warning {
                warn!(tlv_path = %path, "{}", w.0);
                warnings.push(ParseWarning {
                    path: path.clone(),
                    message: w.0,
                });
            }
            (Vec::new(), decoded)
        };

        records.push(TlvRecord {
            tlv_type,
            raw_value,
            decoded_value,
            children,
            metadata: Metadata { entry },
            length_encoding: Some(encoding),
        });
    }

    Ok(records)
}

fn parse_err(e: types::Error, offset: u64) -> ParseError {
    ParseError::new(e.into(), ErrorLocation::at_offset(ByteOffset(offset)))
}

fn pad_record() -> TlvRecord {
    TlvRecord {
        tlv_type: PAD_TYPE,
        raw_value: Vec::new(),
        decoded_value: DecodedValue::Raw(Vec::new()),
        children: Vec::new(),
        metadata: Metadata {
            entry: registry::info(PAD_TYPE),
        },
        length_encoding: None,
    }
}

fn end_of_data_record() -> TlvRecord {
    TlvRecord {
        tlv_type: END_OF_DATA_TYPE,
        raw_value: Vec::new(),
        decoded_value: DecodedValue::Raw(Vec::new()),
        children: Vec::new(),
        metadata: Metadata {
            entry: registry::info(END_OF_DATA_TYPE),
        },
        length_encoding: None,
    }
}

/// Serialize a tree back to bytes, respecting `options`.
pub fn serialize(tree: &TlvTree, options: &SerializeOptions) -> Result<Vec<u8>, GenerationError> {
    serialize_records_with_options(&tree.records, options)
}

fn serialize_records_with_options(
    records: &[TlvRecord],
    options: &SerializeOptions,
) -> Result<Vec<u8>, GenerationError> {
    let mut out = Vec::new();
    for record in records {
        serialize_record_into(record, options, &mut out)?;
    }
    Ok(out)
}

fn serialize_record_into(
    record: &TlvRecord,
    options: &SerializeOptions,
    out: &mut Vec<u8>,
) -> Result<(), GenerationError> {
    types::write_type(out, record.tlv_type).map_err(io_err)?;

    if record.tlv_type == PAD_TYPE || record.tlv_type == END_OF_DATA_TYPE {
        return Ok(());
    }

    let value_bytes = if !record.children.is_empty() {
        serialize_records_with_options(&record.children, options)?
    } else {
        record.raw_value.clone()
    };

    let encoding = if options.prefer_minimal_length_encoding {
        LengthEncoding::minimal_for(value_bytes.len() as u32)
    } else {
        record
            .length_encoding
            .unwrap_or_else(|| LengthEncoding::minimal_for(value_bytes.len() as u32))
    };

    types::write_length(out, value_bytes.len() as u32, encoding).map_err(|e| {
        GenerationError::new(
            length_encoding_error(e),
            ErrorLocation::unknown(),
        )
    })?;
    out.extend_from_slice(&value_bytes);
    Ok(())
}

fn length_encoding_error(e: types::Error) -> GenerationErrorKind {
    match e {
        types::Error::LengthEncodingOverflow => GenerationErrorKind::LengthEncodingOverflow,
        types::Error::Io(e) => GenerationErrorKind::Io(e),
        _ => GenerationErrorKind::LengthEncodingOverflow,
    }
}

fn io_err(e: types::Error) -> GenerationError {
    match e {
        types::Error::Io(e) => GenerationError::new(GenerationErrorKind::Io(e), ErrorLocation::unknown()),
        _ => GenerationError::new(GenerationErrorKind::LengthEncodingOverflow, ErrorLocation::unknown()),
    }
}

/// Serialize a set of sibling records using minimal length encodings, with no preserved-encoding
/// option. Used by [crate::tree::TlvRecord::new_compound] and friends to derive a compound
/// record's `raw_value` from freshly constructed children.
pub(crate) fn serialize_records(records: &[TlvRecord]) -> Vec<u8> {
    serialize_records_with_options(records, &SerializeOptions {
        prefer_minimal_length_encoding: true,
    })
    .expect("minimal length encoding never overflows")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn basic_network_access_tlv() {
        let bytes = [0x03, 0x01, 0x01, 0xFF];
        let (tree, warnings) = parse(&bytes, &ParseOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(tree.records.len(), 2);
        assert_eq!(tree.records[0].tlv_type, 3);
        assert_eq!(tree.records[0].raw_value, vec![1]);
        assert_eq!(tree.records[1].tlv_type, 255);

        let out = serialize(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn nested_service_flow() {
        let bytes = [0x12, 0x06, 0x01, 0x02, 0x00, 0x01, 0x07, 0x01];
        let (tree, warnings) = parse(&bytes, &ParseOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(tree.records.len(), 1);
        let root = &tree.records[0];
        assert_eq!(root.tlv_type, 18);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].tlv_type, 1);
        assert_eq!(root.children[0].raw_value, vec![0, 1]);
        // Sub-TLV 1 under parent 18 is "Service Flow Reference" (Uint16), not the top-level
        // "Downstream Frequency" (Uint32) that type 1 means at the root.
        assert_eq!(root.children[0].metadata.entry.name, "Service Flow Reference");
        assert_eq!(root.children[0].decoded_value, DecodedValue::U16(1));
        assert_eq!(root.children[1].tlv_type, 7);
        assert_eq!(root.children[1].raw_value, vec![1]);

        let out = serialize(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn extended_length_round_trips() {
        let mut bytes = vec![0xC9, 0xFF, 0x02, 0x01, 0x00];
        bytes.extend(std::iter::repeat(0xAAu8).take(256));
        bytes.push(0xFF);
        let (tree, warnings) = parse(&bytes, &ParseOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(tree.records[0].tlv_type, 201);
        assert_eq!(tree.records[0].raw_value.len(), 256);

        let out = serialize(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn unknown_tlv_preserved() {
        let bytes = [0xFA, 0x03, 0xDE, 0xAD, 0xBE, 0xFF];
        let (tree, _warnings) = parse(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(tree.records[0].tlv_type, 250);
        assert_eq!(tree.records[0].raw_value, vec![0xDE, 0xAD, 0xBE]);
        assert_eq!(tree.records[0].metadata.entry.name, "Unknown TLV 250");
        match &tree.records[0].decoded_value {
            DecodedValue::Hex(_) | DecodedValue::Raw(_) => {}
            other => panic!("expected hex or raw decode, got {:?}", other),
        }

        let out = serialize(&tree, &SerializeOptions::default()).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn empty_input_is_empty_tree() {
        let (tree, warnings) = parse(&[], &ParseOptions::default()).unwrap();
        assert!(tree.records.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn lone_end_of_data_is_empty_tree() {
        let (tree, _warnings) = parse(&[0xFF], &ParseOptions::default()).unwrap();
        assert_eq!(tree.records.len(), 1);
        assert_eq!(tree.records[0].tlv_type, 255);
    }

    #[test]
    fn trailing_bytes_after_end_of_data_are_ignored() {
        let bytes = [0xFF, 0x01, 0x02, 0x03];
        let (tree, _) = parse(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(tree.records.len(), 1);
    }

    #[test]
    fn unexpected_eof_is_fatal() {
        let bytes = [0x03, 0x05, 0x01];
        let err = parse(&bytes, &ParseOptions::default()).unwrap_err();
        assert_matches!(err.kind(), ParseErrorKind::UnexpectedEof { .. });
    }

    #[test]
    fn vendor_compound_looking_body_preserved_unless_opted_in() {
        // Vendor TLV 210 whose body happens to look like a single nested TLV (type 1, length 4,
        // value 0x00000005).
        let bytes = [210, 6, 1, 4, 0, 0, 0, 5];
        let (tree, warnings) = parse(&bytes, &ParseOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert!(tree.records[0].children.is_empty());
        assert_eq!(tree.records[0].raw_value, vec![1, 4, 0, 0, 0, 5]);

        let opts = ParseOptions {
            parse_vendor_as_compound: true,
            ..ParseOptions::default()
        };
        let (tree, warnings) = parse(&bytes, &opts).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(tree.records[0].children.len(), 1);
    }

    #[test]
    fn nesting_too_deep_is_rejected() {
        // 40 levels of TLV 17 (a registered compound type) nested inside one another.
        let mut bytes: Vec<u8> = Vec::new();
        for _ in 0..40 {
            let mut v = vec![17u8, bytes.len() as u8];
            v.extend(bytes);
            bytes = v;
        }
        let err = parse(&bytes, &ParseOptions::default()).unwrap_err();
        assert_matches!(err.kind(), ParseErrorKind::NestingTooDeep { .. });
    }
}
