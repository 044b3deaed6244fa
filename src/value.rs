//! The value coder: maps wire bytes to human-editable decoded values and back, per the
//! [ValueKind] declared by a TLV's [crate::registry] entry.
//!
//! Mirrors the teacher crate's `SerializableTtlvType` split between fixed-length scalars
//! (`TtlvInteger`, `TtlvBoolean`, ...) and variable-length ones (`TtlvTextString`,
//! `TtlvByteString`), but keyed by DOCSIS's value kinds instead of KMIP's item types, and with a
//! decode path that degrades to raw bytes plus a warning instead of failing outright.

use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::asn1::{self, Asn1Node};

/// The finite set of scalar value kinds a TLV's registry entry may declare.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Uint8,
    Uint16,
    Uint32,
    String,
    Ipv4,
    Ipv6,
    Mac,
    HexBytes,
    /// A one-byte value interpreted through a label table; values outside the table keep the
    /// raw integer with a decode warning rather than failing.
    Enum(&'static [(u8, &'static str)]),
    /// The TLV is compound; its value is a stream of sub-TLVs, decoded by the codec rather than
    /// this module. Present here so [crate::registry::Entry] can describe it uniformly.
    Compound,
    /// PacketCable ASN.1 DER payload (TLV 64).
    Asn1,
}

/// A decoded TLV value, or the raw bytes when decoding was not possible or not applicable.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedValue {
    U8(u8),
    U16(u16),
    U32(u32),
    Str(String),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Mac([u8; 6]),
    Hex(String),
    Enum { value: u8, label: Option<&'static str> },
    Asn1(Asn1Node),
    /// Raw bytes kept as-is: used for compound TLVs (whose decoded form is their children, held
    /// by the tree rather than here) and for any scalar whose bytes did not fit its kind.
    Raw(Vec<u8>),
}

/// Emitted by [decode] when the wire bytes do not cleanly match the declared [ValueKind]. The
/// overall parse is never failed because of this; [DecodedValue::Raw] is substituted instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeWarning(pub String);

/// Decode `raw` according to `kind`. Never fails: on a mismatch, returns `DecodedValue::Raw(raw)`
/// plus a [DecodeWarning] describing why.
pub fn decode(kind: &ValueKind, raw: &[u8]) -> (DecodedValue, Option<DecodeWarning>) {
    match kind {
        ValueKind::Uint8 => match <[u8; 1]>::try_from(raw) {
            Ok(b) => (DecodedValue::U8(b[0]), None),
            Err(_) => wrong_length(raw, 1),
        },
        ValueKind::Uint16 => match <[u8; 2]>::try_from(raw) {
            Ok(b) => (DecodedValue::U16(u16::from_be_bytes(b)), None),
            Err(_) => wrong_length(raw, 2),
        },
        ValueKind::Uint32 => match <[u8; 4]>::try_from(raw) {
            Ok(b) => (DecodedValue::U32(u32::from_be_bytes(b)), None),
            Err(_) => wrong_length(raw, 4),
        },
        ValueKind::String => match std::str::from_utf8(strip_nul(raw)) {
            Ok(s) => (DecodedValue::Str(s.to_string()), None),
            Err(e) => (
                DecodedValue::Raw(raw.to_vec()),
                Some(DecodeWarning(format!("invalid UTF-8 in string value: {}", e))),
            ),
        },
        ValueKind::Ipv4 => match <[u8; 4]>::try_from(raw) {
            Ok(b) => (DecodedValue::Ipv4(Ipv4Addr::from(b)), None),
            Err(_) => wrong_length(raw, 4),
        },
        ValueKind::Ipv6 => match <[u8; 16]>::try_from(raw) {
            Ok(b) => (DecodedValue::Ipv6(Ipv6Addr::from(b)), None),
            Err(_) => wrong_length(raw, 16),
        },
        ValueKind::Mac => match <[u8; 6]>::try_from(raw) {
            Ok(b) => (DecodedValue::Mac(b), None),
            Err(_) => wrong_length(raw, 6),
        },
        ValueKind::HexBytes => (DecodedValue::Hex(to_hex(raw)), None),
        ValueKind::Enum(table) => match <[u8; 1]>::try_from(raw) {
            Ok(b) => {
                let label = table.iter().find(|(v, _)| *v == b[0]).map(|(_, l)| *l);
                let warning = if label.is_none() {
                    Some(DecodeWarning(format!(
                        "value {} is not in the enum table",
                        b[0]
                    )))
                } else {
                    None
                };
                (
                    DecodedValue::Enum {
                        value: b[0],
                        label,
                    },
                    warning,
                )
            }
            Err(_) => wrong_length(raw, 1),
        },
        ValueKind::Compound => (DecodedValue::Raw(raw.to_vec()), None),
        ValueKind::Asn1 => match asn1::parse(raw) {
            Ok(node) => (DecodedValue::Asn1(node), None),
            Err(e) => (
                DecodedValue::Hex(to_hex(raw)),
                Some(DecodeWarning(format!("ASN.1 decode failed, degraded to hex: {:?}", e))),
            ),
        },
    }
}

fn wrong_length(raw: &[u8], expected: usize) -> (DecodedValue, Option<DecodeWarning>) {
    (
        DecodedValue::Raw(raw.to_vec()),
        Some(DecodeWarning(format!(
            "expected {} byte(s), got {}",
            expected,
            raw.len()
        ))),
    )
}

fn strip_nul(raw: &[u8]) -> &[u8] {
    match raw.split_last() {
        Some((0, rest)) => rest,
        _ => raw,
    }
}

fn to_hex(raw: &[u8]) -> String {
    let mut s = String::with_capacity(2 + raw.len() * 2);
    s.push_str("0x");
    for b in raw {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Encode `value` back to wire bytes for the given `kind`. Length constraints are enforced here
/// and surface as [crate::error::GenerationError] at the call site.
pub fn encode(value: &DecodedValue, kind: &ValueKind) -> Result<Vec<u8>, String> {
    match (kind, value) {
        (ValueKind::Uint8, DecodedValue::U8(v)) => Ok(vec![*v]),
        (ValueKind::Uint16, DecodedValue::U16(v)) => Ok(v.to_be_bytes().to_vec()),
        (ValueKind::Uint32, DecodedValue::U32(v)) => Ok(v.to_be_bytes().to_vec()),
        (ValueKind::String, DecodedValue::Str(s)) => Ok(s.as_bytes().to_vec()),
        (ValueKind::Ipv4, DecodedValue::Ipv4(a)) => Ok(a.octets().to_vec()),
        (ValueKind::Ipv6, DecodedValue::Ipv6(a)) => Ok(a.octets().to_vec()),
        (ValueKind::Mac, DecodedValue::Mac(b)) => Ok(b.to_vec()),
        (ValueKind::HexBytes, DecodedValue::Hex(s)) => {
            hex::decode(s.trim_start_matches("0x")).map_err(|e| e.to_string())
        }
        (ValueKind::Enum(_), DecodedValue::Enum { value, .. }) => Ok(vec![*value]),
        (ValueKind::Asn1, DecodedValue::Asn1(node)) => Ok(asn1::encode(node)),
        // Raw bytes always re-encode to themselves regardless of declared kind: this is how a
        // scalar that failed to decode (or a compound TLV's opaque value) round-trips.
        (_, DecodedValue::Raw(bytes)) => Ok(bytes.clone()),
        (kind, value) => Err(format!(
            "decoded value {:?} does not match declared kind {:?}",
            value, kind
        )),
    }
}
