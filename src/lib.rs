//! A codec and validator for DOCSIS cable-modem configuration files.
//!
//! DOCSIS configurations are binary blobs assembled from Type-Length-Value (TLV) records, many
//! of which recursively nest sub-TLVs, encode typed scalars (integers, IP addresses, MAC
//! addresses, frequencies), or carry embedded ASN.1 blocks for PacketCable provisioning. This
//! crate is the TLV engine: a registry of TLV types across DOCSIS versions, a byte-exact binary
//! codec, a typed value coder, a semantic tree, a validator, and HMAC-MD5 message integrity
//! checks.
//!
//! It does **not** read files, talk to a cable modem or CMTS, or provide JSON/YAML/CLI
//! serialization; those are left to collaborators built on top of the [TlvTree] and [registry]
//! this crate exposes.
//!
//! # Example
//!
//! ```
//! use docsis_ttlv::{codec, registry};
//!
//! let bytes = [0x03, 0x01, 0x01, 0xFF];
//! let (tree, warnings) = codec::parse(&bytes, &codec::ParseOptions::default()).unwrap();
//! assert!(warnings.is_empty());
//! assert_eq!(tree.first(3).unwrap().decoded_value, docsis_ttlv::value::DecodedValue::U8(1));
//!
//! let out = codec::serialize(&tree, &codec::SerializeOptions::default()).unwrap();
//! assert_eq!(out, bytes);
//!
//! // Validation flags the missing required Downstream Frequency TLV but nothing else.
//! let issues = docsis_ttlv::validate::validate(&tree, registry::Version::V3_1);
//! assert_eq!(issues.len(), 1);
//! assert_eq!(issues[0].code, "MISSING_REQUIRED_TLV");
//! ```

pub mod asn1;
pub mod codec;
pub mod error;
pub mod mic;
pub mod registry;
pub mod tree;
pub mod types;
pub mod validate;
pub mod value;

pub use codec::{parse, serialize, ParseOptions, ParseWarning, SerializeOptions};
pub use error::{GenerationError, MicError, ParseError};
pub use mic::{compute_cm_mic, compute_cmts_mic, verify as verify_mic};
pub use registry::Version;
pub use tree::{TlvRecord, TlvTree};
pub use validate::{validate, Severity, ValidationIssue};
