//! The error taxonomy returned by the codec, value coder and MIC engine.
//!
//! Following the teacher crate's split: an [ErrorLocation] (byte offset and/or TLV path)
//! describes *where* something went wrong, separately from the error variant describing *what*
//! went wrong, because low-level (de)serialization code often does not have the surrounding
//! context needed to name a location and relies on a caller higher up the call stack to attach it.

use std::fmt::Display;

use crate::types::{ByteOffset, TlvPath};
use crate::value::ValueKind;

// --- ErrorLocation ----------------------------------------------------------------------------

/// Where in the data (or the tree) a [ParseError] or [GenerationError] occurred.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    offset: Option<ByteOffset>,
    path: Option<TlvPath>,
}

impl ErrorLocation {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn at_offset<O: Into<ByteOffset>>(offset: O) -> Self {
        Self {
            offset: Some(offset.into()),
            path: None,
        }
    }

    pub fn at_path(path: TlvPath) -> Self {
        Self {
            offset: None,
            path: Some(path),
        }
    }

    pub fn with_offset<O: Into<ByteOffset>>(mut self, offset: O) -> Self {
        self.offset.get_or_insert(offset.into());
        self
    }

    pub fn with_path(mut self, path: TlvPath) -> Self {
        self.path.get_or_insert(path);
        self
    }

    pub fn offset(&self) -> Option<ByteOffset> {
        self.offset
    }

    pub fn path(&self) -> Option<&TlvPath> {
        self.path.as_ref()
    }
}

impl Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.offset, &self.path) {
            (None, None) => f.write_str("unknown"),
            (Some(o), None) => write!(f, "offset {}", o),
            (None, Some(p)) => write!(f, "tlv {}", p),
            (Some(o), Some(p)) => write!(f, "offset {}, tlv {}", o, p),
        }
    }
}

// --- ParseError ---------------------------------------------------------------------------------

/// A fatal error encountered while parsing a byte stream into a tree. No partial tree is
/// returned; recoverable problems (an unparseable sub-TLV, a scalar with the wrong length) are
/// represented as [crate::codec::ParseWarning]s alongside a successful result instead.
#[derive(Debug)]
#[non_exhaustive]
pub struct ParseError {
    kind: ParseErrorKind,
    location: ErrorLocation,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, location: ErrorLocation) -> Self {
        Self { kind, location }
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    pub fn location(&self) -> &ErrorLocation {
        &self.location
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {} (at {})", self.kind, self.location)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Input ended before a complete TLV header or value could be read.
    UnexpectedEof { expected_bytes: u32, got_bytes: u32 },
    /// The length field's encoding byte(s) were not one of the three recognized forms.
    InvalidLengthEncoding,
    /// Sub-TLV recursion exceeded the configured nesting cap.
    NestingTooDeep { limit: u32 },
    Io(std::io::Error),
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::UnexpectedEof {
                expected_bytes,
                got_bytes,
            } => write!(
                f,
                "unexpected end of input: expected {} more bytes, got {}",
                expected_bytes, got_bytes
            ),
            ParseErrorKind::InvalidLengthEncoding => write!(f, "invalid length encoding"),
            ParseErrorKind::NestingTooDeep { limit } => {
                write!(f, "sub-TLV nesting exceeds limit of {}", limit)
            }
            ParseErrorKind::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<crate::types::Error> for ParseErrorKind {
    fn from(e: crate::types::Error) -> Self {
        match e {
            crate::types::Error::Io(e) => ParseErrorKind::Io(e),
            crate::types::Error::UnexpectedEof => ParseErrorKind::UnexpectedEof {
                expected_bytes: 0,
                got_bytes: 0,
            },
            crate::types::Error::InvalidLengthEncoding => ParseErrorKind::InvalidLengthEncoding,
            crate::types::Error::LengthEncodingOverflow => ParseErrorKind::InvalidLengthEncoding,
        }
    }
}

// --- GenerationError -----------------------------------------------------------------------------

/// A tree cannot be serialized, e.g. a scalar's decoded value does not fit its declared
/// [ValueKind] or a length no longer fits the recorded [crate::types::LengthEncoding].
#[derive(Debug)]
#[non_exhaustive]
pub struct GenerationError {
    kind: GenerationErrorKind,
    location: ErrorLocation,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, location: ErrorLocation) -> Self {
        Self { kind, location }
    }

    pub fn kind(&self) -> &GenerationErrorKind {
        &self.kind
    }

    pub fn location(&self) -> &ErrorLocation {
        &self.location
    }
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "generation error: {} (at {})", self.kind, self.location)
    }
}

impl std::error::Error for GenerationError {}

#[derive(Debug)]
#[non_exhaustive]
pub enum GenerationErrorKind {
    ValueOutOfRange { value_kind: ValueKind },
    LengthEncodingOverflow,
    Io(std::io::Error),
}

impl Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationErrorKind::ValueOutOfRange { value_kind } => {
                write!(f, "value does not fit declared kind {:?}", value_kind)
            }
            GenerationErrorKind::LengthEncodingOverflow => {
                write!(f, "value length does not fit the recorded length encoding")
            }
            GenerationErrorKind::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

// --- MicError -------------------------------------------------------------------------------------

/// Which of the two MIC TLVs an operation concerns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MicWhich {
    CmMic,
    CmtsMic,
}

impl Display for MicWhich {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicWhich::CmMic => write!(f, "CM-MIC"),
            MicWhich::CmtsMic => write!(f, "CMTS-MIC"),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum MicError {
    Missing { which: MicWhich },
    Mismatch { which: MicWhich },
}

impl Display for MicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicError::Missing { which } => write!(f, "{} TLV is missing", which),
            MicError::Mismatch { which } => write!(f, "{} digest does not match", which),
        }
    }
}

impl std::error::Error for MicError {}
