//! Error types for protodyn.

use thiserror::Error;

use crate::value::MessageValue;

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a buffer was rejected as malformed.
///
/// `Malformed` covers structural violations of the wire format itself;
/// truncation (running out of bytes mid-value) is a separate kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    /// A varint ran past its 10-byte maximum or overflowed 64 bits.
    InvalidVarint,
    /// A wire type outside 0..=5, or a group marker where a payload type was
    /// required.
    InvalidWireType(u8),
    /// A field key decoded to tag 0 or a tag above 2^29-1.
    TagOutOfRange(u32),
    /// A `string` field held invalid UTF-8.
    InvalidUtf8,
    /// A length prefix exceeded platform addressable memory.
    LengthOverflow(u64),
    /// Message/group nesting exceeded the hard recursion limit.
    NestingTooDeep,
}

impl std::fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedKind::InvalidVarint => write!(f, "invalid varint"),
            MalformedKind::InvalidWireType(value) => write!(f, "invalid wire type {value}"),
            MalformedKind::TagOutOfRange(tag) => write!(f, "tag {tag} out of range"),
            MalformedKind::InvalidUtf8 => write!(f, "invalid UTF-8 in string field"),
            MalformedKind::LengthOverflow(len) => {
                write!(f, "length prefix {len} exceeds addressable memory")
            }
            MalformedKind::NestingTooDeep => write!(f, "message nesting too deep"),
        }
    }
}

/// Crate-wide error type.
///
/// Decode errors (`Truncated`, `Malformed`, `Protocol`) carry the byte offset
/// at which decoding failed; the reader's cursor is left at that position.
#[derive(Error, Debug)]
pub enum Error {
    /// Unexpected end of input.
    #[error("truncated input at offset {offset}")]
    Truncated {
        /// Byte offset of the failing read.
        offset: usize,
    },

    /// Structurally invalid wire data.
    #[error("malformed input at offset {offset}: {kind}")]
    Malformed {
        /// Byte offset of the failing read.
        offset: usize,
        /// What was wrong with the bytes.
        kind: MalformedKind,
    },

    /// Schema contract violation during decode, most commonly a missing
    /// required field. Carries the partially-decoded instance for diagnosis.
    #[error("{message}")]
    Protocol {
        /// Human-readable description, e.g. `missing required 'b'`.
        message: String,
        /// The partially-decoded message at the point of failure.
        instance: Box<MessageValue>,
    },

    /// A symbolic type name failed to resolve.
    #[error("unresolved reference '{name}' in {scope}")]
    UnresolvedReference {
        /// The name as declared.
        name: String,
        /// Fully-qualified name of the declaring scope.
        scope: String,
    },

    /// `resolve_all` finished with extension fields still deferred.
    #[error("unresolvable extensions: {0}")]
    UnresolvableExtensions(String),

    /// A map field declared a key type that protobuf does not permit.
    #[error("invalid map key type '{key_type}' for field '{field}'")]
    InvalidMapKey {
        /// The declared key type name.
        key_type: String,
        /// Fully-qualified field name.
        field: String,
    },

    /// Two sibling schema nodes shared a name.
    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName {
        /// The colliding name.
        name: String,
        /// Fully-qualified name of the parent namespace.
        scope: String,
    },

    /// The fetch collaborator failed to produce a source.
    #[error("failed to fetch '{path}': {reason}")]
    Fetch {
        /// The resolved path that was requested.
        path: String,
        /// Collaborator-provided failure description.
        reason: String,
    },

    /// The parse collaborator (or the JSON ingestion path) rejected a source.
    #[error("failed to parse '{file}': {reason}")]
    Parse {
        /// Filename the source was fetched under.
        file: String,
        /// Collaborator-provided failure description.
        reason: String,
    },

    /// The requested operation is unavailable in this configuration.
    #[error("not supported: {0}")]
    NotSupported(&'static str),
}

impl Error {
    /// Create a truncation error at the given offset.
    pub fn truncated(offset: usize) -> Self {
        Error::Truncated { offset }
    }

    /// Create a malformed-input error at the given offset.
    pub fn malformed(offset: usize, kind: MalformedKind) -> Self {
        Error::Malformed { offset, kind }
    }

    /// Create a missing-required-field error carrying the partial instance.
    pub fn missing_required(field: &str, instance: MessageValue) -> Self {
        Error::Protocol {
            message: format!("missing required '{field}'"),
            instance: Box::new(instance),
        }
    }

    /// Create a fetch error.
    pub fn fetch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Fetch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// True for `Truncated`.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Error::Truncated { .. })
    }
}
