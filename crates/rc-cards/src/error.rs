// error.rs — Error types for Rule Card validation and loading.

use std::path::PathBuf;

use thiserror::Error;

/// The specific schema rule a field broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("the file is not valid YAML: {message}")]
    ParseFailed { message: String },

    #[error("required field is missing")]
    MissingField,

    #[error("expected {expected}")]
    WrongType { expected: &'static str },

    #[error("value must not be empty")]
    EmptyValue,

    #[error("list must contain at least one entry")]
    EmptyList,

    #[error("'{value}' does not match CATEGORY-SUBCATEGORY-NNN (e.g. AUTH-PW-001)")]
    InvalidIdPattern { value: String },

    #[error("length {actual} is outside the allowed range {}", range_text(*.min, *.max))]
    LengthOutOfRange {
        min: usize,
        max: Option<usize>,
        actual: usize,
    },

    #[error("'{value}' is not one of: {}", .allowed.join(", "))]
    InvalidEnumValue {
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("unknown field (allowed: {})", .allowed.join(", "))]
    UnknownField { allowed: &'static [&'static str] },

    #[error("value must not contain whitespace")]
    ContainsWhitespace,

    #[error("key '{name}' appears more than once (after trimming whitespace)")]
    DuplicateKey { name: String },
}

fn range_text(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) => format!("{}..={}", min, max),
        None => format!("{}..", min),
    }
}

/// One field-level schema failure in one file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: field `{field}`: {kind}", .path.display())]
pub struct SchemaViolation {
    pub path: PathBuf,
    /// Dotted field path, e.g. `verify.tests` or `detect.semgrep`.
    pub field: String,
    pub kind: ViolationKind,
}

/// Errors that can occur while validating and loading Rule Cards.
#[derive(Debug, Error)]
pub enum CardError {
    /// A card or the rules directory could not be read.
    #[error("I/O error at {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A card failed schema validation. The card is rejected as a whole.
    #[error("{} rejected with {} schema violation(s)", .path.display(), .violations.len())]
    Schema {
        path: PathBuf,
        violations: Vec<SchemaViolation>,
    },

    /// Two cards share an id.
    #[error("duplicate rule id '{id}' in {} and {}", .first.display(), .second.display())]
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A discovery pattern could not be compiled.
    #[error("invalid discovery pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Failed to produce the canonical form of a card.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CardError {
    /// The file this error is about, when there is a single one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            CardError::IoError { path, .. } | CardError::Schema { path, .. } => Some(path),
            CardError::DuplicateId { second, .. } => Some(second),
            CardError::InvalidPattern { .. } | CardError::SerializationError(_) => None,
        }
    }
}
