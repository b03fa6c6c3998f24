//! Error types for declaration and call-time failures

use crate::core::types::Type;
use crate::core::validator::ValidatorSpec;
use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Raised while a descriptor, record, or decorated callable is being declared
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("NotRequired[] cannot wrap Required[] (field '{field}' of {record})")]
    ConflictingModifiers { record: String, field: String },

    #[error("{record}: NotRequired field '{optional}' is declared before required field '{field}'")]
    FieldOrder { record: String, optional: String, field: String },

    #[error("{record}: duplicate field '{field}'")]
    DuplicateField { record: String, field: String },

    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldName { name: String, reason: String },

    #[error("unknown predicate '{0}' in validator annotation")]
    UnknownPredicate(String),

    #[error("cannot interpret annotation {text:?}: {message}")]
    InvalidAnnotation { text: String, message: String },

    #[error("unknown severity level {0:?}")]
    InvalidSeverity(String),

    #[error("accessor '{0}' is already defined")]
    DuplicateAccessor(String),

    #[error("{0}")]
    Malformed(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Exception a failed check is raised as
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionKind {
    TypeMismatch,
    TypeError,
    ValueError,
    AttributeError,
    Custom(String),
}

impl ExceptionKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "TypeMismatch" => ExceptionKind::TypeMismatch,
            "TypeError" => ExceptionKind::TypeError,
            "ValueError" => ExceptionKind::ValueError,
            "AttributeError" => ExceptionKind::AttributeError,
            other => ExceptionKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch => write!(f, "TypeMismatch"),
            Self::TypeError => write!(f, "TypeError"),
            Self::ValueError => write!(f, "ValueError"),
            Self::AttributeError => write!(f, "AttributeError"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// One argument that did not conform to its annotation
#[derive(Debug, Clone, PartialEq)]
pub struct ParamFailure {
    pub name: String,
    pub value: String,
    pub expected: Type,
}

/// Aggregated argument failures of one call
#[derive(Debug, Clone)]
pub struct TypeMismatch {
    pub kind: ExceptionKind,
    pub function: String,
    pub failures: Vec<ParamFailure>,
    /// Full annotation table of the callee, for diagnostics
    pub annotations: Vec<(String, Type)>,
    pub suggestions: Vec<String>,
}

impl TypeMismatch {
    pub fn new(kind: ExceptionKind, function: impl Into<String>, failures: Vec<ParamFailure>) -> Self {
        Self {
            kind,
            function: function.into(),
            failures,
            annotations: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<(String, Type)>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    /// Failed parameters as `name: expected`, comma separated
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|p| format!("{}: {}", p.name, p.expected))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Text emitted when the mismatch is reported as a warning
    pub fn warning_message(&self) -> String {
        format!("Incorrect parameters: {}", self.summary())
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Incorrect parameters: {}", self.kind, self.summary())?;
        for failure in &self.failures {
            write!(f, "\n  {}() got {} = {}", self.function, failure.name, failure.value)?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  hint: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for TypeMismatch {}

/// Predicate failure reported by the matcher; becomes a `ValidationError` at the call boundary
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateFailure {
    pub validator: Arc<ValidatorSpec>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub validator: String,
    pub value: String,
}

impl From<PredicateFailure> for ValidationError {
    fn from(failure: PredicateFailure) -> Self {
        Self {
            validator: failure.validator.predicate().to_string(),
            value: failure.value.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Argument: `{}` did not pass the validation of {}", self.value, self.validator)
    }
}

impl std::error::Error for ValidationError {}

/// Error surfaced by calling a checked callable
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error(transparent)]
    Mismatch(#[from] TypeMismatch),

    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// Bad call shape: missing, surplus, or unknown arguments
    #[error("TypeError: {0}")]
    Arguments(String),

    #[error("AttributeError: {0}")]
    Attribute(String),

    /// Raised by the callee itself
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },
}

impl CallError {
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        CallError::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Edit distance for "did you mean" suggestions
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut row = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            row[j + 1] = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b_chars.len()]
}

/// Candidates within `max_distance` edits of `target`, closest first
pub fn find_similar_names<'a, I>(target: &str, candidates: I, max_distance: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut results: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|c| (levenshtein_distance(target, c), c))
        .filter(|(dist, _)| *dist > 0 && *dist <= max_distance)
        .collect();
    results.sort();
    results.into_iter().map(|(_, name)| name.to_string()).collect()
}
