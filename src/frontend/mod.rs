//! Declaration front ends and configuration
//!
//! Annotation text and docstrings are turned into descriptors here; the
//! reverse direction renders documentation from signatures.

pub mod annotation;
pub mod config;
pub mod docs;
pub mod docstring;

pub use annotation::{parse_annotation, parse_def};
pub use config::{GuardConfig, Severity, SeverityOption};
pub use docs::{document, render, DocStyle};
pub use docstring::docstring_types;
