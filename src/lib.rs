//! Runtime annotation checking for Python-style callables.
//!
//! A callable declares its parameters with type descriptors (built directly
//! or parsed from annotation text). Wrapping it with [`validate`] checks every
//! call against those descriptors before the body runs, raising, warning or
//! staying silent depending on the configured severity.
//!
//! ```no_run
//! use typthon_guard::{validate, CallArgs, Function, GuardOptions, Value};
//!
//! let add = Function::from_source("def add(a: int, b: int) -> int: ...", |args| {
//!     let a = args.get(0).and_then(Value::as_int).unwrap_or(0);
//!     let b = args.get(1).and_then(Value::as_int).unwrap_or(0);
//!     Ok(Value::Int(a + b))
//! })?;
//! let add = validate(add, GuardOptions::default())?;
//! assert!(add.call(&CallArgs::positional([Value::Int(1), Value::str("2")])).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod core;
pub mod errors;
pub mod frontend;
pub mod infrastructure;
pub mod performance;
pub mod runtime;

pub use crate::analysis::{CategoryMatcher, MatchContext, TypeMatcher};
pub use crate::core::{ClassSchema, Predicate, RecordSchema, Type, TypeContext, ValidatorSpec, Value};
pub use crate::errors::{CallError, DeclarationError, ExceptionKind, TypeMismatch, ValidationError};
pub use crate::frontend::{parse_annotation, DocStyle, GuardConfig, Severity, SeverityOption};
pub use crate::infrastructure::{init_logging, LogConfig};
pub use crate::performance::{CachedDict, CachedSet};
pub use crate::runtime::{
    catch_warnings, validate, validate_class, CallArgs, CheckedClass, CheckedFunction, ClassDef, Function,
    GuardOptions, Param, ParamKind, PropertyBuilder, Signature, TypedTuple,
};
