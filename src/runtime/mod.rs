//! Checked callables and the conveniences built on them

pub mod class;
pub mod function;
pub mod guard;
pub mod property;
pub mod typed_tuple;
pub mod warnings;

pub use class::{validate_class, validate_class_with, CheckedClass, ClassDef, ClassShape, DataField, MethodKind};
pub use function::{BoundMethod, CallArgs, Function, Param, ParamKind, Signature};
pub use guard::{validate, validate_with, CheckedFunction, GuardOptions};
pub use property::{Accessor, Property, PropertyBuilder};
pub use typed_tuple::{FieldNames, TupleOptions, TypedTuple, TypedTupleValue};
pub use warnings::{catch_warnings, RuntimeWarning};
