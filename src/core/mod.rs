//! Core data model
//!
//! Runtime values, type descriptors, structural records, validator
//! predicates and the class registry every check resolves against.

pub mod classes;
pub mod inspect;
pub mod record;
pub mod types;
pub mod validator;
pub mod value;

pub use classes::{ClassSchema, MemberKind, TypeContext};
pub use inspect::{category_of, sub_descriptors_of, Category};
pub use record::{Presence, RecordBuilder, RecordField, RecordSchema};
pub use types::{CallableSig, Type};
pub use validator::{Predicate, ValidatorSpec};
pub use value::{Instance, Value};
