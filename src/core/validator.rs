//! Predicate refinements over a base descriptor

use crate::core::types::Type;
use crate::core::value::Value;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Named boolean predicate remembering where it was declared
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
    location: &'static Location<'static>,
}

impl Predicate {
    #[track_caller]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            location: Location::caller(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn test(&self, value: &Value) -> bool {
        (self.func)(value)
    }

    pub fn same_function(&self, other: &Predicate) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name)
            .field("location", &format_args!("{}:{}", self.location.file(), self.location.line()))
            .finish()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, line={})", self.name, self.location.file(), self.location.line())
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorSpec {
    base: Type,
    predicate: Predicate,
    default: Option<Value>,
    each: bool,
}

impl ValidatorSpec {
    pub fn new(base: Type, predicate: Predicate) -> Self {
        Self {
            base,
            predicate,
            default: None,
            each: false,
        }
    }

    /// Value returned in place of calling the function when the predicate fails
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Apply the predicate to every element instead of the whole value
    pub fn per_element(mut self) -> Self {
        self.each = true;
        self
    }

    pub fn base(&self) -> &Type {
        &self.base
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_per_element(&self) -> bool {
        self.each
    }

    /// Evaluate the predicate; per-element validators need an iterable value
    pub fn accepts(&self, value: &Value) -> bool {
        if !self.each {
            return self.predicate.test(value);
        }
        match value.iter_values() {
            Some(items) => items.iter().all(|item| self.predicate.test(item)),
            None => false,
        }
    }
}

impl PartialEq for ValidatorSpec {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
            && self.each == other.each
            && self.default == other.default
            && self.predicate.same_function(&other.predicate)
    }
}

impl fmt::Display for ValidatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.each { "IterValidator" } else { "Validator" };
        write!(f, "{}[{}, {}]", name, self.base, self.predicate)
    }
}

impl Serialize for ValidatorSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidatorSpec", 5)?;
        state.serialize_field("base", &self.base)?;
        state.serialize_field("predicate", self.predicate.name())?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.predicate.location().file(), self.predicate.location().line()),
        )?;
        state.serialize_field("default", &self.default)?;
        state.serialize_field("per_element", &self.each)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_records_declaration_site() {
        let positive = Predicate::new("positive", |v| v.as_int().map_or(false, |i| i > 0));
        assert_eq!(positive.location().file(), file!());
        assert!(positive.to_string().starts_with("positive("));
    }

    #[test]
    fn test_per_element_requires_iterable() {
        let even = Predicate::new("even", |v| v.as_int().map_or(false, |i| i % 2 == 0));
        let spec = ValidatorSpec::new(Type::list(Type::int()), even).per_element();
        assert!(spec.accepts(&Value::list([Value::Int(2), Value::Int(4)])));
        assert!(!spec.accepts(&Value::list([Value::Int(2), Value::Int(3)])));
        assert!(!spec.accepts(&Value::Int(2)));
    }

    #[test]
    fn test_display_names_kind() {
        let p = Predicate::new("nonempty", |v| v.len().map_or(false, |n| n > 0));
        let whole = Type::validator(Type::str(), p.clone());
        let each = Type::iter_validator(Type::list(Type::str()), p);
        assert!(whole.to_string().starts_with("Validator[str, nonempty("));
        assert!(each.to_string().starts_with("IterValidator[List[str], nonempty("));
    }
}
