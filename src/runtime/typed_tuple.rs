//! Named tuples whose fields carry type annotations

use crate::analysis::matcher::TypeMatcher;
use crate::core::types::Type;
use crate::core::value::Value;
use crate::errors::{
    find_similar_names, CallError, DeclarationError, ExceptionKind, ParamFailure, PredicateFailure, TypeMismatch,
    ValidationError,
};
use crate::frontend::annotation::parse_annotation;
use crate::runtime::function::CallArgs;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => chars.all(|c| c == '_' || c.is_alphanumeric()),
        _ => false,
    }
}

/// Field declarations accepted by `TypedTuple::define`
#[derive(Debug, Clone)]
pub enum FieldNames {
    /// `"a:int, b:str"`
    Text(String),
    /// `["a:int", "b:str"]`
    List(Vec<String>),
    /// Already resolved descriptors
    Typed(Vec<(String, Type)>),
}

impl From<&str> for FieldNames {
    fn from(text: &str) -> Self {
        FieldNames::Text(text.to_string())
    }
}

impl From<Vec<&str>> for FieldNames {
    fn from(names: Vec<&str>) -> Self {
        FieldNames::List(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<(&str, Type)>> for FieldNames {
    fn from(fields: Vec<(&str, Type)>) -> Self {
        FieldNames::Typed(fields.into_iter().map(|(n, t)| (n.to_string(), t)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TupleOptions {
    /// Replace invalid field names by `_<index>` instead of failing
    pub rename: bool,
    /// One default per field
    pub defaults: Option<Vec<Value>>,
}

impl TupleOptions {
    pub fn rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    pub fn defaults(mut self, defaults: Vec<Value>) -> Self {
        self.defaults = Some(defaults);
        self
    }
}

struct Layout {
    name: String,
    fields: Vec<(String, Type)>,
    defaults: Option<Vec<Value>>,
    matcher: Arc<TypeMatcher>,
}

impl Layout {
    fn failures<'a>(
        &self,
        values: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> Result<Vec<ParamFailure>, PredicateFailure> {
        let mut failures = Vec::new();
        for (name, value) in values {
            let Some((_, expected)) = self.fields.iter().find(|(n, _)| n == name) else {
                continue;
            };
            if !self.matcher.matches(value, expected)? {
                failures.push(ParamFailure {
                    name: name.to_string(),
                    value: value.to_string(),
                    expected: expected.clone(),
                });
            }
        }
        Ok(failures)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    fn unknown_field(&self, name: &str) -> CallError {
        let mut message = format!("{}() got an unexpected field '{}'", self.name, name);
        if let Some(similar) = find_similar_names(name, self.fields.iter().map(|(n, _)| n.as_str()), 2).first() {
            message.push_str(&format!("; did you mean '{}'?", similar));
        }
        CallError::Arguments(message)
    }
}

/// A tuple type with named, typed fields
#[derive(Clone)]
pub struct TypedTuple {
    layout: Arc<Layout>,
}

impl TypedTuple {
    pub fn define(
        typename: impl Into<String>,
        fields: impl Into<FieldNames>,
        options: TupleOptions,
    ) -> Result<Self, DeclarationError> {
        Self::define_with(typename, fields, options, TypeMatcher::global())
    }

    pub fn define_with(
        typename: impl Into<String>,
        fields: impl Into<FieldNames>,
        options: TupleOptions,
        matcher: Arc<TypeMatcher>,
    ) -> Result<Self, DeclarationError> {
        let name = typename.into();
        let mut fields = resolve_fields(fields.into(), &matcher)?;

        if options.rename {
            rename_fields(&mut fields);
        } else {
            check_field_names(&fields)?;
        }

        let layout = Layout {
            name,
            fields,
            defaults: options.defaults,
            matcher,
        };
        if let Some(defaults) = &layout.defaults {
            if defaults.len() != layout.fields.len() {
                return Err(DeclarationError::Malformed(
                    "Default values must match with field names".to_string(),
                ));
            }
            let failures = layout
                .failures(layout.fields.iter().map(|(n, _)| n.as_str()).zip(defaults))
                .map_err(|failure| DeclarationError::Malformed(ValidationError::from(failure).to_string()))?;
            if !failures.is_empty() {
                let mismatch = TypeMismatch::new(ExceptionKind::TypeError, layout.name.as_str(), failures);
                return Err(DeclarationError::Malformed(mismatch.warning_message()));
            }
        }
        Ok(Self {
            layout: Arc::new(layout),
        })
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn fields(&self) -> &[(String, Type)] {
        &self.layout.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.layout.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// `Name(a, b)` followed by one `:type` line per field
    pub fn doc(&self) -> String {
        let mut doc = format!("{}({})", self.name(), self.field_names().join(", "));
        for (name, ty) in self.fields() {
            doc.push_str(&format!("\n:type {}: {}", name, ty));
        }
        doc
    }

    /// Build an instance, filling unspecified fields from the defaults
    pub fn new(&self, args: &CallArgs) -> Result<TypedTupleValue, CallError> {
        let layout = &self.layout;
        if args.args().len() > layout.fields.len() {
            return Err(CallError::Arguments(format!(
                "{}() takes {} positional arguments but {} were given",
                layout.name,
                layout.fields.len(),
                args.args().len()
            )));
        }

        let mut slots: Vec<Option<Value>> = match &layout.defaults {
            Some(defaults) => defaults.iter().cloned().map(Some).collect(),
            None => vec![None; layout.fields.len()],
        };
        for (slot, value) in slots.iter_mut().zip(args.args()) {
            *slot = Some(value.clone());
        }
        for (name, value) in args.kwargs() {
            let index = layout.position(name).ok_or_else(|| layout.unknown_field(name))?;
            if index < args.args().len() {
                return Err(CallError::Arguments(format!(
                    "{}() got multiple values for argument '{}'",
                    layout.name, name
                )));
            }
            slots[index] = Some(value.clone());
        }

        let missing: Vec<&str> = layout
            .fields
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|((n, _), _)| n.as_str())
            .collect();
        if !missing.is_empty() {
            if missing.len() == layout.fields.len() {
                return Err(CallError::Arguments(format!(
                    "Initialise {} with values or add defaults",
                    layout.name
                )));
            }
            return Err(CallError::Arguments(format!(
                "{}() missing fields: {}",
                layout.name,
                missing.join(", ")
            )));
        }

        let values: Vec<Value> = slots.into_iter().flatten().collect();
        let failures = layout
            .failures(layout.fields.iter().map(|(n, _)| n.as_str()).zip(&values))
            .map_err(ValidationError::from)?;
        if !failures.is_empty() {
            return Err(TypeMismatch::new(ExceptionKind::TypeError, layout.name.as_str(), failures).into());
        }
        Ok(TypedTupleValue {
            layout: Arc::clone(&self.layout),
            values,
        })
    }
}

impl fmt::Debug for TypedTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedTuple")
            .field("name", &self.layout.name)
            .field("fields", &self.layout.fields)
            .finish()
    }
}

fn resolve_fields(fields: FieldNames, matcher: &TypeMatcher) -> Result<Vec<(String, Type)>, DeclarationError> {
    let entries: Vec<String> = match fields {
        FieldNames::Typed(typed) => return Ok(typed),
        FieldNames::Text(text) => text.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        FieldNames::List(list) => list.into_iter().map(|s| s.trim().to_string()).collect(),
    };

    let typed = entries.iter().filter(|e| e.contains(':')).count();
    if typed != 0 && typed != entries.len() {
        return Err(DeclarationError::Malformed(
            "No mixing of typing and not typing supported".to_string(),
        ));
    }

    entries
        .iter()
        .map(|entry| match entry.split_once(':') {
            Some((name, annotation)) => Ok((name.trim().to_string(), parse_annotation(annotation.trim(), matcher.types())?)),
            None => Ok((entry.clone(), Type::Any)),
        })
        .collect()
}

fn name_problem(name: &str) -> Option<&'static str> {
    if name.starts_with('_') {
        Some("field names cannot start with an underscore")
    } else if !is_identifier(name) {
        Some("field names must be valid identifiers")
    } else if KEYWORDS.contains(&name) {
        Some("field names cannot be a keyword")
    } else {
        None
    }
}

fn check_field_names(fields: &[(String, Type)]) -> Result<(), DeclarationError> {
    let mut seen = HashSet::new();
    for (name, _) in fields {
        let reason = name_problem(name).or_else(|| (!seen.insert(name.as_str())).then_some("duplicate field name"));
        if let Some(reason) = reason {
            return Err(DeclarationError::InvalidFieldName {
                name: name.clone(),
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}

fn rename_fields(fields: &mut [(String, Type)]) {
    let mut seen = HashSet::new();
    for (index, (name, _)) in fields.iter_mut().enumerate() {
        if name_problem(name).is_some() || !seen.insert(name.clone()) {
            *name = format!("_{}", index);
        }
    }
}

/// An instance of a `TypedTuple`
#[derive(Clone)]
pub struct TypedTupleValue {
    layout: Arc<Layout>,
    values: Vec<Value>,
}

impl TypedTupleValue {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.layout.position(field).and_then(|i| self.values.get(i))
    }

    pub fn index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_dict(&self) -> Value {
        Value::dict(
            self.layout
                .fields
                .iter()
                .zip(&self.values)
                .map(|((name, _), value)| (Value::str(name.as_str()), value.clone())),
        )
    }

    pub fn to_tuple(&self) -> Value {
        Value::tuple(self.values.iter().cloned())
    }

    /// New instance with some fields replaced; the result is validated again
    pub fn replace(&self, changes: &[(&str, Value)]) -> Result<TypedTupleValue, CallError> {
        let unknown: Vec<&str> = changes
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| self.layout.position(name).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(CallError::raised(
                "ValueError",
                format!("Got unexpected field names: {:?}", unknown),
            ));
        }

        let mut args = CallArgs::new();
        for ((name, _), value) in self.layout.fields.iter().zip(&self.values) {
            let value = changes
                .iter()
                .find(|(n, _)| n == name)
                .map_or_else(|| value.clone(), |(_, v)| v.clone());
            args = args.kwarg(name.as_str(), value);
        }
        TypedTuple {
            layout: Arc::clone(&self.layout),
        }
        .new(&args)
    }
}

impl PartialEq for TypedTupleValue {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl fmt::Display for TypedTupleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.layout.name)?;
        for (i, ((name, _), value)) in self.layout.fields.iter().zip(&self.values).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for TypedTupleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
