use crate::core::record::RecordSchema;
use crate::core::validator::{Predicate, ValidatorSpec};
use crate::core::value::Value;
use crate::errors::DeclarationError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Type descriptor attached to a parameter or nested inside another descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type {
    Any,
    None,

    /// Nominal class, matched by instance membership
    Class(String),

    /// Forward reference: matched by runtime class-name equality only
    Named(String),

    Union(Vec<Type>),
    Optional(Box<Type>),

    // Containers; an empty argument list means the bare container
    List(Vec<Type>),
    Set(Vec<Type>),
    Tuple(Vec<Type>),
    Dict(Vec<Type>),

    /// `...` marker inside a tuple descriptor
    Ellipsis,

    Literal(Vec<Value>),

    /// The value must itself be a class whose ancestry contains the argument
    TypeOf(Box<Type>),

    Callable(Option<CallableSig>),

    Record(Arc<RecordSchema>),
    Required(Box<Type>),
    NotRequired(Box<Type>),

    Validator(Arc<ValidatorSpec>),

    Json,
    Iterator,
    Generator,

    /// Distinct name over an existing descriptor
    NewType(String, Box<Type>),

    /// Parameterized class resolved through the matcher registry
    Generic(String, Vec<Type>),
}

/// Signature carried by a parameterized `Callable[[params], ret]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallableSig {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl Type {
    pub fn class(name: impl Into<String>) -> Type {
        Type::Class(name.into())
    }

    pub fn named(name: impl Into<String>) -> Type {
        Type::Named(name.into())
    }

    pub fn int() -> Type {
        Type::class("int")
    }

    pub fn float() -> Type {
        Type::class("float")
    }

    pub fn str() -> Type {
        Type::class("str")
    }

    pub fn bool() -> Type {
        Type::class("bool")
    }

    pub fn bytes() -> Type {
        Type::class("bytes")
    }

    pub fn list(elem: Type) -> Type {
        Type::List(vec![elem])
    }

    pub fn set(elem: Type) -> Type {
        Type::Set(vec![elem])
    }

    pub fn dict(key: Type, value: Type) -> Type {
        Type::Dict(vec![key, value])
    }

    pub fn tuple(elems: Vec<Type>) -> Type {
        Type::Tuple(elems)
    }

    /// Homogeneous tuple of any length, `Tuple[elem, ...]`
    pub fn tuple_of(elem: Type) -> Type {
        Type::Tuple(vec![elem, Type::Ellipsis])
    }

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn literal(values: impl IntoIterator<Item = Value>) -> Type {
        Type::Literal(values.into_iter().collect())
    }

    pub fn type_of(inner: Type) -> Type {
        Type::TypeOf(Box::new(inner))
    }

    pub fn callable(params: Vec<Type>, ret: Type) -> Type {
        Type::Callable(Some(CallableSig {
            params,
            ret: Box::new(ret),
        }))
    }

    pub fn required(inner: Type) -> Type {
        Type::Required(Box::new(inner))
    }

    pub fn not_required(inner: Type) -> Type {
        Type::NotRequired(Box::new(inner))
    }

    pub fn new_type(name: impl Into<String>, inner: Type) -> Type {
        Type::NewType(name.into(), Box::new(inner))
    }

    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Generic(name.into(), args)
    }

    pub fn record(schema: Arc<RecordSchema>) -> Type {
        Type::Record(schema)
    }

    /// Base descriptor refined by a predicate over the whole value
    pub fn validator(base: Type, predicate: Predicate) -> Type {
        Type::Validator(Arc::new(ValidatorSpec::new(base, predicate)))
    }

    /// Base descriptor refined by a predicate applied to every element
    pub fn iter_validator(base: Type, predicate: Predicate) -> Type {
        Type::Validator(Arc::new(ValidatorSpec::new(base, predicate).per_element()))
    }

    /// Flatten nested unions and drop duplicate branches.
    ///
    /// An empty list stays an empty union, which `check_declaration` rejects.
    pub fn union(types: Vec<Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for ty in types {
            let branches = match ty {
                Type::Union(inner) => inner,
                other => vec![other],
            };
            for branch in branches {
                if !flat.contains(&branch) {
                    flat.push(branch);
                }
            }
        }

        match flat.len() {
            1 => flat.remove(0),
            _ => Type::Union(flat),
        }
    }

    /// True for the two record-field presence modifiers
    pub fn is_modifier(&self) -> bool {
        matches!(self, Type::Required(_) | Type::NotRequired(_))
    }

    /// Walk the descriptor and reject shapes that can never be matched.
    ///
    /// Runs once when a callable is decorated, so malformed descriptors fail
    /// before any call is made.
    pub fn check_declaration(&self) -> Result<(), DeclarationError> {
        match self {
            Type::Tuple(elems) => {
                if let Some(pos) = elems.iter().position(|t| *t == Type::Ellipsis) {
                    if pos == 0 || pos != elems.len() - 1 {
                        return Err(DeclarationError::Malformed(format!(
                            "'...' is only allowed as the last argument of a tuple: {}",
                            self
                        )));
                    }
                }
                elems
                    .iter()
                    .filter(|t| **t != Type::Ellipsis)
                    .try_for_each(Type::check_declaration)
            }
            Type::Ellipsis => Err(DeclarationError::Malformed(
                "'...' is only allowed inside a tuple".to_string(),
            )),
            Type::Validator(spec) => {
                if matches!(spec.base(), Type::Ellipsis) || spec.base().is_modifier() {
                    return Err(DeclarationError::Malformed(format!(
                        "validator base must be a type, got {}",
                        spec.base()
                    )));
                }
                spec.base().check_declaration()
            }
            Type::Record(schema) => schema.check_declaration(),
            Type::Union(types) if types.is_empty() => Err(DeclarationError::Malformed(
                "Union[] needs at least one member type".to_string(),
            )),
            Type::Union(types) | Type::List(types) | Type::Set(types) | Type::Dict(types) | Type::Generic(_, types) => {
                types.iter().try_for_each(Type::check_declaration)
            }
            Type::Optional(inner)
            | Type::TypeOf(inner)
            | Type::Required(inner)
            | Type::NotRequired(inner)
            | Type::NewType(_, inner) => inner.check_declaration(),
            Type::Callable(Some(sig)) => {
                sig.params.iter().try_for_each(Type::check_declaration)?;
                sig.ret.check_declaration()
            }
            _ => Ok(()),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[Type]) -> fmt::Result {
    if args.is_empty() {
        return write!(f, "{}", name);
    }
    write!(f, "{}[{}]", name, args.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", "))
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::None => write!(f, "None"),
            Type::Class(name) => write!(f, "{}", name),
            Type::Named(name) => write!(f, "'{}'", name),
            Type::Union(ts) => write_args(f, "Union", ts),
            Type::Optional(t) => write!(f, "Optional[{}]", t),
            Type::List(ts) => write_args(f, "List", ts),
            Type::Set(ts) => write_args(f, "Set", ts),
            Type::Tuple(ts) => write_args(f, "Tuple", ts),
            Type::Dict(ts) => write_args(f, "Dict", ts),
            Type::Ellipsis => write!(f, "..."),
            Type::Literal(values) => write!(
                f,
                "Literal[{}]",
                values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
            ),
            Type::TypeOf(t) => write!(f, "Type[{}]", t),
            Type::Callable(None) => write!(f, "Callable"),
            Type::Callable(Some(sig)) => write!(
                f,
                "Callable[[{}], {}]",
                sig.params.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", "),
                sig.ret
            ),
            Type::Record(schema) => write!(f, "{}", schema.name()),
            Type::Required(t) => write!(f, "Required[{}]", t),
            Type::NotRequired(t) => write!(f, "NotRequired[{}]", t),
            Type::Validator(spec) => write!(f, "{}", spec),
            Type::Json => write!(f, "json"),
            Type::Iterator => write!(f, "Iterator"),
            Type::Generator => write!(f, "Generator"),
            Type::NewType(name, _) => write!(f, "{}", name),
            Type::Generic(name, args) => write_args(f, name, args),
        }
    }
}
