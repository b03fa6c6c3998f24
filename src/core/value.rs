//! Host values seen by checked callables at call time
//!
//! A `Value` mirrors the dynamic objects of the checked language: numbers,
//! text, containers, class objects, callables and instances of registered
//! classes. Equality follows host semantics (`1 == 1.0`, `b"a" == bytearray(b"a")`),
//! and `Display` renders the host `repr`.

use crate::runtime::function::{BoundMethod, Function};
use parking_lot::RwLock;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    Bytes(Vec<u8>),
    ByteArray(Vec<u8>),

    // Containers
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Dict(Vec<(Value, Value)>),

    /// A class object, e.g. `int` or a registered user class
    Type(String),

    Function(Arc<Function>),
    Method(Arc<BoundMethod>),
    Object(Arc<Instance>),
}

/// Instance of a registered class with mutable attributes
#[derive(Debug)]
pub struct Instance {
    class: String,
    attrs: RwLock<BTreeMap<String, Value>>,
}

impl Instance {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            attrs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        self.attrs.write().insert(name.into(), value);
    }

    pub fn del_attr(&self, name: &str) -> Option<Value> {
        self.attrs.write().remove(name)
    }

    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.read().keys().cloned().collect()
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Build a set, dropping elements equal to one already present
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        for item in items {
            if !unique.iter().any(|u| u.py_eq(&item)) {
                unique.push(item);
            }
        }
        Value::Set(unique)
    }

    /// Build a dict; later duplicate keys overwrite earlier ones
    pub fn dict(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        for (key, value) in pairs {
            match entries.iter_mut().find(|(k, _)| k.py_eq(&key)) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Value::Dict(entries)
    }

    pub fn class_object(name: impl Into<String>) -> Self {
        Value::Type(name.into())
    }

    pub fn object(class: impl Into<String>) -> Self {
        Value::Object(Arc::new(Instance::new(class)))
    }

    /// Name of the runtime class of this value
    pub fn class_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(..) => "complex",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::ByteArray(_) => "bytearray",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Type(_) => "type",
            Value::Function(_) => "function",
            Value::Method(_) => "method",
            Value::Object(instance) => instance.class(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    /// Elements of a sequence or set, in iteration order
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Values produced by iterating: sequence elements, dict keys, or characters
    pub fn iter_values(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items.clone()),
            Value::Dict(entries) => Some(entries.iter().map(|(k, _)| k.clone()).collect()),
            Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Bytes(b) | Value::ByteArray(b) => Some(b.iter().map(|x| Value::Int(*x as i64)).collect()),
            _ => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) | Value::ByteArray(b) => Some(b.len()),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items.len()),
            Value::Dict(entries) => Some(entries.len()),
            _ => None,
        }
    }

    pub fn dict_entries(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a string key in a dict value
    pub fn dict_get(&self, key: &str) -> Option<&Value> {
        self.dict_entries()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Attribute lookup on instances; other values expose none
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(instance) => instance.get_attr(name),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Method(_) | Value::Type(_))
    }

    /// Host equality
    pub fn py_eq(&self, other: &Value) -> bool {
        use Value::*;

        match (self, other) {
            (None, None) => true,
            (Str(a), Str(b)) => a == b,
            (Bytes(a) | ByteArray(a), Bytes(b) | ByteArray(b)) => a == b,
            (Complex(r1, i1), Complex(r2, i2)) => r1 == r2 && i1 == i2,
            (Complex(r, i), other) | (other, Complex(r, i)) => {
                *i == 0.0 && other.as_float().map_or(false, |x| x == *r)
            }
            (Float(_), _) | (_, Float(_)) => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            (Bool(_) | Int(_), Bool(_) | Int(_)) => self.as_int() == other.as_int(),
            (List(a), List(b)) | (Tuple(a), Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (Set(a), Set(b)) => a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.py_eq(y))),
            (Dict(a), Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.py_eq(k2) && v.py_eq(v2))
                    })
            }
            (Type(a), Type(b)) => a == b,
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            (Method(a), Method(b)) => {
                Arc::ptr_eq(a.function(), b.function()) && a.receiver().py_eq(b.receiver())
            }
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Strict JSON conversion; `None` when the value is not representable
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;

        Some(match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(x) => Json::Number(serde_json::Number::from_f64(*x)?),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect::<Option<_>>()?)
            }
            Value::Dict(entries) => {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    map.insert(json_key(key)?, value.to_json()?);
                }
                Json::Object(map)
            }
            _ => return None,
        })
    }

    /// Whether the host JSON encoder accepts the value.
    ///
    /// Looser than [`Value::to_json`]: non-finite floats are encodable and
    /// come out as `NaN` or `Infinity`.
    pub fn is_json_encodable(&self) -> bool {
        match self {
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => true,
            Value::List(items) | Value::Tuple(items) => items.iter().all(Value::is_json_encodable),
            Value::Dict(entries) => entries
                .iter()
                .all(|(key, value)| json_key(key).is_some() && value.is_json_encodable()),
            _ => false,
        }
    }
}

/// JSON object keys accepted by the host encoder
fn json_key(key: &Value) -> Option<String> {
    match key {
        Value::Str(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::None => Some("null".to_string()),
        Value::Float(x) if x.is_nan() => Some("NaN".to_string()),
        Value::Float(x) if x.is_infinite() => Some(if *x > 0.0 { "Infinity" } else { "-Infinity" }.to_string()),
        Value::Float(x) => Some(format!("{:?}", x)),
        _ => None,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Arc<Function>> for Value {
    fn from(function: Arc<Function>) -> Self {
        Value::Function(function)
    }
}

fn write_str_repr(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("'")
}

fn write_bytes_repr(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("b'")?;
    for &b in bytes {
        match b {
            b'\\' => f.write_str("\\\\")?,
            b'\'' => f.write_str("\\'")?,
            b'\n' => f.write_str("\\n")?,
            b'\t' => f.write_str("\\t")?,
            b'\r' => f.write_str("\\r")?,
            0x20..=0x7e => write!(f, "{}", b as char)?,
            _ => write!(f, "\\x{:02x}", b)?,
        }
    }
    f.write_str("'")
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_nan() => write!(f, "nan"),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Complex(re, im) if *re == 0.0 => write!(f, "{}j", im),
            Value::Complex(re, im) => write!(f, "({}{:+}j)", re, im),
            Value::Str(s) => write_str_repr(f, s),
            Value::Bytes(b) => write_bytes_repr(f, b),
            Value::ByteArray(b) => {
                write!(f, "bytearray(")?;
                write_bytes_repr(f, b)?;
                write!(f, ")")
            }
            Value::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                write!(f, ")")
            }
            Value::Set(items) if items.is_empty() => write!(f, "set()"),
            Value::Set(items) => {
                write!(f, "{{")?;
                write_joined(f, items)?;
                write!(f, "}}")
            }
            Value::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Type(name) => write!(f, "<class '{}'>", name),
            Value::Function(function) => {
                write!(f, "<function {} at {:#x}>", function.name(), Arc::as_ptr(function) as usize)
            }
            Value::Method(method) => {
                write!(f, "<bound method {} of {}>", method.function().name(), method.receiver())
            }
            Value::Object(instance) => {
                write!(f, "<{} object at {:#x}>", instance.class(), Arc::as_ptr(instance) as usize)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) | Value::ByteArray(b) => serializer.serialize_bytes(b),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    match k {
                        Value::Str(s) => map.serialize_entry(s, v)?,
                        other => map.serialize_entry(&other.to_string(), v)?,
                    }
                }
                map.end()
            }
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_matches_host() {
        assert_eq!(Value::str("it's").to_string(), "'it\\'s'");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::tuple([Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::set([]).to_string(), "set()");
        assert_eq!(Value::ByteArray(b"a\x00".to_vec()).to_string(), "bytearray(b'a\\x00')");
        assert_eq!(
            Value::dict([(Value::str("a"), Value::Bool(true))]).to_string(),
            "{'a': True}"
        );
    }

    #[test]
    fn test_numeric_equality_crosses_kinds() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(Value::Complex(2.0, 0.0), Value::Int(2));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_ne!(Value::list([Value::Int(1)]), Value::tuple([Value::Int(1)]));
    }

    #[test]
    fn test_set_deduplicates() {
        let set = Value::set([Value::Int(1), Value::Float(1.0), Value::Int(2)]);
        assert_eq!(set.len(), Some(2));
    }

    #[test]
    fn test_strict_json() {
        let doc = Value::dict([
            (Value::str("a"), Value::list([Value::Int(1), Value::None])),
            (Value::Int(2), Value::Float(0.5)),
        ]);
        assert!(doc.to_json().is_some());
        assert!(Value::set([Value::Int(1)]).to_json().is_none());
        assert!(Value::Bytes(vec![1]).to_json().is_none());
        assert!(Value::dict([(Value::tuple([]), Value::Int(1))]).to_json().is_none());
        assert!(Value::Float(f64::NAN).to_json().is_none());
    }

    #[test]
    fn test_non_finite_floats_are_json_encodable() {
        assert!(Value::Float(f64::NAN).is_json_encodable());
        assert!(Value::list([Value::Float(f64::INFINITY), Value::Float(f64::NEG_INFINITY)]).is_json_encodable());
        assert!(Value::dict([(Value::Float(f64::NAN), Value::Int(1))]).is_json_encodable());
        assert!(!Value::list([Value::Bytes(vec![1])]).is_json_encodable());
        assert_eq!(json_key(&Value::Float(f64::NEG_INFINITY)).as_deref(), Some("-Infinity"));
    }

    #[test]
    fn test_instance_attributes() {
        let obj = Value::object("Point");
        if let Value::Object(instance) = &obj {
            instance.set_attr("x", Value::Int(3));
        }
        assert_eq!(obj.class_name(), "Point");
        assert_eq!(obj.get_attr("x"), Some(Value::Int(3)));
        assert_eq!(obj.get_attr("y"), None);
    }
}
