//! Class registry: schemas, method resolution order, and structural protocols

use crate::core::record::RecordSchema;
use crate::core::types::Type;
use crate::core::validator::Predicate;
use crate::core::value::Value;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

/// Class member kinds for attribute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Property,
    ClassVar,
}

/// Class schema: compact representation of class structure
#[derive(Debug, Clone)]
pub struct ClassSchema {
    pub name: String,
    pub members: DashMap<String, MemberKind>,
    pub bases: Vec<String>,
    /// Protocols are satisfied structurally by any class providing their members
    pub protocol: bool,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: DashMap::new(),
            bases: Vec::new(),
            protocol: false,
        }
    }

    pub fn protocol(name: impl Into<String>) -> Self {
        Self {
            protocol: true,
            ..Self::new(name)
        }
    }

    pub fn with_bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bases = bases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_methods(self, names: &[&str]) -> Self {
        for name in names {
            self.add_method(*name);
        }
        self
    }

    pub fn add_method(&self, name: impl Into<String>) {
        self.members.insert(name.into(), MemberKind::Method);
    }

    pub fn add_property(&self, name: impl Into<String>) {
        self.members.insert(name.into(), MemberKind::Property);
    }

    pub fn add_class_var(&self, name: impl Into<String>) {
        self.members.insert(name.into(), MemberKind::ClassVar);
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }
}

const SEQUENCE: &[&str] = &["__len__", "__iter__", "__contains__", "__getitem__", "index", "count"];
const NUMBER: &[&str] = &[
    "__add__", "__sub__", "__mul__", "__truediv__", "__pow__", "__neg__", "__abs__", "__lt__", "__le__", "__gt__",
    "__ge__",
];

/// Registry of classes and named descriptors shared by the matcher and the front end
pub struct TypeContext {
    classes: DashMap<String, ClassSchema>,
    aliases: DashMap<String, Type>,
    records: DashMap<String, Arc<RecordSchema>>,
    predicates: DashMap<String, Predicate>,
}

static GLOBAL: Lazy<Arc<TypeContext>> = Lazy::new(|| Arc::new(TypeContext::new()));

impl TypeContext {
    pub fn new() -> Self {
        let ctx = Self {
            classes: DashMap::new(),
            aliases: DashMap::new(),
            records: DashMap::new(),
            predicates: DashMap::new(),
        };
        ctx.init_builtins();
        ctx
    }

    /// Process-wide context used when no explicit one is supplied
    pub fn global() -> Arc<TypeContext> {
        Arc::clone(&GLOBAL)
    }

    fn init_builtins(&self) {
        let builtins = [
            ClassSchema::new("object").with_methods(&["__init__", "__repr__", "__str__", "__eq__", "__hash__"]),
            ClassSchema::new("NoneType"),
            ClassSchema::new("int").with_methods(NUMBER).with_methods(&["__floordiv__", "__mod__", "__index__"]),
            ClassSchema::new("bool").with_bases(["int"]),
            ClassSchema::new("float").with_methods(NUMBER).with_methods(&["is_integer"]),
            ClassSchema::new("complex").with_methods(&["__add__", "__sub__", "__mul__", "__truediv__", "conjugate"]),
            ClassSchema::new("str").with_methods(SEQUENCE).with_methods(&["upper", "lower", "split", "join", "strip"]),
            ClassSchema::new("bytes").with_methods(SEQUENCE).with_methods(&["decode"]),
            ClassSchema::new("bytearray").with_methods(SEQUENCE).with_methods(&["decode", "append", "__setitem__"]),
            ClassSchema::new("list")
                .with_methods(SEQUENCE)
                .with_methods(&["__setitem__", "__delitem__", "append", "extend", "pop"]),
            ClassSchema::new("tuple").with_methods(SEQUENCE),
            ClassSchema::new("set").with_methods(&["__len__", "__iter__", "__contains__", "add", "discard"]),
            ClassSchema::new("dict").with_methods(&[
                "__len__", "__iter__", "__contains__", "__getitem__", "__setitem__", "__delitem__", "keys", "values",
                "items", "get", "pop",
            ]),
            ClassSchema::new("type").with_methods(&["__call__", "mro"]),
            ClassSchema::new("function").with_methods(&["__call__", "__get__"]),
            ClassSchema::new("method").with_methods(&["__call__", "__func__"]),
            ClassSchema::new("generator").with_methods(&["__iter__", "__next__", "send", "throw", "close"]),
            ClassSchema::new("Enum").with_methods(&["name", "value"]),
            ClassSchema::new("IntEnum").with_bases(["int", "Enum"]),
            // Structural protocols
            ClassSchema::protocol("Iterable").with_methods(&["__iter__"]),
            ClassSchema::protocol("Iterator").with_bases(["Iterable"]).with_methods(&["__next__"]),
            ClassSchema::protocol("Generator").with_bases(["Iterator"]).with_methods(&["send", "throw", "close"]),
            ClassSchema::protocol("Sized").with_methods(&["__len__"]),
            ClassSchema::protocol("Container").with_methods(&["__contains__"]),
            ClassSchema::protocol("Hashable").with_methods(&["__hash__"]),
            ClassSchema::protocol("Callable").with_methods(&["__call__"]),
            ClassSchema::protocol("Collection").with_bases(["Sized", "Iterable", "Container"]),
            ClassSchema::protocol("Sequence").with_bases(["Collection"]).with_methods(&["__getitem__", "index", "count"]),
            ClassSchema::protocol("Mapping")
                .with_bases(["Collection"])
                .with_methods(&["__getitem__", "keys", "items", "values", "get"]),
            ClassSchema::protocol("MutableMapping")
                .with_bases(["Mapping"])
                .with_methods(&["__setitem__", "__delitem__"]),
        ];
        for schema in builtins {
            self.register_class(schema);
        }
    }

    pub fn register_class(&self, schema: ClassSchema) {
        self.classes.insert(schema.name.clone(), schema);
    }

    pub fn get_class(&self, name: &str) -> Option<ClassSchema> {
        self.classes.get(name).map(|r| r.value().clone())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    fn bases_of(&self, name: &str) -> Vec<String> {
        self.classes.get(name).map(|s| s.bases.clone()).unwrap_or_default()
    }

    fn is_protocol(&self, name: &str) -> bool {
        self.classes.get(name).map_or(false, |s| s.protocol)
    }

    /// Linearized ancestry, most derived first and `object` last.
    ///
    /// Reverse post-order of a depth-first walk that expands the rightmost
    /// base first, so a shared base lands after every class deriving from it.
    /// Each class is expanded once, which keeps diamonds and cycles linear.
    pub fn mro(&self, name: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.walk_bases(name, &mut visited, &mut order);

        let mut linear: Vec<String> = order.into_iter().rev().filter(|n| n != "object").collect();
        linear.push("object".to_string());
        linear
    }

    fn walk_bases(&self, name: &str, visited: &mut HashSet<String>, out: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        for base in self.bases_of(name).iter().rev() {
            self.walk_bases(base, visited, out);
        }
        out.push(name.to_string());
    }

    /// Every member name visible on `name`, own and inherited
    pub fn members_of(&self, name: &str) -> HashSet<String> {
        let mut members = HashSet::new();
        for class in self.mro(name) {
            if let Some(schema) = self.classes.get(&class) {
                members.extend(schema.members.iter().map(|r| r.key().clone()));
            }
        }
        members
    }

    pub fn has_member(&self, class: &str, member: &str) -> bool {
        self.mro(class)
            .iter()
            .any(|c| self.classes.get(c).map_or(false, |s| s.has_member(member)))
    }

    /// Nominal subclassing, or structural conformance when `base` is a protocol
    pub fn is_subclass(&self, class: &str, base: &str) -> bool {
        if base == "object" || class == base {
            return true;
        }
        if self.mro(class).iter().any(|c| c == base) {
            return true;
        }
        if self.is_protocol(base) {
            let available = self.members_of(class);
            return self.members_of(base).iter().all(|m| available.contains(m));
        }
        false
    }

    pub fn is_instance(&self, value: &Value, class: &str) -> bool {
        self.is_subclass(value.class_name(), class)
    }

    pub fn set_alias(&self, name: impl Into<String>, ty: Type) {
        self.aliases.insert(name.into(), ty);
    }

    pub fn get_alias(&self, name: &str) -> Option<Type> {
        self.aliases.get(name).map(|r| r.value().clone())
    }

    /// Register a record schema under its own name
    pub fn register_record(&self, schema: Arc<RecordSchema>) {
        self.records.insert(schema.name().to_string(), schema);
    }

    pub fn get_record(&self, name: &str) -> Option<Arc<RecordSchema>> {
        self.records.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Register a predicate so textual `Validator[...]` annotations can name it
    pub fn register_predicate(&self, predicate: Predicate) {
        self.predicates.insert(predicate.name().to_string(), predicate);
    }

    pub fn get_predicate(&self, name: &str) -> Option<Predicate> {
        self.predicates.get(name).map(|r| r.value().clone())
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_mro() {
        let ctx = TypeContext::new();
        assert_eq!(ctx.mro("bool"), vec!["bool", "int", "object"]);
        assert_eq!(ctx.mro("object"), vec!["object"]);
        assert_eq!(ctx.mro("Unregistered"), vec!["Unregistered", "object"]);
    }

    #[test]
    fn test_diamond_mro_keeps_shared_base_last() {
        let ctx = TypeContext::new();
        ctx.register_class(ClassSchema::new("A"));
        ctx.register_class(ClassSchema::new("B").with_bases(["A"]));
        ctx.register_class(ClassSchema::new("C").with_bases(["A"]));
        ctx.register_class(ClassSchema::new("D").with_bases(["B", "C"]));
        assert_eq!(ctx.mro("D"), vec!["D", "B", "C", "A", "object"]);
    }

    #[test]
    fn test_cyclic_bases_terminate() {
        let ctx = TypeContext::new();
        ctx.register_class(ClassSchema::new("X").with_bases(["Y"]));
        ctx.register_class(ClassSchema::new("Y").with_bases(["X"]));
        let mro = ctx.mro("X");
        assert_eq!(mro.first().map(String::as_str), Some("X"));
        assert_eq!(mro.last().map(String::as_str), Some("object"));
    }

    #[test]
    fn test_diamond_ladder_is_walked_once_per_class() {
        let ctx = TypeContext::new();
        ctx.register_class(ClassSchema::new("L0"));
        for i in 1..=40 {
            let below = format!("L{}", i - 1);
            ctx.register_class(ClassSchema::new(format!("A{}", i)).with_bases([below.clone()]));
            ctx.register_class(ClassSchema::new(format!("B{}", i)).with_bases([below]));
            ctx.register_class(ClassSchema::new(format!("L{}", i)).with_bases([format!("A{}", i), format!("B{}", i)]));
        }

        let mro = ctx.mro("L40");
        assert_eq!(mro.len(), 40 * 3 + 2);
        assert_eq!(&mro[..4], &["L40", "A40", "B40", "L39"]);
        assert_eq!(&mro[mro.len() - 2..], &["L0", "object"]);
        assert!(ctx.is_instance(&Value::object("L40"), "L0"));
        assert!(!ctx.is_subclass("L0", "L40"));
    }

    #[test]
    fn test_cycle_through_several_bases_terminates() {
        let ctx = TypeContext::new();
        ctx.register_class(ClassSchema::new("P").with_bases(["Q", "R"]));
        ctx.register_class(ClassSchema::new("Q").with_bases(["P", "R"]));
        ctx.register_class(ClassSchema::new("R").with_bases(["P", "Q"]));
        let mro = ctx.mro("P");
        assert_eq!(mro.len(), 4);
        assert_eq!(mro.first().map(String::as_str), Some("P"));
        assert!(ctx.is_subclass("P", "R"));
        assert!(!ctx.is_subclass("P", "int"));
    }

    #[test]
    fn test_protocols_are_structural() {
        let ctx = TypeContext::new();
        assert!(ctx.is_subclass("list", "Iterable"));
        assert!(ctx.is_subclass("list", "Sequence"));
        assert!(!ctx.is_subclass("list", "Mapping"));
        assert!(ctx.is_subclass("dict", "MutableMapping"));
        assert!(ctx.is_subclass("generator", "Iterator"));
        assert!(!ctx.is_subclass("list", "Iterator"));

        ctx.register_class(ClassSchema::new("Counter").with_methods(&["__iter__", "__next__"]));
        assert!(ctx.is_subclass("Counter", "Iterator"));
        assert!(!ctx.is_subclass("Counter", "Generator"));
    }

    #[test]
    fn test_bool_is_int_but_not_float() {
        let ctx = TypeContext::new();
        assert!(ctx.is_instance(&Value::Bool(true), "int"));
        assert!(!ctx.is_instance(&Value::Bool(true), "float"));
        assert!(ctx.is_instance(&Value::Int(1), "object"));
    }
}
