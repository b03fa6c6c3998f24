//! Class-level validation
//!
//! A `ClassDef` describes a class; `validate_class` registers it in the
//! class registry and produces a `CheckedClass`, which keeps the original
//! definition and a table of wrapped method invokers next to it. Lookups
//! that have no wrapped counterpart fall through to the definition.

use crate::analysis::matcher::TypeMatcher;
use crate::core::classes::ClassSchema;
use crate::core::record::RecordSchema;
use crate::core::types::Type;
use crate::core::value::Value;
use crate::errors::{find_similar_names, CallError, DeclarationError};
use crate::runtime::function::{BoundMethod, CallArgs, Function, Param, Signature};
use crate::runtime::guard::{validate_with, CheckedFunction, GuardOptions};
use crate::runtime::property::{Property, PropertyBuilder};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const INITIALIZER: &str = "__init__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Receives the instance as first argument
    Instance,
    /// Receives the class object as first argument
    Class,
    Static,
}

/// Field of a dataclass-shaped class
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub name: String,
    pub ty: Type,
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub enum ClassShape {
    Plain,
    /// Instantiation validates a mapping against the record and returns it
    Record(Arc<RecordSchema>),
    /// Initializer synthesised from the fields
    Dataclass(Vec<DataField>),
}

#[derive(Debug, Clone)]
struct MethodDef {
    kind: MethodKind,
    function: Arc<Function>,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    name: String,
    bases: Vec<String>,
    doc: Option<String>,
    methods: Vec<MethodDef>,
    initializer: Option<Arc<Function>>,
    properties: Vec<PropertyBuilder>,
    class_vars: Vec<(String, Value)>,
    shape: ClassShape,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            doc: None,
            methods: Vec::new(),
            initializer: None,
            properties: Vec::new(),
            class_vars: Vec::new(),
            shape: ClassShape::Plain,
        }
    }

    /// Class whose instances are mappings conforming to `schema`
    pub fn record(schema: Arc<RecordSchema>) -> Self {
        Self {
            shape: ClassShape::Record(schema.clone()),
            ..Self::new(schema.name())
        }
    }

    pub fn dataclass(name: impl Into<String>, fields: Vec<DataField>) -> Self {
        Self {
            shape: ClassShape::Dataclass(fields),
            ..Self::new(name)
        }
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn method(self, function: impl Into<Arc<Function>>) -> Self {
        self.with_method(MethodKind::Instance, function)
    }

    pub fn class_method(self, function: impl Into<Arc<Function>>) -> Self {
        self.with_method(MethodKind::Class, function)
    }

    pub fn static_method(self, function: impl Into<Arc<Function>>) -> Self {
        self.with_method(MethodKind::Static, function)
    }

    fn with_method(mut self, kind: MethodKind, function: impl Into<Arc<Function>>) -> Self {
        let function = function.into();
        if kind == MethodKind::Instance && function.name() == INITIALIZER {
            self.initializer = Some(function);
        } else {
            self.methods.push(MethodDef { kind, function });
        }
        self
    }

    pub fn initializer(mut self, function: impl Into<Arc<Function>>) -> Self {
        self.initializer = Some(function.into());
        self
    }

    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    pub fn class_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.class_vars.push((name.into(), value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn shape(&self) -> &ClassShape {
        &self.shape
    }

    pub fn get_doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn class_var_value(&self, name: &str) -> Option<&Value> {
        self.class_vars.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Instance, class and static methods in declaration order, initializer excluded
    pub fn methods(&self) -> impl Iterator<Item = (MethodKind, &Arc<Function>)> {
        self.methods.iter().map(|m| (m.kind, &m.function))
    }

    pub fn get_initializer(&self) -> Option<&Arc<Function>> {
        self.initializer.as_ref()
    }

    fn schema(&self) -> ClassSchema {
        let schema = ClassSchema::new(&self.name).with_bases(self.bases.iter().cloned());
        for method in &self.methods {
            schema.add_method(method.function.name());
        }
        if self.initializer.is_some() || matches!(self.shape, ClassShape::Dataclass(_)) {
            schema.add_method(INITIALIZER);
        }
        for property in &self.properties {
            schema.add_property(property.name());
        }
        for (name, _) in &self.class_vars {
            schema.add_class_var(name.as_str());
        }
        schema
    }
}

/// Initializer storing each dataclass field on the receiver
fn synthesize_initializer(class: &str, fields: &[DataField]) -> Function {
    let mut params = vec![Param::untyped("self")];
    params.extend(fields.iter().map(|field| {
        let param = Param::typed(field.name.as_str(), field.ty.clone());
        match &field.default {
            Some(default) => param.default(default.clone()),
            None => param,
        }
    }));

    let fields = fields.to_vec();
    let class = class.to_string();
    Function::new(INITIALIZER, Signature::new(params), move |args: &CallArgs| {
        let Some(Value::Object(receiver)) = args.get(0) else {
            return Err(CallError::Arguments(format!("{}.__init__() needs an instance", class)));
        };
        for (index, field) in fields.iter().enumerate() {
            let value = args
                .lookup(&field.name, index + 1)
                .or(field.default.as_ref())
                .cloned()
                .unwrap_or(Value::None);
            receiver.set_attr(field.name.as_str(), value);
        }
        Ok(Value::None)
    })
}

/// Wrap unless already checked or carrying no parameter annotations
fn wrap(function: &Arc<Function>, options: GuardOptions, matcher: &Arc<TypeMatcher>) -> Result<Arc<Function>, DeclarationError> {
    let annotated = function.signature().params().iter().any(|p| p.annotation.is_some());
    if function.is_checked() || !annotated {
        return Ok(Arc::clone(function));
    }
    let checked = validate_with(Arc::clone(function), options, Arc::clone(matcher))?;
    Ok(Arc::new(checked.into_function()))
}

pub struct CheckedClass {
    def: Arc<ClassDef>,
    matcher: Arc<TypeMatcher>,
    methods: HashMap<String, (MethodKind, Arc<Function>)>,
    initializer: Option<Arc<Function>>,
    properties: HashMap<String, Property>,
    record_check: Option<CheckedFunction>,
}

pub fn validate_class(def: ClassDef, options: GuardOptions) -> Result<CheckedClass, DeclarationError> {
    validate_class_with(def, options, TypeMatcher::global())
}

pub fn validate_class_with(
    def: ClassDef,
    options: GuardOptions,
    matcher: Arc<TypeMatcher>,
) -> Result<CheckedClass, DeclarationError> {
    let record_check = match &def.shape {
        ClassShape::Record(record) => {
            let descriptor = Type::record(Arc::clone(record));
            let sig = Signature::new(vec![Param::typed("mapping", descriptor)]);
            let identity = Function::new(def.name.as_str(), sig, |args: &CallArgs| {
                Ok(args.get(0).cloned().unwrap_or(Value::None))
            });
            matcher.types().register_record(Arc::clone(record));
            Some(validate_with(identity, options.clone().subclass(false), Arc::clone(&matcher))?)
        }
        _ => None,
    };

    let mut methods = HashMap::new();
    for method in &def.methods {
        let function = match method.kind {
            MethodKind::Instance => wrap(&method.function, options.clone().subclass(true), &matcher)?,
            MethodKind::Static => wrap(&method.function, options.clone().subclass(false), &matcher)?,
            MethodKind::Class => Arc::clone(&method.function),
        };
        methods.insert(method.function.name().to_string(), (method.kind, function));
    }

    let declared_init = match &def.shape {
        ClassShape::Dataclass(fields) => Some(Arc::new(synthesize_initializer(&def.name, fields))),
        _ => def.initializer.clone(),
    };
    let initializer = declared_init
        .map(|init| wrap(&init, options.clone().subclass(true).cache_size(0), &matcher))
        .transpose()?;

    let properties = def
        .properties
        .iter()
        .map(|builder| {
            let property = builder.clone().build_with(options.clone(), Arc::clone(&matcher))?;
            Ok((property.name().to_string(), property))
        })
        .collect::<Result<HashMap<_, _>, DeclarationError>>()?;

    matcher.types().register_class(def.schema());
    debug!(class = %def.name, methods = methods.len(), properties = properties.len(), "wrapped class");

    Ok(CheckedClass {
        def: Arc::new(def),
        matcher,
        methods,
        initializer,
        properties,
        record_check,
    })
}

impl CheckedClass {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn definition(&self) -> &Arc<ClassDef> {
        &self.def
    }

    /// The class object, as passed to class methods
    pub fn class_object(&self) -> Value {
        Value::class_object(self.name())
    }

    /// Construct an instance, or for record classes a validated mapping
    pub fn instantiate(&self, args: &CallArgs) -> Result<Value, CallError> {
        if let Some(check) = &self.record_check {
            let mapping = match (args.args(), args.kwargs()) {
                ([single], []) if single.dict_entries().is_some() => single.clone(),
                ([], kwargs) => Value::dict(kwargs.iter().map(|(k, v)| (Value::str(k.as_str()), v.clone()))),
                _ => {
                    return Err(CallError::Arguments(format!(
                        "{}() takes a single mapping or keyword arguments",
                        self.name()
                    )))
                }
            };
            return check.call(&CallArgs::new().arg(mapping));
        }

        let instance = Value::object(self.name());
        match &self.initializer {
            Some(init) => {
                init.call(&args.with_receiver(instance.clone()))?;
            }
            None if args.args().is_empty() && args.kwargs().is_empty() => {}
            None => return Err(CallError::Arguments(format!("{}() takes no arguments", self.name()))),
        }
        Ok(instance)
    }

    pub fn is_instance(&self, value: &Value) -> bool {
        match &self.def.shape {
            ClassShape::Record(record) => self.matcher.matches(value, &Type::record(Arc::clone(record))) == Ok(true),
            _ => self.matcher.types().is_instance(value, self.name()),
        }
    }

    pub fn call_method(&self, receiver: &Value, name: &str, args: &CallArgs) -> Result<Value, CallError> {
        let (kind, function) = self.methods.get(name).ok_or_else(|| self.no_attribute(name))?;
        match kind {
            MethodKind::Instance => {
                if !self.is_instance(receiver) {
                    return Err(CallError::Arguments(format!(
                        "descriptor '{}' for '{}' objects doesn't apply to a '{}' object",
                        name,
                        self.name(),
                        receiver.class_name()
                    )));
                }
                function.call(&args.with_receiver(receiver.clone()))
            }
            MethodKind::Class => function.call(&args.with_receiver(self.class_object())),
            MethodKind::Static => function.call(args),
        }
    }

    /// Call a static or class method without an instance
    pub fn call_static(&self, name: &str, args: &CallArgs) -> Result<Value, CallError> {
        match self.methods.get(name) {
            Some((MethodKind::Static, function)) => function.call(args),
            Some((MethodKind::Class, function)) => function.call(&args.with_receiver(self.class_object())),
            Some((MethodKind::Instance, _)) => Err(CallError::Arguments(format!(
                "{}.{}() needs an instance",
                self.name(),
                name
            ))),
            None => Err(self.no_attribute(name)),
        }
    }

    /// Attribute lookup: properties, instance attributes, methods, then class variables
    pub fn get_attr(&self, receiver: &Value, name: &str) -> Result<Value, CallError> {
        if let Some(property) = self.properties.get(name) {
            return property.get(receiver);
        }
        if let Some(value) = receiver.get_attr(name) {
            return Ok(value);
        }
        if let Some((kind, function)) = self.methods.get(name) {
            let function = Arc::clone(function);
            return Ok(match kind {
                MethodKind::Instance => Value::Method(Arc::new(BoundMethod::new(receiver.clone(), function))),
                MethodKind::Class => Value::Method(Arc::new(BoundMethod::new(self.class_object(), function))),
                MethodKind::Static => Value::Function(function),
            });
        }
        self.def
            .class_var_value(name)
            .cloned()
            .ok_or_else(|| self.no_attribute(name))
    }

    pub fn set_attr(&self, receiver: &Value, name: &str, value: Value) -> Result<(), CallError> {
        if let Some(property) = self.properties.get(name) {
            return property.set(receiver, value);
        }
        match receiver {
            Value::Object(instance) => {
                instance.set_attr(name, value);
                Ok(())
            }
            other => Err(CallError::Attribute(format!(
                "'{}' object attribute '{}' is read-only",
                other.class_name(),
                name
            ))),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Whether `name` resolves to a wrapped (checked) invoker
    pub fn is_checked(&self, name: &str) -> bool {
        match name {
            INITIALIZER => self.initializer.as_ref().map_or(false, |f| f.is_checked()),
            _ => self.methods.get(name).map_or(false, |(_, f)| f.is_checked()),
        }
    }

    fn no_attribute(&self, name: &str) -> CallError {
        let candidates = self
            .methods
            .keys()
            .chain(self.properties.keys())
            .map(String::as_str)
            .chain(self.def.class_vars.iter().map(|(n, _)| n.as_str()));
        let mut message = format!("'{}' object has no attribute '{}'", self.name(), name);
        if let Some(similar) = find_similar_names(name, candidates, 2).first() {
            message.push_str(&format!(". Did you mean: '{}'?", similar));
        }
        CallError::Attribute(message)
    }
}

impl fmt::Display for CheckedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}'>", self.name())
    }
}

impl fmt::Debug for CheckedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedClass")
            .field("name", &self.def.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}
