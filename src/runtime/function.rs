//! Callables with introspectable signatures

use crate::core::classes::TypeContext;
use crate::core::inspect::unwrap_alias;
use crate::core::types::Type;
use crate::core::value::Value;
use crate::errors::{find_similar_names, CallError, DeclarationError};
use crate::frontend::{annotation, docstring};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub type Body = dyn Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParamKind {
    fn accepts_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }

    fn accepts_keyword(self) -> bool {
        matches!(self, ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<Type>,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, annotation: Option<Type>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            annotation,
            default: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, Some(ty))
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.kind, ParamKind::VarPositional | ParamKind::VarKeyword)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Signature {
    params: Vec<Param>,
    returns: Option<Type>,
}

impl Signature {
    pub fn new(params: Vec<Param>) -> Self {
        Self { params, returns: None }
    }

    pub fn returning(mut self, ty: Type) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> Option<&Type> {
        self.returns.as_ref()
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub(crate) fn params_mut(&mut self) -> &mut [Param] {
        &mut self.params
    }

    /// Annotated parameters in declaration order, plus `return` when present
    pub fn annotations(&self) -> Vec<(String, Type)> {
        let mut table: Vec<(String, Type)> = self
            .params
            .iter()
            .filter_map(|p| p.annotation.clone().map(|t| (p.name.clone(), t)))
            .collect();
        if let Some(ret) = &self.returns {
            table.push(("return".to_string(), ret.clone()));
        }
        table
    }

    pub fn has_annotations(&self) -> bool {
        self.returns.is_some() || self.params.iter().any(|p| p.annotation.is_some())
    }
}

/// Positional and keyword arguments of one call
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.kwargs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.kwargs.push((name, value)),
        }
        self
    }

    /// Same arguments with `receiver` prepended
    pub fn with_receiver(&self, receiver: Value) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(receiver);
        args.extend(self.args.iter().cloned());
        Self {
            args,
            kwargs: self.kwargs.clone(),
        }
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &[(String, Value)] {
        &self.kwargs
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Argument bound to `name` either by keyword or at `index`
    pub fn lookup(&self, name: &str, index: usize) -> Option<&Value> {
        self.keyword(name).or_else(|| self.get(index))
    }
}

/// One argument paired with the descriptor it is checked against
#[derive(Debug, Clone)]
pub struct BoundArgument<'a> {
    pub name: Cow<'a, str>,
    pub value: Cow<'a, Value>,
    pub annotation: Option<&'a Type>,
}

pub struct Function {
    name: String,
    signature: Signature,
    doc: Option<String>,
    body: Arc<Body>,
    checked: bool,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            doc: None,
            body: Arc::new(body),
            checked: false,
        }
    }

    /// Declare a function from a `def` header, resolving names in the global context
    pub fn from_source<F>(source: &str, body: F) -> Result<Self, DeclarationError>
    where
        F: Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self::from_source_in(source, &TypeContext::global(), body)
    }

    pub fn from_source_in<F>(source: &str, ctx: &TypeContext, body: F) -> Result<Self, DeclarationError>
    where
        F: Fn(&CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let header = annotation::parse_def(source, ctx)?;
        Ok(Self {
            name: header.name,
            signature: header.signature,
            doc: header.doc,
            body: Arc::new(body),
            checked: false,
        })
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Append a parameter to the signature
    pub fn param(mut self, param: Param) -> Self {
        self.signature.params.push(param);
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.signature.returns = Some(ty);
        self
    }

    /// Fill unannotated parameters from `:type name: T` lines of the docstring
    pub fn with_docstring_types(self) -> Result<Self, DeclarationError> {
        docstring::fill_from_docstring(&self, &TypeContext::global())
    }

    pub(crate) fn into_checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn signature_mut(&mut self) -> &mut Signature {
        &mut self.signature
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// True when calls already go through argument validation
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Copy of this function sharing the same body
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            doc: self.doc.clone(),
            body: Arc::clone(&self.body),
            checked: self.checked,
        }
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value, CallError> {
        (self.body)(args)
    }

    /// Pair every argument with its parameter.
    ///
    /// With `skip_receiver` the first positional argument and the first
    /// positional parameter are dropped before binding. A variadic keyword
    /// parameter annotated with a record binds all surplus keywords as one
    /// mapping checked against that record.
    pub fn bind<'a>(&'a self, args: &'a CallArgs, skip_receiver: bool) -> Result<Vec<BoundArgument<'a>>, CallError> {
        let mut params: &[Param] = &self.signature.params;
        let mut positional: &[Value] = &args.args;
        if skip_receiver {
            if params.first().map_or(false, |p| p.kind.accepts_positional()) {
                params = &params[1..];
            }
            positional = positional.get(1..).unwrap_or_default();
        }

        let mut bound = Vec::with_capacity(positional.len() + args.kwargs.len());
        let mut filled: HashSet<&str> = HashSet::new();

        let slots: Vec<&Param> = params.iter().filter(|p| p.kind.accepts_positional()).collect();
        let (direct, surplus) = positional.split_at(positional.len().min(slots.len()));
        for (param, value) in slots.iter().zip(direct) {
            filled.insert(&param.name);
            bound.push(BoundArgument {
                name: Cow::Borrowed(param.name.as_str()),
                value: Cow::Borrowed(value),
                annotation: param.annotation.as_ref(),
            });
        }

        if !surplus.is_empty() {
            match params.iter().find(|p| p.kind == ParamKind::VarPositional) {
                Some(var) => bound.extend(surplus.iter().map(|value| BoundArgument {
                    name: Cow::Borrowed(var.name.as_str()),
                    value: Cow::Borrowed(value),
                    annotation: var.annotation.as_ref(),
                })),
                None => {
                    return Err(CallError::Arguments(format!(
                        "{}() takes {} positional arguments but {} were given",
                        self.name,
                        slots.len(),
                        positional.len()
                    )))
                }
            }
        }

        let var_keyword = params.iter().find(|p| p.kind == ParamKind::VarKeyword);
        let mut extra: Vec<&(String, Value)> = Vec::new();
        for entry in &args.kwargs {
            let (name, value) = entry;
            match params.iter().find(|p| p.kind.accepts_keyword() && p.name == *name) {
                Some(param) => {
                    if !filled.insert(&param.name) {
                        return Err(CallError::Arguments(format!(
                            "{}() got multiple values for argument '{}'",
                            self.name, name
                        )));
                    }
                    bound.push(BoundArgument {
                        name: Cow::Borrowed(param.name.as_str()),
                        value: Cow::Borrowed(value),
                        annotation: param.annotation.as_ref(),
                    });
                }
                None if var_keyword.is_some() => extra.push(entry),
                None => return Err(self.unexpected_keyword(name, params)),
            }
        }

        if let Some(var) = var_keyword {
            let unpack = var
                .annotation
                .as_ref()
                .filter(|ty| matches!(unwrap_alias(ty), Type::Record(_)));
            match unpack {
                Some(record) => bound.push(BoundArgument {
                    name: Cow::Borrowed(var.name.as_str()),
                    value: Cow::Owned(Value::dict(
                        extra.into_iter().map(|(k, v)| (Value::str(k.as_str()), v.clone())),
                    )),
                    annotation: Some(record),
                }),
                None => bound.extend(extra.into_iter().map(|(k, v)| BoundArgument {
                    name: Cow::Borrowed(k.as_str()),
                    value: Cow::Borrowed(v),
                    annotation: var.annotation.as_ref(),
                })),
            }
        }

        let missing: Vec<&str> = params
            .iter()
            .filter(|p| p.is_required() && !filled.contains(p.name.as_str()))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(CallError::Arguments(format!(
                "{}() missing {} required argument(s): {}",
                self.name,
                missing.len(),
                missing.iter().map(|n| format!("'{}'", n)).collect::<Vec<_>>().join(", ")
            )));
        }

        Ok(bound)
    }

    fn unexpected_keyword(&self, name: &str, params: &[Param]) -> CallError {
        let candidates = params.iter().filter(|p| p.kind.accepts_keyword()).map(|p| p.name.as_str());
        let mut message = format!("{}() got an unexpected keyword argument '{}'", self.name, name);
        if let Some(similar) = find_similar_names(name, candidates, 2).first() {
            message.push_str(&format!("; did you mean '{}'?", similar));
        }
        CallError::Arguments(message)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("checked", &self.checked)
            .finish()
    }
}

/// A function bound to the instance it was looked up on
#[derive(Debug)]
pub struct BoundMethod {
    receiver: Value,
    function: Arc<Function>,
}

impl BoundMethod {
    pub fn new(receiver: Value, function: Arc<Function>) -> Self {
        Self { receiver, function }
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value, CallError> {
        self.function.call(&args.with_receiver(self.receiver.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Function {
        let sig = Signature::new(vec![
            Param::typed("a", Type::int()),
            Param::typed("b", Type::str()).default(Value::str("x")),
            Param::typed("rest", Type::int()).kind(ParamKind::VarPositional),
            Param::typed("flag", Type::bool()).kind(ParamKind::KeywordOnly).default(Value::Bool(false)),
        ]);
        Function::new("sample", sig, |_| Ok(Value::None))
    }

    #[test]
    fn test_bind_positional_and_variadic() {
        let f = sample();
        let args = CallArgs::positional([Value::Int(1), Value::str("s"), Value::Int(2), Value::Int(3)]);
        let bound = f.bind(&args, false).unwrap();
        let names: Vec<&str> = bound.iter().map(|b| b.name.as_ref()).collect();
        assert_eq!(names, vec!["a", "b", "rest", "rest"]);
        assert_eq!(bound[2].annotation, Some(&Type::int()));
    }

    #[test]
    fn test_builder_extends_signature() {
        let f = Function::new("scale", Signature::default(), |_| Ok(Value::None))
            .param(Param::typed("value", Type::float()))
            .param(Param::typed("factor", Type::int()).default(Value::Int(2)))
            .returns(Type::float());
        assert_eq!(f.signature().params().len(), 2);
        assert_eq!(f.signature().returns(), Some(&Type::float()));
        assert!(f.signature().param("factor").map_or(false, |p| !p.is_required()));
    }

    #[test]
    fn test_bind_keywords() {
        let f = sample();
        let args = CallArgs::new().arg(1).kwarg("flag", true).kwarg("b", "q");
        let bound = f.bind(&args, false).unwrap();
        assert_eq!(bound.len(), 3);
        assert_eq!(bound[1].name, "flag");
    }

    #[test]
    fn test_bind_reports_call_shape_errors() {
        let f = sample();
        let missing = f.bind(&CallArgs::new(), false).unwrap_err();
        assert!(missing.to_string().contains("missing 1 required argument(s): 'a'"));

        let twice = f.bind(&CallArgs::new().arg(1).kwarg("a", 2), false).unwrap_err();
        assert!(twice.to_string().contains("multiple values"));

        let unknown = f.bind(&CallArgs::new().arg(1).kwarg("flg", true), false).unwrap_err();
        assert!(unknown.to_string().contains("did you mean 'flag'"));
    }

    #[test]
    fn test_bind_skips_receiver() {
        let sig = Signature::new(vec![Param::untyped("self"), Param::typed("x", Type::int())]);
        let f = Function::new("m", sig, |_| Ok(Value::None));
        let args = CallArgs::positional([Value::object("Thing"), Value::Int(5)]);
        let bound = f.bind(&args, true).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "x");
    }

    #[test]
    fn test_surplus_positional_rejected_without_var_positional() {
        let sig = Signature::new(vec![Param::typed("x", Type::int())]);
        let f = Function::new("one", sig, |_| Ok(Value::None));
        let err = f.bind(&CallArgs::positional([Value::Int(1), Value::Int(2)]), false).unwrap_err();
        assert!(matches!(err, CallError::Arguments(_)));
    }
}
