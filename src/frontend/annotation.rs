//! Annotation text to type descriptors
//!
//! Annotations are parsed as host-language expressions with
//! `rustpython-parser` and mapped onto `Type`. Names are resolved against a
//! `TypeContext`: builtins and `typing` names first, then registered aliases,
//! records and classes. Anything else becomes a forward reference.

use crate::core::classes::TypeContext;
use crate::core::types::Type;
use crate::core::validator::ValidatorSpec;
use crate::core::value::Value;
use crate::errors::DeclarationError;
use crate::runtime::function::{Param, ParamKind, Signature};
use rustpython_parser::ast::{self, Constant, Expr, Mod, Operator, Stmt, UnaryOp};
use rustpython_parser::{parse, Mode};
use std::sync::Arc;
use tracing::trace;

/// Name, signature and docstring of a parsed `def`
#[derive(Debug, Clone)]
pub struct DefHeader {
    pub name: String,
    pub signature: Signature,
    pub doc: Option<String>,
}

fn invalid(text: &str, message: impl Into<String>) -> DeclarationError {
    DeclarationError::InvalidAnnotation {
        text: text.to_string(),
        message: message.into(),
    }
}

/// Parse one annotation, e.g. `Dict[str, List[int]]` or `int | None`
pub fn parse_annotation(text: &str, ctx: &TypeContext) -> Result<Type, DeclarationError> {
    match parse(text, Mode::Expression, "<annotation>") {
        Ok(Mod::Expression(ast::ModExpression { body, .. })) => type_from_expr(&body, ctx, text),
        Ok(_) => Err(invalid(text, "expected an expression")),
        Err(e) => Err(invalid(text, e.to_string())),
    }
}

/// Parse a `def` statement and convert its parameter annotations
pub fn parse_def(source: &str, ctx: &TypeContext) -> Result<DefHeader, DeclarationError> {
    let module = parse(source, Mode::Module, "<def>").map_err(|e| invalid(source, e.to_string()))?;
    let Mod::Module(ast::ModModule { body, .. }) = module else {
        return Err(invalid(source, "expected a module"));
    };

    let (name, args, returns, body) = match body.first() {
        Some(Stmt::FunctionDef(def)) => (&def.name, &def.args, &def.returns, &def.body),
        Some(Stmt::AsyncFunctionDef(def)) => (&def.name, &def.args, &def.returns, &def.body),
        _ => return Err(invalid(source, "expected a function definition")),
    };

    let annotation = |expr: &Option<Box<Expr>>| -> Result<Option<Type>, DeclarationError> {
        expr.as_deref().map(|e| type_from_expr(e, ctx, source)).transpose()
    };
    let with_default = |arg: &ast::ArgWithDefault, kind: ParamKind| -> Result<Param, DeclarationError> {
        let param = Param::new(arg.def.arg.as_str(), annotation(&arg.def.annotation)?).kind(kind);
        Ok(match &arg.default {
            Some(default) => param.default(literal_default(default)),
            None => param,
        })
    };

    let mut params = Vec::new();
    for arg in &args.posonlyargs {
        params.push(with_default(arg, ParamKind::PositionalOnly)?);
    }
    for arg in &args.args {
        params.push(with_default(arg, ParamKind::PositionalOrKeyword)?);
    }
    if let Some(vararg) = &args.vararg {
        params.push(Param::new(vararg.arg.as_str(), annotation(&vararg.annotation)?).kind(ParamKind::VarPositional));
    }
    for arg in &args.kwonlyargs {
        params.push(with_default(arg, ParamKind::KeywordOnly)?);
    }
    if let Some(kwarg) = &args.kwarg {
        params.push(Param::new(kwarg.arg.as_str(), annotation(&kwarg.annotation)?).kind(ParamKind::VarKeyword));
    }

    let mut signature = Signature::new(params);
    if let Some(ret) = annotation(returns)? {
        signature = signature.returning(ret);
    }

    Ok(DefHeader {
        name: name.as_str().to_string(),
        signature,
        doc: docstring(body),
    })
}

fn docstring(body: &[Stmt]) -> Option<String> {
    let Some(Stmt::Expr(ast::StmtExpr { value, .. })) = body.first() else {
        return None;
    };
    match value.as_ref() {
        Expr::Constant(ast::ExprConstant {
            value: Constant::Str(text),
            ..
        }) => Some(clean_doc(text)),
        _ => None,
    }
}

/// Strip the common indentation of every line after the first
pub fn clean_doc(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first];
    cleaned.extend(rest.iter().map(|l| l.get(indent..).unwrap_or("").trim_end().to_string()));
    while cleaned.last().map_or(false, |l| l.is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().map_or(false, |l| l.is_empty()) {
        cleaned.remove(0);
    }
    cleaned.join("\n")
}

/// Defaults that are not literals are kept as `None`; they are never checked
fn literal_default(expr: &Expr) -> Value {
    literal_value(expr).unwrap_or_else(|| {
        trace!("non-literal default replaced by None");
        Value::None
    })
}

fn constant_value(constant: &Constant) -> Option<Value> {
    Some(match constant {
        Constant::None => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Str(s) => Value::str(s.as_str()),
        Constant::Bytes(b) => Value::Bytes(b.clone()),
        Constant::Int(i) => Value::Int(i.to_string().parse().ok()?),
        Constant::Float(f) => Value::Float(*f),
        Constant::Complex { real, imag } => Value::Complex(*real, *imag),
        Constant::Tuple(items) => Value::tuple(items.iter().map(constant_value).collect::<Option<Vec<_>>>()?),
        Constant::Ellipsis => return None,
    })
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Constant(c) => constant_value(&c.value),
        Expr::UnaryOp(ast::ExprUnaryOp {
            op: UnaryOp::USub,
            operand,
            ..
        }) => match literal_value(operand)? {
            Value::Int(i) => Some(Value::Int(-i)),
            Value::Float(f) => Some(Value::Float(-f)),
            _ => None,
        },
        Expr::List(l) => l.elts.iter().map(literal_value).collect::<Option<Vec<_>>>().map(Value::list),
        Expr::Tuple(t) => t.elts.iter().map(literal_value).collect::<Option<Vec<_>>>().map(Value::tuple),
        Expr::Set(s) => s.elts.iter().map(literal_value).collect::<Option<Vec<_>>>().map(Value::set),
        Expr::Dict(d) => {
            let pairs = d
                .keys
                .iter()
                .zip(&d.values)
                .map(|(k, v)| Some((literal_value(k.as_ref()?)?, literal_value(v)?)))
                .collect::<Option<Vec<_>>>()?;
            Some(Value::dict(pairs))
        }
        _ => None,
    }
}

/// Last segment of a dotted name: `typing.List` -> `List`
fn head_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Name(n) => Some(n.id.as_str()),
        Expr::Attribute(a) => Some(a.attr.as_str()),
        _ => None,
    }
}

/// Convert a parsed annotation expression
pub fn type_from_expr(expr: &Expr, ctx: &TypeContext, text: &str) -> Result<Type, DeclarationError> {
    match expr {
        Expr::Name(_) | Expr::Attribute(_) => {
            let name = head_name(expr).unwrap_or_default();
            Ok(bare_name(name, ctx))
        }
        Expr::Constant(c) => match &c.value {
            Constant::None => Ok(Type::None),
            Constant::Str(s) => Ok(Type::named(s.as_str())),
            Constant::Ellipsis => Ok(Type::Ellipsis),
            other => Err(invalid(text, format!("unexpected constant {:?}", other))),
        },
        Expr::BinOp(b) if b.op == Operator::BitOr => Ok(Type::union(vec![
            type_from_expr(&b.left, ctx, text)?,
            type_from_expr(&b.right, ctx, text)?,
        ])),
        Expr::Subscript(s) => {
            let head = head_name(&s.value).ok_or_else(|| invalid(text, "unsupported generic origin"))?;
            let args: Vec<&Expr> = match s.slice.as_ref() {
                Expr::Tuple(t) => t.elts.iter().collect(),
                single => vec![single],
            };
            subscript(head, &args, ctx, text)
        }
        _ => Err(invalid(text, "unsupported annotation expression")),
    }
}

fn bare_name(name: &str, ctx: &TypeContext) -> Type {
    match name {
        "Any" => Type::Any,
        "None" | "NoneType" => Type::None,
        "list" | "List" => Type::List(Vec::new()),
        "set" | "Set" | "frozenset" | "FrozenSet" => Type::Set(Vec::new()),
        "tuple" | "Tuple" => Type::Tuple(Vec::new()),
        "dict" | "Dict" => Type::Dict(Vec::new()),
        "Type" => Type::class("type"),
        "Callable" => Type::Callable(None),
        "Iterator" | "Iterable" => Type::Iterator,
        "Generator" => Type::Generator,
        "json" | "Json" | "JSON" => Type::Json,
        _ => {
            if let Some(alias) = ctx.get_alias(name) {
                Type::new_type(name, alias)
            } else if let Some(record) = ctx.get_record(name) {
                Type::record(record)
            } else if ctx.has_class(name) {
                Type::class(name)
            } else {
                Type::named(name)
            }
        }
    }
}

fn subscript(head: &str, args: &[&Expr], ctx: &TypeContext, text: &str) -> Result<Type, DeclarationError> {
    let all = |args: &[&Expr]| {
        args.iter()
            .map(|e| type_from_expr(e, ctx, text))
            .collect::<Result<Vec<_>, _>>()
    };
    let single = |args: &[&Expr]| -> Result<Type, DeclarationError> {
        match args {
            [only] => type_from_expr(only, ctx, text),
            _ => Err(invalid(text, format!("{}[] takes exactly one argument", head))),
        }
    };

    match head {
        "list" | "List" | "Sequence" => Ok(Type::List(all(args)?)),
        "set" | "Set" | "frozenset" | "FrozenSet" => Ok(Type::Set(all(args)?)),
        "dict" | "Dict" | "Mapping" => Ok(Type::Dict(all(args)?)),
        "tuple" | "Tuple" => Ok(Type::Tuple(all(args)?)),
        "Union" => Ok(Type::union(all(args)?)),
        "Optional" => Ok(Type::optional(single(args)?)),
        "Type" | "type" => Ok(Type::type_of(single(args)?)),
        "Required" => Ok(Type::required(single(args)?)),
        "NotRequired" => Ok(Type::not_required(single(args)?)),
        "Unpack" => single(args),
        "Annotated" => match args.first() {
            Some(first) => type_from_expr(first, ctx, text),
            None => Err(invalid(text, "Annotated[] needs a type")),
        },
        "Iterator" | "Iterable" => Ok(Type::Iterator),
        "Generator" => Ok(Type::Generator),
        "Literal" => args
            .iter()
            .map(|e| literal_value(e).ok_or_else(|| invalid(text, "Literal[] arguments must be literals")))
            .collect::<Result<Vec<_>, _>>()
            .map(Type::Literal),
        "Callable" => callable(args, ctx, text),
        "Validator" | "IterValidator" => validator(head == "IterValidator", args, ctx, text),
        _ => Ok(Type::generic(head, all(args)?)),
    }
}

fn callable(args: &[&Expr], ctx: &TypeContext, text: &str) -> Result<Type, DeclarationError> {
    let [params, ret] = args else {
        return Err(invalid(text, "Callable[] takes a parameter list and a return type"));
    };
    match params {
        Expr::Constant(ast::ExprConstant {
            value: Constant::Ellipsis,
            ..
        }) => Ok(Type::Callable(None)),
        Expr::List(list) => {
            let params = list
                .elts
                .iter()
                .map(|e| type_from_expr(e, ctx, text))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Type::callable(params, type_from_expr(ret, ctx, text)?))
        }
        _ => Err(invalid(text, "Callable[] parameters must be a list or '...'")),
    }
}

/// `Validator[base, predicate]` or `Validator[base, predicate, default]`
fn validator(each: bool, args: &[&Expr], ctx: &TypeContext, text: &str) -> Result<Type, DeclarationError> {
    let (base, name, default) = match args {
        [base, name] => (base, name, None),
        [base, name, default] => (base, name, Some(default)),
        _ => return Err(invalid(text, "Validator[] takes a type, a predicate name and an optional default")),
    };
    let predicate_name = head_name(name).ok_or_else(|| invalid(text, "validator predicate must be a name"))?;
    let predicate = ctx
        .get_predicate(predicate_name)
        .ok_or_else(|| DeclarationError::UnknownPredicate(predicate_name.to_string()))?;

    let mut spec = ValidatorSpec::new(type_from_expr(base, ctx, text)?, predicate);
    if each {
        spec = spec.per_element();
    }
    if let Some(default) = default {
        let value = literal_value(default).ok_or_else(|| invalid(text, "validator default must be a literal"))?;
        spec = spec.with_default(value);
    }
    let ty = Type::Validator(Arc::new(spec));
    ty.check_declaration()?;
    Ok(ty)
}
