//! Documentation rendered from signatures
//!
//! Three layouts are supported: reST field lists, numpy sections and a short
//! summary block that also names validator predicates. Types are written in
//! the docstring grammar understood by [`crate::frontend::docstring`], so a
//! rendered reST docstring can be read back.

use crate::core::types::Type;
use crate::runtime::function::{Function, Param, ParamKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStyle {
    #[default]
    Rest,
    Numpy,
    Summary,
}

fn kind_label(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::KeywordOnly => "keyword only argument",
        ParamKind::PositionalOnly => "positional only argument",
        ParamKind::PositionalOrKeyword => "argument",
        ParamKind::VarPositional => "variadic arguments",
        ParamKind::VarKeyword => "variadic keyword arguments",
    }
}

fn join(types: &[Type], sep: &str) -> String {
    types.iter().map(describe).collect::<Vec<_>>().join(sep)
}

/// Type in docstring grammar: `list(int)`, `int or str`, `dict(str, int)`
pub fn describe(ty: &Type) -> String {
    match ty {
        Type::Union(branches) => join(branches, " or "),
        Type::Optional(inner) => format!("{} or None", describe(inner)),
        Type::List(args) if !args.is_empty() => format!("list({})", join(args, ", ")),
        Type::Set(args) if !args.is_empty() => format!("set({})", join(args, ", ")),
        Type::Dict(args) if !args.is_empty() => format!("dict({})", join(args, ", ")),
        Type::Tuple(args) if !args.is_empty() => format!("tuple({})", join(args, ", ")),
        Type::List(_) => "list".to_string(),
        Type::Set(_) => "set".to_string(),
        Type::Dict(_) => "dict".to_string(),
        Type::Tuple(_) => "tuple".to_string(),
        Type::Named(name) => name.clone(),
        Type::Literal(values) => {
            let kind = values.first().map(|v| v.class_name().to_string()).unwrap_or_default();
            let allowed = values.iter().map(|v| format!("`{}`", v)).collect::<Vec<_>>().join(" or ");
            format!("`{}` allowed values are {}", kind, allowed)
        }
        Type::Record(schema) => {
            let fields = schema
                .fields()
                .iter()
                .map(|f| format!("{}: {}", f.name, describe(schema.field_type(f))))
                .collect::<Vec<_>>()
                .join(", ");
            let required = if schema.total() { " required" } else { "" };
            format!("{}[record]{} fields are {}", schema.name(), required, fields)
        }
        Type::Required(inner) | Type::NotRequired(inner) => describe(inner),
        Type::Validator(spec) => {
            let tag = if spec.is_per_element() { "IterValidator" } else { "Validator" };
            format!("{}[{}]", describe(spec.base()), tag)
        }
        other => other.to_string(),
    }
}

fn param_type(param: &Param) -> String {
    match (&param.annotation, param.kind) {
        (Some(ty), _) => describe(ty),
        (None, ParamKind::VarPositional) => "tuple".to_string(),
        (None, ParamKind::VarKeyword) => "dict".to_string(),
        (None, _) => "Any".to_string(),
    }
}

/// Annotated parameters first, then the rest; the receiver is left out
fn documented_params(function: &Function) -> Vec<&Param> {
    let params = function.signature().params();
    let annotated = params.iter().filter(|p| p.annotation.is_some());
    let rest = params
        .iter()
        .filter(|p| p.annotation.is_none() && p.name != "self" && p.name != "cls");
    annotated.chain(rest).collect()
}

fn rest(function: &Function) -> String {
    let mut params = Vec::new();
    let mut types = Vec::new();
    for param in documented_params(function) {
        let mut line = format!(":param {}: {}", param.name, kind_label(param.kind));
        if let Some(default) = &param.default {
            line.push_str(&format!(" (Default value = {})", default));
        }
        params.push(line);
        types.push(format!(":type {}: {}", param.name, param_type(param)));
    }
    if let Some(ret) = function.signature().returns() {
        types.push(format!(":returns: {}", describe(ret)));
    }
    params.extend(types);
    params.join("\n")
}

fn numpy(function: &Function) -> String {
    let mut lines = vec!["Parameters".to_string(), "----------".to_string()];
    for param in documented_params(function) {
        let mut entry = format!("{} : {} of type {}", param.name, kind_label(param.kind), param_type(param));
        if let Some(default) = &param.default {
            entry.push_str(&format!("\n\tDefault is {}", default));
        }
        lines.push(entry);
    }
    if let Some(ret) = function.signature().returns() {
        lines.extend(["".to_string(), "Returns".to_string(), "-------".to_string(), describe(ret)]);
    }
    lines.join("\n")
}

fn summary(function: &Function) -> String {
    let mut lines = vec![format!("Function: {}", function.name()), "-".repeat(30)];
    for param in function.signature().params() {
        let Some(ty) = &param.annotation else {
            continue;
        };
        lines.push(format!(":param: {}", param.name));
        lines.push(format!(":type: {}", ty));
        if let Type::Validator(spec) = ty {
            lines.push(format!(":requirement: {}", spec.predicate()));
        }
    }
    if let Some(ret) = function.signature().returns() {
        lines.push(format!("\n:returns: {}", ret));
    }
    lines.join("\n")
}

/// Documentation block for `function` in the given layout
pub fn render(function: &Function, style: DocStyle) -> String {
    match style {
        DocStyle::Rest => rest(function),
        DocStyle::Numpy => numpy(function),
        DocStyle::Summary => summary(function),
    }
}

/// Copy of `function` carrying the rendered documentation.
///
/// reST and numpy blocks are appended to an existing docstring; the summary
/// layout replaces it.
pub fn document(function: &Function, style: DocStyle) -> Function {
    let rendered = render(function, style);
    let doc = match (style, function.doc()) {
        (DocStyle::Summary, _) => rendered,
        (_, Some(existing)) => format!("{}\n\n{}", existing.trim_end(), rendered),
        (_, None) if function.name() == "__init__" => rendered,
        (_, None) => format!("Function {}\n\n{}", function.name(), rendered),
    };
    function.duplicate().with_doc(doc)
}
