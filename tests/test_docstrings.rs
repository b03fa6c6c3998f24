use std::sync::Arc;
use typthon_guard::core::{ClassSchema, Type, TypeContext, Value};
use typthon_guard::frontend::docstring::fill_from_docstring;
use typthon_guard::frontend::{document, render, DocStyle};
use typthon_guard::runtime::{validate_with, CallArgs, Function, GuardOptions};
use typthon_guard::{Severity, TypeMatcher};

const MENU_SOURCE: &str = r#"
def show(menu_definition, visible=None):
    """
    :param menu_definition: the menu layout
    :type menu_definition: Menu
    :param visible: control visibility of element
    :type visible: bool
    """
"#;

#[test]
fn test_docstring_types_drive_validation() {
    let ctx = Arc::new(TypeContext::new());
    ctx.register_class(ClassSchema::new("Menu"));
    let matcher = Arc::new(TypeMatcher::new(Arc::clone(&ctx)));

    let show = Function::from_source_in(MENU_SOURCE, &ctx, |_| Ok(Value::Bool(true))).unwrap();
    assert!(show.signature().params().iter().all(|p| p.annotation.is_none()));

    let show = fill_from_docstring(&show, &ctx).unwrap();
    assert_eq!(show.signature().params()[0].annotation, Some(Type::class("Menu")));
    let show = validate_with(show, GuardOptions::default().severity(Severity::Enabled), matcher).unwrap();

    let menu = Value::object("Menu");
    assert!(show.call(&CallArgs::new().arg(menu.clone())).is_ok());
    assert!(show.call(&CallArgs::new().arg(menu.clone()).kwarg("visible", false)).is_ok());
    assert!(show.call(&CallArgs::new().arg(Value::Int(3))).is_err());
    assert!(show.call(&CallArgs::new().arg(menu).arg(12)).is_err());
}

#[test]
fn test_docstring_tuple_and_union_forms() {
    let ctx = Arc::new(TypeContext::new());
    let matcher = Arc::new(TypeMatcher::new(Arc::clone(&ctx)));
    let source = "def f(a, b=None):\n    \"\"\"\n    :type a: (int, str, str)\n    :type b: list, tuple\n    \"\"\"\n";
    let f = Function::from_source_in(source, &ctx, |_| Ok(Value::None)).unwrap();
    let f = validate_with(
        fill_from_docstring(&f, &ctx).unwrap(),
        GuardOptions::default().severity(Severity::Enabled),
        matcher,
    )
    .unwrap();

    let triple = Value::tuple([Value::Int(1), Value::str("a"), Value::str("b")]);
    assert!(f.call(&CallArgs::new().arg(triple.clone()).kwarg("b", Value::list([]))).is_ok());
    assert!(f.call(&CallArgs::new().arg(triple.clone()).kwarg("b", Value::tuple([]))).is_ok());
    assert!(f.call(&CallArgs::new().arg(triple).kwarg("b", Value::set([]))).is_err());
    assert!(f.call(&CallArgs::new().arg(Value::tuple([Value::str("a"), Value::str("b")]))).is_err());
}

#[test]
fn test_rendered_docs_attach_to_copy() {
    let ctx = TypeContext::new();
    let source = "def scale(value: float, factor: int = 2) -> float:\n    \"\"\"Scale a value.\"\"\"\n";
    let scale = Function::from_source_in(source, &ctx, |_| Ok(Value::None)).unwrap();

    let documented = document(&scale, DocStyle::Rest);
    assert_eq!(scale.doc(), Some("Scale a value."));
    assert_eq!(
        documented.doc(),
        Some(
            "Scale a value.\n\n\
             :param value: argument\n\
             :param factor: argument (Default value = 2)\n\
             :type value: float\n\
             :type factor: int\n\
             :returns: float"
        )
    );

    let summary = render(&scale, DocStyle::Summary);
    assert!(summary.starts_with("Function: scale\n------------------------------\n:param: value\n:type: float"));
}
