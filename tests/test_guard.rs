use std::sync::Arc;
use typthon_guard::core::{Predicate, RecordSchema, Type, TypeContext, Value};
use typthon_guard::errors::CallError;
use typthon_guard::runtime::{catch_warnings, validate_with, CallArgs, Function, GuardOptions};
use typthon_guard::{Severity, SeverityOption, TypeMatcher};

fn setup() -> (Arc<TypeContext>, Arc<TypeMatcher>) {
    let ctx = Arc::new(TypeContext::new());
    let matcher = Arc::new(TypeMatcher::new(Arc::clone(&ctx)));
    (ctx, matcher)
}

fn enabled() -> GuardOptions {
    GuardOptions::default().severity(Severity::Enabled)
}

fn echo(source: &str, ctx: &TypeContext) -> Function {
    Function::from_source_in(source, ctx, |args| Ok(Value::tuple(args.args().to_vec()))).unwrap()
}

#[test]
fn test_parsed_signature_is_enforced() {
    let (ctx, matcher) = setup();
    let f = echo("def f(a: int, b: List[str], c: Optional[Dict[str, int]] = None) -> tuple: ...", &ctx);
    let checked = validate_with(f, enabled(), matcher).unwrap();

    let ok = CallArgs::new().arg(1).arg(Value::list([Value::str("x")]));
    assert!(checked.call(&ok).is_ok());

    let bad = CallArgs::new()
        .arg(1)
        .arg(Value::list([Value::Int(2)]))
        .kwarg("c", Value::dict([(Value::str("k"), Value::str("v"))]));
    let Err(CallError::Mismatch(mismatch)) = checked.call(&bad) else {
        panic!("expected a mismatch");
    };
    let names: Vec<&str> = mismatch.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
    assert_eq!(
        mismatch.warning_message(),
        "Incorrect parameters: b: List[str], c: Optional[Dict[str, int]]"
    );
}

#[test]
fn test_variadic_arguments_checked_individually() {
    let (ctx, matcher) = setup();
    let f = echo("def f(*values: int, **options: str): ...", &ctx);
    let checked = validate_with(f, enabled(), matcher).unwrap();

    assert!(checked.call(&CallArgs::positional([Value::Int(1), Value::Int(2)]).kwarg("mode", "fast")).is_ok());
    assert!(checked.call(&CallArgs::positional([Value::Int(1), Value::str("2")])).is_err());
    assert!(checked.call(&CallArgs::new().kwarg("mode", 3)).is_err());
}

#[test]
fn test_unpacked_keywords_validate_against_record() {
    let (ctx, matcher) = setup();
    let movie = RecordSchema::builder("Movie")
        .field("title", Type::str())
        .field("year", Type::int())
        .build()
        .unwrap();
    ctx.register_record(movie);
    let f = echo("def add(**movie: Unpack[Movie]): ...", &ctx);
    let checked = validate_with(f, enabled(), matcher).unwrap();

    assert!(checked.call(&CallArgs::new().kwarg("title", "Alien").kwarg("year", 1979)).is_ok());
    assert!(checked.call(&CallArgs::new().kwarg("title", "Alien")).is_err());
    assert!(checked
        .call(&CallArgs::new().kwarg("title", "Alien").kwarg("year", 1979).kwarg("rating", 5))
        .is_err());
}

#[test]
fn test_unexpected_keyword_suggests_parameter() {
    let (ctx, matcher) = setup();
    let checked = validate_with(echo("def f(value: int): ...", &ctx), enabled(), matcher).unwrap();
    let err = checked.call(&CallArgs::new().kwarg("valeu", 1)).unwrap_err();
    assert!(matches!(&err, CallError::Arguments(_)));
    assert!(err.to_string().contains("did you mean 'value'?"));
}

#[test]
fn test_validator_annotation_from_source() {
    let (ctx, matcher) = setup();
    ctx.register_predicate(Predicate::new("small", |v| v.as_int().map_or(false, |i| (0..100).contains(&i))));
    let f = echo("def f(a: Validator[int, small, -1]): ...", &ctx);
    let checked = validate_with(f, enabled(), matcher).unwrap();

    assert_eq!(
        checked.call(&CallArgs::new().arg(5)).unwrap(),
        Value::tuple([Value::Int(5)])
    );
    assert_eq!(checked.call(&CallArgs::new().arg(500)).unwrap(), Value::Int(-1));
    assert!(matches!(checked.call(&CallArgs::new().arg("5")), Err(CallError::Mismatch(_))));
}

#[test]
fn test_severity_from_environment_lookup() {
    let lookup = |value: &'static str| move |_: &str| Some(value.to_string());
    assert_eq!(SeverityOption::Env.resolve_with(lookup("0")).unwrap(), Severity::Disabled);
    assert_eq!(SeverityOption::Env.resolve_with(lookup("warning")).unwrap(), Severity::Warning);
    assert_eq!(SeverityOption::Env.resolve_with(|_: &str| None).unwrap(), Severity::Enabled);
    assert!(SeverityOption::Env.resolve_with(lookup("loud")).is_err());
}

#[test]
fn test_warning_severity_collects_each_failure() {
    let (ctx, matcher) = setup();
    let f = echo("def f(a: int, b: str): ...", &ctx);
    let checked = validate_with(f, GuardOptions::default().severity(Severity::Warning), matcher).unwrap();
    let (result, caught) = catch_warnings(|| checked.call(&CallArgs::positional([Value::str("a"), Value::Int(2)])));
    assert!(result.is_ok());
    assert_eq!(caught.len(), 1);
    assert_eq!(caught[0].message, "Incorrect parameters: a: int, b: str");
    assert_eq!(caught[0].function, "f");
}

#[test]
fn test_cache_only_remembers_passing_calls() {
    let (ctx, matcher) = setup();
    let checked = validate_with(echo("def f(a: int): ...", &ctx), enabled(), matcher).unwrap();
    for i in 0..50i64 {
        assert!(checked.call(&CallArgs::new().arg(i)).is_ok());
        assert!(checked.call(&CallArgs::new().arg(i)).is_ok());
        assert!(checked.call(&CallArgs::new().arg(Value::str(i.to_string()))).is_err());
    }
    let stats = checked.cache_stats().unwrap();
    assert_eq!(stats.inserts, 50);
    assert_eq!(stats.hits, 50);
}
