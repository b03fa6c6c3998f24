//! Call-time argument validation for a single callable
//!
//! `validate` turns a `Function` into a `CheckedFunction`. Everything that
//! can be decided once (descriptor well-formedness, severity, cache budget)
//! is decided there; `CheckedFunction::call` then binds arguments, runs the
//! matcher over each annotated one and either raises, warns, or calls through.

use crate::analysis::duck;
use crate::analysis::matcher::{MatchContext, TypeMatcher};
use crate::core::inspect::unwrap_alias;
use crate::core::types::Type;
use crate::core::value::Value;
use crate::errors::{CallError, DeclarationError, ExceptionKind, ParamFailure, TypeMismatch, ValidationError};
use crate::frontend::config::{Severity, SeverityOption};
use crate::performance::cache::{CacheKey, CacheStats, CachedSet};
use crate::runtime::function::{CallArgs, Function};
use crate::runtime::warnings::{self, RuntimeWarning};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Initializers are never served from the call cache
const INITIALIZER: &str = "__init__";

#[derive(Debug, Clone, PartialEq)]
pub struct GuardOptions {
    exception: Option<ExceptionKind>,
    severity: SeverityOption,
    cache_size: usize,
    subclass: bool,
    allow_duck_typing: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            exception: Some(ExceptionKind::TypeMismatch),
            severity: SeverityOption::Env,
            cache_size: 1,
            subclass: false,
            allow_duck_typing: false,
        }
    }
}

impl GuardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exception raised on mismatch; `None` reports mismatches as warnings
    pub fn exception(mut self, kind: Option<ExceptionKind>) -> Self {
        self.exception = kind;
        self
    }

    pub fn severity(mut self, severity: impl Into<SeverityOption>) -> Self {
        self.severity = severity.into();
        self
    }

    /// Cache budget in megabytes; 0 disables the cache
    pub fn cache_size(mut self, megabytes: usize) -> Self {
        self.cache_size = megabytes;
        self
    }

    /// Ignore the first positional argument and parameter (the receiver)
    pub fn subclass(mut self, enabled: bool) -> Self {
        self.subclass = enabled;
        self
    }

    pub fn allow_duck_typing(mut self, enabled: bool) -> Self {
        self.allow_duck_typing = enabled;
        self
    }

    pub fn exception_kind(&self) -> Option<&ExceptionKind> {
        self.exception.as_ref()
    }

    pub fn severity_option(&self) -> SeverityOption {
        self.severity
    }

    pub fn cache_budget(&self) -> usize {
        self.cache_size
    }

    pub fn is_subclass(&self) -> bool {
        self.subclass
    }

    pub fn allows_duck_typing(&self) -> bool {
        self.allow_duck_typing
    }
}

/// Result of checking every bound argument of one call
enum Verdict {
    Passed,
    /// A validator rejected an argument and supplied a value to return instead
    Fallback(Value),
    Failed(TypeMismatch),
}

/// A function whose calls are checked against its annotations
pub struct CheckedFunction {
    function: Arc<Function>,
    matcher: Arc<TypeMatcher>,
    exception: Option<ExceptionKind>,
    severity: Severity,
    cache: Option<CachedSet<CacheKey>>,
    subclass: bool,
    match_ctx: MatchContext,
    identity: String,
}

/// Wrap `function` using the global matcher
pub fn validate(function: impl Into<Arc<Function>>, options: GuardOptions) -> Result<CheckedFunction, DeclarationError> {
    validate_with(function, options, TypeMatcher::global())
}

/// Wrap `function` using an explicit matcher and its class registry
pub fn validate_with(
    function: impl Into<Arc<Function>>,
    options: GuardOptions,
    matcher: Arc<TypeMatcher>,
) -> Result<CheckedFunction, DeclarationError> {
    let function = function.into();
    for (_, ty) in function.signature().annotations() {
        ty.check_declaration()?;
    }

    let severity = options.severity.resolve()?;
    let cache = (options.cache_size > 0 && severity != Severity::Disabled)
        .then(|| CachedSet::new(options.cache_size));
    let match_ctx = if options.allow_duck_typing {
        MatchContext::duck_typed()
    } else {
        MatchContext::strict()
    };
    let identity = format!("{}@{:p}", function.name(), Arc::as_ptr(&function));

    debug!(
        function = function.name(),
        severity = ?severity,
        cache_mb = options.cache_size,
        subclass = options.subclass,
        duck_typing = options.allow_duck_typing,
        "wrapped callable"
    );

    Ok(CheckedFunction {
        function,
        matcher,
        exception: options.exception,
        severity,
        cache,
        subclass: options.subclass,
        match_ctx,
        identity,
    })
}

impl CheckedFunction {
    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(CachedSet::stats)
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value, CallError> {
        if self.severity == Severity::Disabled {
            return self.function.call(args);
        }

        let cache = self.cache.as_ref().filter(|_| self.function.name() != INITIALIZER);
        let key = cache.map(|_| CacheKey::for_call(&self.identity, args));
        if let (Some(cache), Some(key)) = (cache, &key) {
            if cache.contains(key) {
                trace!(function = self.name(), key = %key, "arguments already validated");
                return self.function.call(args);
            }
        }

        match self.check_arguments(args)? {
            Verdict::Passed => {
                if let (Some(cache), Some(key)) = (cache, key) {
                    cache.insert(key);
                }
            }
            Verdict::Fallback(value) => return Ok(value),
            Verdict::Failed(mismatch) => self.report(mismatch)?,
        }
        self.function.call(args)
    }

    fn check_arguments(&self, args: &CallArgs) -> Result<Verdict, CallError> {
        let bound = self.function.bind(args, self.subclass)?;
        let mut failures = Vec::new();
        let mut hints = Vec::new();

        for arg in &bound {
            let Some(expected) = arg.annotation else {
                continue;
            };
            match self.matcher.check(&arg.value, expected, self.match_ctx) {
                Ok(true) => {}
                Ok(false) => {
                    hints.extend(self.hint(&arg.name, &arg.value, expected));
                    failures.push(ParamFailure {
                        name: arg.name.to_string(),
                        value: arg.value.to_string(),
                        expected: expected.clone(),
                    });
                }
                Err(failure) => {
                    if let Some(default) = failure.validator.default() {
                        debug!(
                            function = self.name(),
                            param = %arg.name,
                            "validator rejected argument, returning its default"
                        );
                        return Ok(Verdict::Fallback(default.clone()));
                    }
                    return Err(ValidationError::from(failure).into());
                }
            }
        }

        if failures.is_empty() {
            return Ok(Verdict::Passed);
        }
        let kind = self.exception.clone().unwrap_or(ExceptionKind::TypeMismatch);
        let mismatch = hints.into_iter().fold(
            TypeMismatch::new(kind, self.name(), failures).with_annotations(self.function.signature().annotations()),
            TypeMismatch::with_suggestion,
        );
        Ok(Verdict::Failed(mismatch))
    }

    /// Point out failures that duck typing would have accepted
    fn hint(&self, name: &str, value: &Value, expected: &Type) -> Option<String> {
        if self.match_ctx.duck_typing {
            return None;
        }
        let Type::Class(required) = unwrap_alias(expected) else {
            return None;
        };
        let actual = value.class_name();
        duck::accepts(self.matcher.types(), actual, required).then(|| {
            format!(
                "'{}' is a {} where {} is required; allow_duck_typing would accept it",
                name, actual, required
            )
        })
    }

    fn report(&self, mismatch: TypeMismatch) -> Result<(), CallError> {
        match (self.severity, &self.exception) {
            (Severity::Enabled, Some(_)) => Err(mismatch.into()),
            _ => {
                warnings::warn(RuntimeWarning {
                    function: self.name().to_string(),
                    message: mismatch.warning_message(),
                });
                Ok(())
            }
        }
    }

    /// Plain function whose body runs through this validator
    pub fn into_function(self) -> Function {
        let name = self.function.name().to_string();
        let signature = self.function.signature().clone();
        let doc = self.function.doc().map(str::to_string);
        let checked = Function::new(name, signature, move |args: &CallArgs| self.call(args)).into_checked();
        match doc {
            Some(doc) => checked.with_doc(doc),
            None => checked,
        }
    }
}

impl fmt::Debug for CheckedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedFunction")
            .field("function", &self.function.name())
            .field("severity", &self.severity)
            .field("exception", &self.exception)
            .field("subclass", &self.subclass)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classes::TypeContext;
    use crate::core::validator::{Predicate, ValidatorSpec};
    use crate::runtime::function::{Param, Signature};
    use crate::runtime::warnings::catch_warnings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn matcher() -> Arc<TypeMatcher> {
        Arc::new(TypeMatcher::new(Arc::new(TypeContext::new())))
    }

    fn options(severity: Severity) -> GuardOptions {
        GuardOptions::default().severity(severity)
    }

    fn echo_int() -> Function {
        let sig = Signature::new(vec![Param::typed("val", Type::int())]);
        Function::new("echo", sig, |args| Ok(args.get(0).cloned().unwrap_or(Value::None)))
    }

    #[test]
    fn test_enabled_raises_type_mismatch() {
        let checked = validate_with(echo_int(), options(Severity::Enabled), matcher()).unwrap();
        assert_eq!(checked.call(&CallArgs::new().arg(3)).unwrap(), Value::Int(3));

        let err = checked.call(&CallArgs::new().arg("x")).unwrap_err();
        let CallError::Mismatch(mismatch) = err else {
            panic!("expected a type mismatch, got {:?}", err);
        };
        assert_eq!(mismatch.failures.len(), 1);
        assert_eq!(mismatch.failures[0].name, "val");
        assert_eq!(mismatch.failures[0].value, "'x'");
        assert_eq!(mismatch.annotations, vec![("val".to_string(), Type::int())]);
    }

    #[test]
    fn test_warning_calls_through() {
        let checked = validate_with(echo_int(), options(Severity::Warning), matcher()).unwrap();
        let (result, caught) = catch_warnings(|| checked.call(&CallArgs::new().arg("x")));
        assert_eq!(result.unwrap(), Value::str("x"));
        assert_eq!(caught.len(), 1);
        assert_eq!(caught[0].message, "Incorrect parameters: val: int");
    }

    #[test]
    fn test_missing_exception_downgrades_to_warning() {
        let opts = options(Severity::Enabled).exception(None);
        let checked = validate_with(echo_int(), opts, matcher()).unwrap();
        let (result, caught) = catch_warnings(|| checked.call(&CallArgs::new().arg(1.5)));
        assert!(result.is_ok());
        assert_eq!(caught.len(), 1);
    }

    #[test]
    fn test_disabled_skips_everything() {
        let checked = validate_with(echo_int(), options(Severity::Disabled), matcher()).unwrap();
        assert!(checked.cache_stats().is_none());
        let (result, caught) = catch_warnings(|| checked.call(&CallArgs::new().arg("x")));
        assert_eq!(result.unwrap(), Value::str("x"));
        assert!(caught.is_empty());
    }

    #[test]
    fn test_custom_exception_kind() {
        let opts = options(Severity::Enabled).exception(Some(ExceptionKind::ValueError));
        let checked = validate_with(echo_int(), opts, matcher()).unwrap();
        let err = checked.call(&CallArgs::new().arg("x")).unwrap_err();
        assert!(err.to_string().starts_with("ValueError: Incorrect parameters: val: int"));
    }

    #[test]
    fn test_cache_skips_revalidation() {
        let checked = validate_with(echo_int(), options(Severity::Enabled), matcher()).unwrap();
        checked.call(&CallArgs::new().arg(1)).unwrap();
        checked.call(&CallArgs::new().arg(1)).unwrap();
        let stats = checked.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.inserts, 1);
    }

    #[test]
    fn test_failures_are_never_cached() {
        let checked = validate_with(echo_int(), options(Severity::Warning), matcher()).unwrap();
        let ((), caught) = catch_warnings(|| {
            let _ = checked.call(&CallArgs::new().arg("x"));
            let _ = checked.call(&CallArgs::new().arg("x"));
        });
        assert_eq!(caught.len(), 2);
        assert_eq!(checked.cache_stats().unwrap().inserts, 0);
    }

    #[test]
    fn test_zero_cache_size_disables_cache() {
        let checked = validate_with(echo_int(), options(Severity::Enabled).cache_size(0), matcher()).unwrap();
        assert!(checked.cache_stats().is_none());
        assert!(checked.call(&CallArgs::new().arg(1)).is_ok());
    }

    #[test]
    fn test_initializer_bypasses_cache() {
        let sig = Signature::new(vec![Param::untyped("self"), Param::typed("x", Type::int())]);
        let init = Function::new(INITIALIZER, sig, |_| Ok(Value::None));
        let checked = validate_with(init, options(Severity::Enabled).subclass(true), matcher()).unwrap();
        let receiver = Value::object("Point");
        checked.call(&CallArgs::new().arg(receiver.clone()).arg(1)).unwrap();
        checked.call(&CallArgs::new().arg(receiver).arg(1)).unwrap();
        let stats = checked.cache_stats().unwrap();
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn test_subclass_mode_ignores_receiver() {
        let sig = Signature::new(vec![Param::typed("self", Type::int()), Param::typed("x", Type::int())]);
        let method = Function::new("m", sig, |_| Ok(Value::Bool(true)));
        let checked = validate_with(method, options(Severity::Enabled).subclass(true), matcher()).unwrap();
        assert!(checked.call(&CallArgs::new().arg("receiver").arg(2)).is_ok());
        assert!(checked.call(&CallArgs::new().arg("receiver").arg("2")).is_err());
    }

    #[test]
    fn test_validator_default_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let positive = Predicate::new("positive", |v| v.as_int().map_or(false, |i| i > 0));
        let spec = ValidatorSpec::new(Type::int(), positive).with_default(Value::str("fallback"));
        let sig = Signature::new(vec![Param::typed("n", Type::Validator(Arc::new(spec)))]);
        let f = Function::new("f", sig, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::str("called"))
        });
        let checked = validate_with(f, options(Severity::Enabled), matcher()).unwrap();

        assert_eq!(checked.call(&CallArgs::new().arg(-1)).unwrap(), Value::str("fallback"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(checked.call(&CallArgs::new().arg(5)).unwrap(), Value::str("called"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validator_without_default_raises_validation_error() {
        let longer = Predicate::new("longer_than_two", |v| v.len().map_or(false, |n| n > 2));
        let sig = Signature::new(vec![Param::typed("items", Type::validator(Type::list(Type::Any), longer))]);
        let f = Function::new("f", sig, |_| Ok(Value::None));
        let checked = validate_with(f, options(Severity::Enabled), matcher()).unwrap();

        assert!(checked.call(&CallArgs::new().arg(Value::list([1.into(), 2.into(), 3.into()]))).is_ok());
        let err = checked.call(&CallArgs::new().arg(Value::list([1.into(), 2.into()]))).unwrap_err();
        assert!(matches!(err, CallError::Validation(_)));
        assert!(err.to_string().contains("did not pass the validation of longer_than_two("));
    }

    #[test]
    fn test_duck_typing_option_and_hint() {
        let sig = Signature::new(vec![Param::typed("x", Type::float())]);
        let strict = validate_with(
            Function::new("half", sig.clone(), |_| Ok(Value::None)),
            options(Severity::Enabled),
            matcher(),
        )
        .unwrap();
        let CallError::Mismatch(mismatch) = strict.call(&CallArgs::new().arg(2)).unwrap_err() else {
            panic!("expected a type mismatch");
        };
        assert_eq!(mismatch.suggestions.len(), 1);
        assert!(mismatch.suggestions[0].contains("allow_duck_typing"));

        let ducked = validate_with(
            Function::new("half", sig, |_| Ok(Value::None)),
            options(Severity::Enabled).allow_duck_typing(true),
            matcher(),
        )
        .unwrap();
        assert!(ducked.call(&CallArgs::new().arg(2)).is_ok());
    }

    #[test]
    fn test_malformed_declaration_fails_at_decoration() {
        let sig = Signature::new(vec![Param::typed("t", Type::tuple(vec![Type::Ellipsis, Type::int()]))]);
        let f = Function::new("f", sig, |_| Ok(Value::None));
        assert!(validate_with(f, options(Severity::Enabled), matcher()).is_err());
    }

    #[test]
    fn test_empty_union_rejected_at_decoration() {
        let sig = Signature::new(vec![Param::typed("x", Type::union(vec![]))]);
        let f = Function::new("f", sig, |_| Ok(Value::None));
        let err = validate_with(f, options(Severity::Enabled), matcher()).unwrap_err();
        assert!(matches!(err, DeclarationError::Malformed(_)));
    }

    #[test]
    fn test_into_function_marks_checked() {
        let checked = validate_with(echo_int(), options(Severity::Enabled), matcher()).unwrap();
        let function = checked.into_function();
        assert!(function.is_checked());
        assert!(function.call(&CallArgs::new().arg("x")).is_err());
    }
}
