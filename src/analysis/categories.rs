//! Built-in category policies

use crate::analysis::duck;
use crate::analysis::matcher::{CategoryMatcher, MatchContext, MatchResult, TypeMatcher};
use crate::core::inspect::{unwrap_alias, Category};
use crate::core::record::Presence;
use crate::core::types::Type;
use crate::core::value::Value;
use crate::errors::PredicateFailure;
use std::sync::Arc;

pub(crate) fn register_builtin(matcher: &TypeMatcher) {
    matcher.register(Category::Class, Arc::new(ClassMatcher));
    matcher.register(Category::Named, Arc::new(NamedMatcher));
    matcher.register(Category::Union, Arc::new(UnionMatcher));
    matcher.register(Category::List, Arc::new(ListMatcher));
    matcher.register(Category::Set, Arc::new(SetMatcher));
    matcher.register(Category::Tuple, Arc::new(TupleMatcher));
    matcher.register(Category::Dict, Arc::new(DictMatcher));
    matcher.register(Category::Literal, Arc::new(LiteralMatcher));
    matcher.register(Category::TypeOf, Arc::new(TypeOfMatcher));
    matcher.register(Category::Callable, Arc::new(CallableMatcher));
    matcher.register(Category::Record, Arc::new(RecordMatcher));
    matcher.register(Category::Validator, Arc::new(ValidatorMatcher));
    matcher.register(Category::Json, Arc::new(JsonMatcher));
    matcher.register(Category::Iterator, Arc::new(ProtocolMatcher("Iterator")));
    matcher.register(Category::Generator, Arc::new(ProtocolMatcher("Generator")));
}

/// Match `items[i]` against `subs[i]`, reusing the first descriptor past the end
fn elementwise(matcher: &TypeMatcher, items: &[Value], subs: &[&Type], ctx: MatchContext) -> MatchResult {
    let Some(first) = subs.first() else {
        return Ok(true);
    };
    for (i, item) in items.iter().enumerate() {
        let ty = subs.get(i).unwrap_or(first);
        if !matcher.check(item, ty, ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Instance membership, widened by the duck-typing table when enabled
pub struct ClassMatcher;

impl CategoryMatcher for ClassMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, descriptor: &Type, _: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let required = match descriptor {
            Type::Class(name) => name.as_str(),
            Type::None => "NoneType",
            _ => return Ok(false),
        };
        let types = m.types();
        if types.is_instance(value, required) {
            return Ok(true);
        }
        Ok(ctx.duck_typing && duck::accepts(types, value.class_name(), required))
    }
}

/// Forward references compare the runtime class name only
pub struct NamedMatcher;

impl CategoryMatcher for NamedMatcher {
    fn matches(&self, _: &TypeMatcher, value: &Value, descriptor: &Type, _: Option<&[&Type]>, _: MatchContext) -> MatchResult {
        Ok(matches!(descriptor, Type::Named(name) if name == value.class_name()))
    }
}

pub struct UnionMatcher;

impl CategoryMatcher for UnionMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let Some(branches) = subs else {
            return Ok(false);
        };

        // Plain class branches first: a single membership test each
        let direct = branches.iter().any(|b| match unwrap_alias(b) {
            Type::Class(name) => m.types().is_instance(value, name),
            Type::None => value.is_none(),
            _ => false,
        });
        if direct {
            return Ok(true);
        }

        // A predicate failure in one branch only surfaces if no other branch conforms
        let mut failure = None;
        for branch in branches {
            match m.check(value, branch, ctx) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        failure.map_or(Ok(false), Err)
    }
}

pub struct ListMatcher;

impl CategoryMatcher for ListMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let Value::List(items) = value else {
            return Ok(false);
        };
        match subs {
            Some(subs) => elementwise(m, items, subs, ctx),
            None => Ok(true),
        }
    }
}

pub struct SetMatcher;

impl CategoryMatcher for SetMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let Value::Set(items) = value else {
            return Ok(false);
        };
        match subs.and_then(|s| s.first()) {
            Some(elem) => elementwise(m, items, &[*elem], ctx),
            None => Ok(true),
        }
    }
}

pub struct TupleMatcher;

impl CategoryMatcher for TupleMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let Value::Tuple(items) = value else {
            return Ok(false);
        };
        let Some(subs) = subs else {
            return Ok(true);
        };

        if let Some((last, fixed)) = subs.split_last() {
            if **last == Type::Ellipsis {
                return elementwise(m, items, fixed, ctx);
            }
        }
        if items.len() != subs.len() {
            return Ok(false);
        }
        for (item, ty) in items.iter().zip(subs) {
            if !m.check(item, ty, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Parameterized only with exactly a key and a value descriptor
pub struct DictMatcher;

impl CategoryMatcher for DictMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let Value::Dict(entries) = value else {
            return Ok(false);
        };
        let (key_ty, val_ty) = match subs {
            Some([k, v]) => (*k, *v),
            _ => return Ok(true),
        };
        for (k, v) in entries {
            if !m.check(k, key_ty, ctx)? || !m.check(v, val_ty, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct LiteralMatcher;

impl CategoryMatcher for LiteralMatcher {
    fn matches(&self, _: &TypeMatcher, value: &Value, descriptor: &Type, _: Option<&[&Type]>, _: MatchContext) -> MatchResult {
        Ok(match descriptor {
            Type::Literal(allowed) => allowed.iter().any(|v| v.py_eq(value)),
            _ => false,
        })
    }
}

/// The value is a class object whose ancestry contains one of the arguments
pub struct TypeOfMatcher;

impl CategoryMatcher for TypeOfMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        if !matches!(value, Value::Type(_)) {
            return Ok(false);
        }
        let ancestry = ctx.in_ancestry();
        for ty in subs.unwrap_or_default() {
            if m.check(value, ty, ancestry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Bare: anything callable. Parameterized: annotations must be equal.
pub struct CallableMatcher;

impl CategoryMatcher for CallableMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, descriptor: &Type, _: Option<&[&Type]>, _: MatchContext) -> MatchResult {
        let sig = match descriptor {
            Type::Callable(Some(sig)) => sig,
            _ => return Ok(value.is_callable() || m.types().is_instance(value, "Callable")),
        };

        let (function, receiver_params) = match value {
            Value::Function(function) => (function, 0),
            Value::Method(method) => (method.function(), 1),
            _ => return Ok(false),
        };
        let signature = function.signature();
        if signature.returns() != Some(&*sig.ret) {
            return Ok(false);
        }
        Ok(signature
            .params()
            .iter()
            .skip(receiver_params)
            .zip(&sig.params)
            .all(|(param, expected)| param.annotation.as_ref() == Some(expected)))
    }
}

/// Typed mappings: string keys, declared fields only, presence per field
pub struct RecordMatcher;

impl CategoryMatcher for RecordMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, descriptor: &Type, _: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let (Type::Record(schema), Value::Dict(entries)) = (descriptor, value) else {
            return Ok(false);
        };

        for (key, _) in entries {
            match key.as_str() {
                Some(name) if schema.field(name).is_some() => {}
                _ => return Ok(false),
            }
        }

        for field in schema.fields() {
            match value.dict_get(&field.name) {
                Some(item) => {
                    if !m.check(item, schema.field_type(field), ctx)? {
                        return Ok(false);
                    }
                }
                None if schema.presence(field) == Presence::Required => return Ok(false),
                None => {}
            }
        }
        Ok(true)
    }
}

/// Base descriptor first, then the predicate
pub struct ValidatorMatcher;

impl CategoryMatcher for ValidatorMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, descriptor: &Type, _: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
        let Type::Validator(spec) = descriptor else {
            return Ok(false);
        };
        if !m.check(value, spec.base(), ctx)? {
            return Ok(false);
        }
        if spec.accepts(value) {
            Ok(true)
        } else {
            Err(PredicateFailure {
                validator: Arc::clone(spec),
                value: value.clone(),
            })
        }
    }
}

/// Values the host JSON encoder accepts, non-finite floats included
pub struct JsonMatcher;

impl CategoryMatcher for JsonMatcher {
    fn matches(&self, _: &TypeMatcher, value: &Value, _: &Type, _: Option<&[&Type]>, _: MatchContext) -> MatchResult {
        Ok(value.is_json_encodable())
    }
}

/// Structural check against a registered protocol class
pub struct ProtocolMatcher(pub &'static str);

impl CategoryMatcher for ProtocolMatcher {
    fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, _: Option<&[&Type]>, _: MatchContext) -> MatchResult {
        Ok(m.types().is_instance(value, self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classes::{ClassSchema, TypeContext};
    use crate::core::record::RecordSchema;
    use crate::core::validator::Predicate;

    fn matcher() -> TypeMatcher {
        TypeMatcher::new(Arc::new(TypeContext::new()))
    }

    fn ints(xs: &[i64]) -> Vec<Value> {
        xs.iter().map(|x| Value::Int(*x)).collect()
    }

    #[test]
    fn test_list_elements() {
        let m = matcher();
        let ty = Type::list(Type::int());
        assert_eq!(m.matches(&Value::List(ints(&[1, 2, 3])), &ty), Ok(true));
        assert_eq!(m.matches(&Value::list([Value::Int(1), Value::str("2")]), &ty), Ok(false));
        assert_eq!(m.matches(&Value::Tuple(ints(&[1])), &ty), Ok(false));
        assert_eq!(m.matches(&Value::List(vec![]), &ty), Ok(true));
    }

    #[test]
    fn test_tuple_arity_and_ellipsis() {
        let m = matcher();
        let pair = Type::tuple(vec![Type::int(), Type::str()]);
        assert_eq!(m.matches(&Value::tuple([Value::Int(1), Value::str("a")]), &pair), Ok(true));
        assert_eq!(m.matches(&Value::tuple([Value::Int(1)]), &pair), Ok(false));

        let many = Type::tuple_of(Type::int());
        assert_eq!(m.matches(&Value::Tuple(vec![]), &many), Ok(true));
        assert_eq!(m.matches(&Value::Tuple(ints(&[1, 2, 3, 4])), &many), Ok(true));
        assert_eq!(m.matches(&Value::tuple([Value::Int(1), Value::None]), &many), Ok(false));
    }

    #[test]
    fn test_dict_with_odd_arity_is_plain_dict_check() {
        let m = matcher();
        let odd = Type::Dict(vec![Type::int()]);
        let doc = Value::dict([(Value::str("a"), Value::Int(1))]);
        assert_eq!(m.matches(&doc, &odd), Ok(true));
        assert_eq!(m.matches(&doc, &Type::dict(Type::str(), Type::int())), Ok(true));
        assert_eq!(m.matches(&doc, &Type::dict(Type::int(), Type::int())), Ok(false));
        assert_eq!(m.matches(&Value::List(vec![]), &odd), Ok(false));
    }

    #[test]
    fn test_set_elements() {
        let m = matcher();
        let ty = Type::set(Type::str());
        assert_eq!(m.matches(&Value::set([Value::str("a"), Value::str("b")]), &ty), Ok(true));
        assert_eq!(m.matches(&Value::set([Value::str("a"), Value::Int(1)]), &ty), Ok(false));
    }

    #[test]
    fn test_union_and_optional() {
        let m = matcher();
        let ty = Type::union(vec![Type::int(), Type::list(Type::str())]);
        assert_eq!(m.matches(&Value::Int(1), &ty), Ok(true));
        assert_eq!(m.matches(&Value::list([Value::str("x")]), &ty), Ok(true));
        assert_eq!(m.matches(&Value::Float(1.0), &ty), Ok(false));

        let opt = Type::optional(Type::str());
        assert_eq!(m.matches(&Value::None, &opt), Ok(true));
        assert_eq!(m.matches(&Value::Int(0), &opt), Ok(false));
    }

    #[test]
    fn test_duck_typing_table() {
        let m = matcher();
        let duck = MatchContext::duck_typed();
        assert_eq!(m.check(&Value::Int(1), &Type::float(), MatchContext::strict()), Ok(false));
        assert_eq!(m.check(&Value::Int(1), &Type::float(), duck), Ok(true));
        assert_eq!(m.check(&Value::ByteArray(vec![]), &Type::bytes(), duck), Ok(true));
        assert_eq!(m.check(&Value::Float(1.5), &Type::int(), duck), Ok(false));
        assert_eq!(
            m.check(&Value::List(ints(&[1, 2])), &Type::list(Type::float()), duck),
            Ok(true)
        );
    }

    #[test]
    fn test_literal_and_named() {
        let m = matcher();
        let lit = Type::literal([Value::str("r"), Value::str("w")]);
        assert_eq!(m.matches(&Value::str("r"), &lit), Ok(true));
        assert_eq!(m.matches(&Value::str("x"), &lit), Ok(false));

        m.types().register_class(ClassSchema::new("Node"));
        m.types().register_class(ClassSchema::new("Leaf").with_bases(["Node"]));
        assert_eq!(m.matches(&Value::object("Node"), &Type::named("Node")), Ok(true));
        // forward references do not look at ancestry
        assert_eq!(m.matches(&Value::object("Leaf"), &Type::named("Node")), Ok(false));
        assert_eq!(m.matches(&Value::object("Leaf"), &Type::class("Node")), Ok(true));
    }

    #[test]
    fn test_type_of() {
        let m = matcher();
        m.types().register_class(ClassSchema::new("Base"));
        m.types().register_class(ClassSchema::new("Derived").with_bases(["Base"]));
        let ty = Type::type_of(Type::class("Base"));
        assert_eq!(m.matches(&Value::class_object("Derived"), &ty), Ok(true));
        assert_eq!(m.matches(&Value::class_object("int"), &ty), Ok(false));
        assert_eq!(m.matches(&Value::object("Derived"), &ty), Ok(false));
    }

    #[test]
    fn test_iterator_and_generator_are_structural() {
        let m = matcher();
        m.types().register_class(ClassSchema::new("Countdown").with_methods(&["__iter__", "__next__"]));
        assert_eq!(m.matches(&Value::object("Countdown"), &Type::Iterator), Ok(true));
        assert_eq!(m.matches(&Value::object("Countdown"), &Type::Generator), Ok(false));
        assert_eq!(m.matches(&Value::object("generator"), &Type::Generator), Ok(true));
        assert_eq!(m.matches(&Value::List(vec![]), &Type::Iterator), Ok(false));
    }

    #[test]
    fn test_json() {
        let m = matcher();
        let doc = Value::dict([(Value::str("k"), Value::list([Value::Int(1), Value::Float(2.5)]))]);
        assert_eq!(m.matches(&doc, &Type::Json), Ok(true));
        assert_eq!(m.matches(&Value::str("{}"), &Type::Json), Ok(true));
        assert_eq!(m.matches(&Value::set([Value::Int(1)]), &Type::Json), Ok(false));
    }

    #[test]
    fn test_json_accepts_non_finite_floats() {
        let m = matcher();
        assert_eq!(m.matches(&Value::Float(f64::NAN), &Type::Json), Ok(true));
        assert_eq!(m.matches(&Value::Float(f64::INFINITY), &Type::Json), Ok(true));
        assert_eq!(m.matches(&Value::list([Value::Float(f64::INFINITY)]), &Type::Json), Ok(true));
        let keyed = Value::dict([(Value::Float(f64::NAN), Value::Float(f64::NEG_INFINITY))]);
        assert_eq!(m.matches(&keyed, &Type::Json), Ok(true));
    }

    #[test]
    fn test_record_presence_and_unknown_keys() {
        let m = matcher();
        let movie = RecordSchema::builder("Movie")
            .field("title", Type::str())
            .field("year", Type::not_required(Type::int()))
            .build()
            .unwrap();
        let ty = Type::record(movie);

        let full = Value::dict([(Value::str("title"), Value::str("Up")), (Value::str("year"), Value::Int(2009))]);
        let partial = Value::dict([(Value::str("title"), Value::str("Up"))]);
        let missing = Value::dict([(Value::str("year"), Value::Int(2009))]);
        let extra = Value::dict([(Value::str("title"), Value::str("Up")), (Value::str("rating"), Value::Int(5))]);
        let wrong = Value::dict([(Value::str("title"), Value::Int(1))]);

        assert_eq!(m.matches(&full, &ty), Ok(true));
        assert_eq!(m.matches(&partial, &ty), Ok(true));
        assert_eq!(m.matches(&missing, &ty), Ok(false));
        assert_eq!(m.matches(&extra, &ty), Ok(false));
        assert_eq!(m.matches(&wrong, &ty), Ok(false));
    }

    #[test]
    fn test_validator_checks_base_before_predicate() {
        let m = matcher();
        let short = Predicate::new("short", |v| v.len().map_or(false, |n| n < 3));
        let ty = Type::validator(Type::list(Type::int()), short);

        assert_eq!(m.matches(&Value::List(ints(&[1, 2])), &ty), Ok(true));
        // base mismatch is a plain non-conformance
        assert_eq!(m.matches(&Value::set([Value::Int(1)]), &ty), Ok(false));
        let err = m.matches(&Value::List(ints(&[1, 2, 3])), &ty).unwrap_err();
        assert_eq!(err.validator.predicate().name(), "short");
    }

    #[test]
    fn test_union_prefers_conforming_branch_over_predicate_failure() {
        let m = matcher();
        let positive = Predicate::new("positive", |v| v.as_int().map_or(false, |i| i > 0));
        let ty = Type::union(vec![Type::validator(Type::int(), positive), Type::int()]);
        assert_eq!(m.matches(&Value::Int(-1), &ty), Ok(true));
    }

    #[test]
    fn test_custom_generic_matcher() {
        struct NonEmpty;
        impl CategoryMatcher for NonEmpty {
            fn matches(&self, m: &TypeMatcher, value: &Value, _: &Type, subs: Option<&[&Type]>, ctx: MatchContext) -> MatchResult {
                let Some(items) = value.elements() else { return Ok(false) };
                if items.is_empty() {
                    return Ok(false);
                }
                match subs {
                    Some(subs) => elementwise(m, items, &subs[..1], ctx),
                    None => Ok(true),
                }
            }
        }

        let m = matcher();
        m.register_generic("NonEmpty", Arc::new(NonEmpty));
        let ty = Type::generic("NonEmpty", vec![Type::int()]);
        assert_eq!(m.matches(&Value::List(ints(&[1])), &ty), Ok(true));
        assert_eq!(m.matches(&Value::List(vec![]), &ty), Ok(false));
        assert_eq!(m.matches(&Value::list([Value::str("a")]), &ty), Ok(false));
    }
}
