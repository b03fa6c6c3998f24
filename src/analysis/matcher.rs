//! Recursive conformance of runtime values to type descriptors
//!
//! `TypeMatcher` answers "does this value conform to this descriptor?" by
//! unwrapping aliases, classifying the descriptor, and dispatching to the
//! matcher registered for its category. Category matchers recurse back into
//! `TypeMatcher::check` for nested descriptors, threading a `MatchContext`.

use crate::analysis::categories;
use crate::core::classes::TypeContext;
use crate::core::inspect::{category_of, sub_descriptors_of, unwrap_alias, Category};
use crate::core::types::Type;
use crate::core::value::Value;
use crate::errors::PredicateFailure;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::trace;

/// `Ok(conforms)`, or the first predicate that rejected an otherwise conforming value
pub type MatchResult = Result<bool, PredicateFailure>;

/// Flags threaded through a recursive match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchContext {
    /// Accept values whose class can stand in for the required one
    pub duck_typing: bool,
    ancestry: bool,
}

impl MatchContext {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn duck_typed() -> Self {
        Self {
            duck_typing: true,
            ancestry: false,
        }
    }

    /// Compare class objects by ancestry instead of by instance membership
    pub(crate) fn in_ancestry(self) -> Self {
        Self { ancestry: true, ..self }
    }

    pub fn is_ancestry(&self) -> bool {
        self.ancestry
    }
}

/// Conformance policy for one descriptor category
pub trait CategoryMatcher: Send + Sync {
    /// `subs` are the descriptor's parameters, `None` when it is bare
    fn matches(
        &self,
        matcher: &TypeMatcher,
        value: &Value,
        descriptor: &Type,
        subs: Option<&[&Type]>,
        ctx: MatchContext,
    ) -> MatchResult;
}

pub struct TypeMatcher {
    types: Arc<TypeContext>,
    matchers: DashMap<Category, Arc<dyn CategoryMatcher>>,
}

static GLOBAL: Lazy<Arc<TypeMatcher>> = Lazy::new(|| Arc::new(TypeMatcher::new(TypeContext::global())));

impl TypeMatcher {
    pub fn new(types: Arc<TypeContext>) -> Self {
        let matcher = Self {
            types,
            matchers: DashMap::new(),
        };
        categories::register_builtin(&matcher);
        matcher
    }

    /// Matcher over the process-wide `TypeContext`
    pub fn global() -> Arc<TypeMatcher> {
        Arc::clone(&GLOBAL)
    }

    pub fn types(&self) -> &Arc<TypeContext> {
        &self.types
    }

    /// Install or replace the policy for a category
    pub fn register(&self, category: Category, matcher: Arc<dyn CategoryMatcher>) {
        self.matchers.insert(category, matcher);
    }

    /// Policy for `Generic(name, ..)` descriptors
    pub fn register_generic(&self, name: impl Into<String>, matcher: Arc<dyn CategoryMatcher>) {
        self.register(Category::Generic(name.into()), matcher);
    }

    pub fn matches(&self, value: &Value, ty: &Type) -> MatchResult {
        self.check(value, ty, MatchContext::strict())
    }

    pub fn matches_with(&self, value: &Value, ty: &Type, ctx: MatchContext) -> MatchResult {
        self.check(value, ty, ctx)
    }

    /// Entry point for recursion from category matchers
    pub fn check(&self, value: &Value, ty: &Type, ctx: MatchContext) -> MatchResult {
        let ty = unwrap_alias(ty);
        let (origin, category) = category_of(ty);

        if category == Category::Any {
            return Ok(true);
        }
        if ctx.ancestry {
            return Ok(self.in_ancestry(value, ty));
        }
        if category == Category::Modifier {
            return self.check_degraded(value, ty, ctx);
        }

        let subs = sub_descriptors_of(ty);
        let policy = self.matchers.get(&category).map(|m| Arc::clone(m.value()));
        match policy {
            Some(policy) => policy.matches(self, value, ty, subs.as_deref(), ctx),
            None => {
                trace!(descriptor = %ty, "no matcher registered, falling back to class membership");
                Ok(origin.map_or(false, |name| self.types.is_instance(value, name)))
            }
        }
    }

    /// Presence modifiers only mean something on record fields; elsewhere the
    /// wrapped descriptor is matched instead.
    fn check_degraded(&self, value: &Value, ty: &Type, ctx: MatchContext) -> MatchResult {
        let inner = match ty {
            Type::Required(inner) | Type::NotRequired(inner) => inner,
            _ => return Ok(false),
        };
        trace!(descriptor = %ty, "presence modifier outside a record");
        if inner.is_modifier() {
            return Ok(false);
        }
        self.check(value, inner, ctx)
    }

    /// Ancestry test for class objects: is `ty` one of the value's bases?
    fn in_ancestry(&self, value: &Value, ty: &Type) -> bool {
        let Value::Type(class) = value else {
            return false;
        };
        let ty = unwrap_alias(ty);

        match ty {
            Type::Any => true,
            Type::Union(branches) => branches.iter().any(|b| self.in_ancestry(value, b)),
            Type::Optional(inner) => class == "NoneType" || self.in_ancestry(value, inner),
            Type::Class(name) => self.types.is_subclass(class, name),
            Type::None => class == "NoneType",
            _ => {
                let (origin, _) = category_of(ty);
                sub_descriptors_of(ty).is_none()
                    && origin.map_or(false, |o| self.types.mro(class).iter().any(|c| c == o))
            }
        }
    }
}

impl Default for TypeMatcher {
    fn default() -> Self {
        Self::new(TypeContext::global())
    }
}

/// Check `value` against `ty` with the global matcher
pub fn check_type(value: &Value, ty: &Type) -> MatchResult {
    GLOBAL.matches(value, ty)
}
