//! Descriptor introspection: category, origin, and sub-descriptors

use crate::core::types::Type;
use smallvec::SmallVec;

/// Dispatch key for the matcher table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Any,
    Class,
    Named,
    Union,
    List,
    Set,
    Tuple,
    Dict,
    Literal,
    TypeOf,
    Callable,
    Record,
    Modifier,
    Validator,
    Json,
    Iterator,
    Generator,
    Ellipsis,
    Generic(String),
}

pub type SubDescriptors<'a> = SmallVec<[&'a Type; 4]>;

static NONE: Type = Type::None;

/// Follow `NewType` wrappers down to the descriptor they name
pub fn unwrap_alias(ty: &Type) -> &Type {
    let mut current = ty;
    while let Type::NewType(_, inner) = current {
        current = inner;
    }
    current
}

/// Category and origin name of a descriptor
pub fn category_of(ty: &Type) -> (Option<&str>, Category) {
    match unwrap_alias(ty) {
        Type::Any => (None, Category::Any),
        Type::None => (Some("NoneType"), Category::Class),
        Type::Class(name) => (Some(name), Category::Class),
        Type::Named(name) => (Some(name), Category::Named),
        Type::Union(_) | Type::Optional(_) => (Some("Union"), Category::Union),
        Type::List(_) => (Some("list"), Category::List),
        Type::Set(_) => (Some("set"), Category::Set),
        Type::Tuple(_) => (Some("tuple"), Category::Tuple),
        Type::Dict(_) => (Some("dict"), Category::Dict),
        Type::Ellipsis => (None, Category::Ellipsis),
        Type::Literal(_) => (Some("Literal"), Category::Literal),
        Type::TypeOf(_) => (Some("type"), Category::TypeOf),
        Type::Callable(_) => (Some("Callable"), Category::Callable),
        Type::Record(schema) => (Some(schema.name()), Category::Record),
        Type::Required(_) => (Some("Required"), Category::Modifier),
        Type::NotRequired(_) => (Some("NotRequired"), Category::Modifier),
        Type::Validator(_) => (Some("Validator"), Category::Validator),
        Type::Json => (Some("json"), Category::Json),
        Type::Iterator => (Some("Iterator"), Category::Iterator),
        Type::Generator => (Some("Generator"), Category::Generator),
        Type::Generic(name, _) => (Some(name), Category::Generic(name.clone())),
        Type::NewType(_, inner) => category_of(inner),
    }
}

/// Parameters of a composite descriptor; `None` for bare or atomic ones
pub fn sub_descriptors_of(ty: &Type) -> Option<SubDescriptors<'_>> {
    let subs: SubDescriptors<'_> = match unwrap_alias(ty) {
        Type::Union(ts) | Type::List(ts) | Type::Set(ts) | Type::Tuple(ts) | Type::Dict(ts) | Type::Generic(_, ts) => {
            ts.iter().collect()
        }
        Type::Optional(inner) => [&**inner, &NONE].into_iter().collect(),
        Type::TypeOf(inner) | Type::Required(inner) | Type::NotRequired(inner) => {
            std::iter::once(&**inner).collect()
        }
        Type::Callable(Some(sig)) => sig.params.iter().chain(std::iter::once(&*sig.ret)).collect(),
        Type::Record(schema) => schema.fields().iter().map(|f| &f.ty).collect(),
        Type::Validator(spec) => std::iter::once(spec.base()).collect(),
        _ => return None,
    };
    if subs.is_empty() {
        None
    } else {
        Some(subs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_is_union_with_none() {
        let ty = Type::optional(Type::int());
        assert_eq!(category_of(&ty), (Some("Union"), Category::Union));
        let subs = sub_descriptors_of(&ty).unwrap();
        assert_eq!(subs.as_slice(), &[&Type::int(), &Type::None]);
    }

    #[test]
    fn test_bare_containers_have_no_subs() {
        assert!(sub_descriptors_of(&Type::List(vec![])).is_none());
        assert!(sub_descriptors_of(&Type::int()).is_none());
        assert_eq!(sub_descriptors_of(&Type::dict(Type::str(), Type::int())).unwrap().len(), 2);
    }

    #[test]
    fn test_new_type_reports_underlying_category() {
        let user_id = Type::new_type("UserId", Type::new_type("Id", Type::int()));
        assert_eq!(category_of(&user_id), (Some("int"), Category::Class));
        assert_eq!(unwrap_alias(&user_id), &Type::int());
    }
}
