//! Duck-typed class membership

use crate::core::classes::TypeContext;
use std::collections::HashSet;

/// Runtime class -> classes it may stand in for
pub const DUCK_COMPATIBLE: &[(&str, &[&str])] = &[
    ("int", &["int", "float", "complex"]),
    ("float", &["float", "complex"]),
    ("bytearray", &["bytearray", "bytes"]),
];

/// Lookup in the fixed compatibility table, keyed by the exact runtime class
pub fn table_accepts(value_class: &str, required: &str) -> bool {
    DUCK_COMPATIBLE
        .iter()
        .find(|(class, _)| *class == value_class)
        .map_or(false, |(_, accepted)| accepted.iter().any(|a| *a == required))
}

/// The value's ancestry covers every class in the required class's ancestry
pub fn ancestry_covers(ctx: &TypeContext, value_class: &str, required: &str) -> bool {
    let have: HashSet<String> = ctx.mro(value_class).into_iter().collect();
    ctx.mro(required).iter().all(|c| have.contains(c))
}

pub fn accepts(ctx: &TypeContext, value_class: &str, required: &str) -> bool {
    table_accepts(value_class, required) || ancestry_covers(ctx, value_class, required)
}
