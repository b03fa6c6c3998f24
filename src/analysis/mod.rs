//! Value-against-descriptor matching
//!
//! `TypeMatcher` dispatches on the descriptor category to a `CategoryMatcher`
//! and recurses into sub-descriptors. Duck-typing rules live in `duck`.

pub mod categories;
pub mod duck;
pub mod matcher;

pub use matcher::{check_type, CategoryMatcher, MatchContext, MatchResult, TypeMatcher};
