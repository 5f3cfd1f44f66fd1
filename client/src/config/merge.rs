//! Right-biased, field-wise config merging
//!
//! Every fragment field is an `Option`. Merging `base` with `other` resolves
//! each field with one of three combinators:
//!
//! ```text
//! scalar   other ?? base
//! nested   merge(base, other) when both set, else whichever is set
//! map      key-wise union, other wins on collision
//! ```
//!
//! Fragments implement [`Merge`] by applying these per field, so integration
//! specific configs reuse the rules instead of restating them.

use std::collections::HashMap;
use std::hash::Hash;

/// A config fragment that can be layered under a higher-priority one
pub trait Merge: Sized {
    /// Combine `self` (lower priority) with `other` (higher priority)
    ///
    /// Neither operand is modified.
    fn merge_with_non_null(&self, other: &Self) -> Self;
}

/// `other` if set, otherwise `base`
pub fn merge_value<T: Clone>(base: &Option<T>, other: &Option<T>) -> Option<T> {
    other.as_ref().or(base.as_ref()).cloned()
}

/// Recursive merge when both sides are set
pub fn merge_nested<T: Merge + Clone>(base: &Option<T>, other: &Option<T>) -> Option<T> {
    match (base, other) {
        (Some(b), Some(o)) => Some(b.merge_with_non_null(o)),
        (b, o) => merge_value(b, o),
    }
}

/// Key-wise union with `other` overriding on collision
pub fn merge_map<K, V>(
    base: &Option<HashMap<K, V>>,
    other: &Option<HashMap<K, V>>,
) -> Option<HashMap<K, V>>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    merge_nested(base, other)
}

impl<K, V> Merge for HashMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn merge_with_non_null(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}
