//! Registration order resolution.
//!
//! Methods named in the order list come first, in list order; every other
//! method follows in declaration order. The sort is stable so adjacent
//! middleware keeps firing in the order it was declared.

use crate::routing::descriptor::RouteDescriptor;
use crate::routing::metadata::MethodTable;

/// Indices into `names` in registration order.
pub fn resolve_order<S, O>(names: &[S], order: &[O]) -> Vec<usize>
where
    S: AsRef<str>,
    O: AsRef<str>,
{
    let rank = |name: &str| order.iter().position(|o| o.as_ref() == name);

    let mut indices: Vec<usize> = (0..names.len()).collect();
    // Unranked entries sort after ranked ones; `sort_by_key` is stable.
    indices.sort_by_key(|&i| match rank(names[i].as_ref()) {
        Some(r) => (false, r),
        None => (true, 0),
    });
    indices
}

/// The decorated methods of `table` in registration order. Plain methods
/// carry no descriptor and are dropped.
pub fn resolve<'t, T, O>(table: &'t MethodTable<T>, order: &[O]) -> Vec<(&'t str, &'t RouteDescriptor<T>)>
where
    O: AsRef<str>,
{
    let entries: Vec<(&str, Option<&RouteDescriptor<T>>)> = table.entries().collect();
    let names: Vec<&str> = entries.iter().map(|(name, _)| *name).collect();

    resolve_order(&names, order)
        .into_iter()
        .filter_map(|i| {
            let (name, descriptor) = entries[i];
            descriptor.map(|d| (name, d))
        })
        .collect()
}
