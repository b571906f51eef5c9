use dash_core::DataCell;

use crate::query::FilterBy;

/// True when every predicate's property is present and contains its match value.
pub fn matches_all<T: DataCell>(item: &T, predicates: &[FilterBy]) -> bool {
    predicates.iter().all(|f| match item.property(f.property) {
        Some(v) => v.contains(&f.value),
        None => false,
    })
}

/// Order-preserving filter. No predicates keeps everything.
pub fn filter<T: DataCell>(mut items: Vec<T>, predicates: &[FilterBy]) -> Vec<T> {
    if predicates.is_empty() {
        return items;
    }
    items.retain(|it| matches_all(it, predicates));
    items
}
