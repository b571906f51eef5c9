use std::cmp::Ordering;

use dash_core::{ComparableValue, DataCell};
use smallvec::SmallVec;

use crate::query::{SortBy, SortDirection};

type Keys = SmallVec<[Option<ComparableValue>; 4]>;

/// Absent keys go last regardless of direction.
fn compare_keys(a: &Keys, b: &Keys, sort: &[SortBy]) -> Ordering {
    for (i, s) in sort.iter().enumerate() {
        let ord = match (&a[i], &b[i]) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                // keys are pre-filtered to the declared tag, so this is total
                let o = x.compare(y).unwrap_or(Ordering::Equal);
                match s.direction {
                    SortDirection::Ascending => o,
                    SortDirection::Descending => o.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn keys_of<T: DataCell>(item: &T, sort: &[SortBy]) -> Keys {
    sort.iter()
        .map(|s| item.property(s.property).filter(|v| v.kind() == s.property.value_kind()))
        .collect()
}

/// Stable multi-key sort. No keys keeps input order.
pub fn sort<T: DataCell>(items: Vec<T>, sort: &[SortBy]) -> Vec<T> {
    if sort.is_empty() || items.len() < 2 {
        return items;
    }
    let mut decorated: Vec<(Keys, T)> = items.into_iter().map(|it| (keys_of(&it, sort), it)).collect();
    decorated.sort_by(|(a, _), (b, _)| compare_keys(a, b, sort));
    decorated.into_iter().map(|(_, it)| it).collect()
}
