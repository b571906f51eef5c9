use std::ops::Range;

use crate::query::PaginationQuery;

impl PaginationQuery {
    /// Index range of the requested page within `total` items; empty when out of range.
    pub fn range(&self, total: usize) -> Range<usize> {
        if !self.is_enabled() {
            return 0..total;
        }
        let start = match self.page.checked_mul(self.items_per_page) {
            Some(s) if s < total => s,
            _ => return total..total,
        };
        let end = start.saturating_add(self.items_per_page).min(total);
        start..end
    }
}

/// Keep only the requested page.
pub fn paginate<T>(mut items: Vec<T>, pagination: &PaginationQuery) -> Vec<T> {
    let r = pagination.range(items.len());
    items.truncate(r.end);
    items.drain(..r.start);
    items
}
