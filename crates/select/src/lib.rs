//! Dash data-select: the generic filter → sort → paginate (→ metrics) pipeline
//! over any record kind that implements [`DataCell`].

#![forbid(unsafe_code)]

use dash_core::DataCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod filter;
mod join;
pub mod metrics;
mod paginate;
pub mod query;
mod sort;

pub use filter::{filter, matches_all};
pub use join::join_by_identity;
pub use metrics::{AggregatedMetric, Aggregation, MetricCell, MetricName, MetricPoint, MetricTarget, MetricsError, MetricsSource};
pub use paginate::paginate;
pub use query::{DataSelectQuery, FilterBy, MetricQuery, PaginationQuery, QueryError, RawQuery, SortBy, SortDirection, NO_PAGINATION};
pub use sort::sort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub total_items: usize,
}

/// Result envelope: one page plus the filtered total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSelection<T> {
    pub list_meta: ListMeta,
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Vec<AggregatedMetric>>>,
}

impl<T> DataSelection<T> {
    pub fn total(&self) -> usize { self.list_meta.total_items }

    /// Unwrap cells back into views; metrics stay aligned with items.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> DataSelection<U> {
        DataSelection { list_meta: self.list_meta, items: self.items.into_iter().map(f).collect(), metrics: self.metrics }
    }
}

/// Filter, sort and paginate `items` per `query`. Metric requests are ignored here.
pub fn generic_data_select<T: DataCell>(items: Vec<T>, query: &DataSelectQuery) -> DataSelection<T> {
    let started = std::time::Instant::now();
    let input = items.len();
    let filtered = filter(items, &query.filter);
    let total = filtered.len();
    let sorted = sort(filtered, &query.sort);
    let page = paginate(sorted, &query.pagination);
    debug!(input, filtered = total, page = page.len(), "dataselect: evaluated");
    ::metrics::histogram!("dataselect_items", input as f64);
    ::metrics::histogram!("dataselect_eval_ms", started.elapsed().as_secs_f64() * 1_000.0);
    DataSelection { list_meta: ListMeta { total_items: total }, items: page, metrics: None }
}

/// As [`generic_data_select`], then aggregate the requested metrics for the returned page.
pub fn generic_data_select_with_metrics<T: MetricCell>(
    items: Vec<T>,
    query: &DataSelectQuery,
    source: &dyn MetricsSource,
) -> DataSelection<T> {
    let mut sel = generic_data_select(items, query);
    if let Some(mq) = &query.metrics {
        sel.metrics = Some(metrics::aggregate(&sel.items, mq, source));
    }
    sel
}
