//! Query specification: what to filter on, how to order, which page, which metrics.

use std::fmt;
use std::str::FromStr;

use dash_core::{ComparableValue, PropertyName, UnknownProperty, ValueError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::metrics::{Aggregation, MetricName};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("page must not be negative (got {0})")]
    NegativePage(i64),
    #[error("itemsPerPage must not be negative (got {0})")]
    NegativePageSize(i64),
    #[error(transparent)]
    UnknownProperty(#[from] UnknownProperty),
    #[error("malformed {field} entry {entry:?}: expected {expected:?}")]
    Malformed { field: &'static str, entry: String, expected: &'static str },
    #[error("invalid filter value for {property}: {source}")]
    InvalidValue {
        property: PropertyName,
        #[source]
        source: ValueError,
    },
    #[error("unknown sort direction {0:?} (expected a|asc|d|desc)")]
    UnknownDirection(String),
    #[error("unknown metric {0:?} (expected cpu|memory)")]
    UnknownMetric(String),
    #[error("unknown aggregation {0:?} (expected latest|average|min|max|sum)")]
    UnknownAggregation(String),
    #[error("aggregation given without any metric")]
    AggregationWithoutMetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "asc" | "ascending" => Ok(SortDirection::Ascending),
            "d" | "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(QueryError::UnknownDirection(other.to_string())),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { SortDirection::Ascending => "a", SortDirection::Descending => "d" })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterBy {
    pub property: PropertyName,
    pub value: ComparableValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortBy {
    pub property: PropertyName,
    pub direction: SortDirection,
}

/// Zero `items_per_page` disables paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationQuery {
    pub items_per_page: usize,
    pub page: usize,
}

pub const NO_PAGINATION: PaginationQuery = PaginationQuery { items_per_page: 0, page: 0 };

impl PaginationQuery {
    pub fn new(items_per_page: usize, page: usize) -> Self { Self { items_per_page, page } }

    pub fn is_enabled(&self) -> bool { self.items_per_page > 0 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub metrics: SmallVec<[MetricName; 2]>,
    pub aggregation: Aggregation,
}

impl MetricQuery {
    pub fn new(metrics: impl IntoIterator<Item = MetricName>, aggregation: Aggregation) -> Self {
        Self { metrics: metrics.into_iter().collect(), aggregation }
    }
}

/// Validated query; immutable for one pipeline run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSelectQuery {
    pub filter: SmallVec<[FilterBy; 4]>,
    pub sort: SmallVec<[SortBy; 4]>,
    pub pagination: PaginationQuery,
    pub metrics: Option<MetricQuery>,
}

impl DataSelectQuery {
    /// No filtering, no ordering, no paging.
    pub fn new() -> Self { Self::default() }

    pub fn with_filter(mut self, property: PropertyName, value: impl Into<ComparableValue>) -> Self {
        self.filter.push(FilterBy { property, value: value.into() });
        self
    }

    pub fn with_sort(mut self, property: PropertyName, direction: SortDirection) -> Self {
        self.sort.push(SortBy { property, direction });
        self
    }

    pub fn with_pagination(mut self, items_per_page: usize, page: usize) -> Self {
        self.pagination = PaginationQuery::new(items_per_page, page);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricQuery) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Wire form of a query (query-string, JSON body or CLI flags).
///
/// `filterBy` entries are `property,value`; `sortBy` entries are
/// `direction,property` with direction `a` or `d`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawQuery {
    pub filter_by: Vec<String>,
    pub sort_by: Vec<String>,
    pub page: Option<i64>,
    pub items_per_page: Option<i64>,
    pub metrics: Vec<String>,
    pub aggregation: Option<String>,
}

fn non_negative(v: Option<i64>, err: fn(i64) -> QueryError) -> Result<usize, QueryError> {
    match v {
        None => Ok(0),
        Some(n) if n < 0 => Err(err(n)),
        Some(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
    }
}

fn parse_filter(entry: &str) -> Result<FilterBy, QueryError> {
    let (prop, raw) = entry.split_once(',').ok_or_else(|| QueryError::Malformed {
        field: "filterBy",
        entry: entry.to_string(),
        expected: "property,value",
    })?;
    let property: PropertyName = prop.parse()?;
    let value = ComparableValue::parse(property.value_kind(), raw)
        .map_err(|source| QueryError::InvalidValue { property, source })?;
    Ok(FilterBy { property, value })
}

fn parse_sort(entry: &str) -> Result<SortBy, QueryError> {
    let (dir, prop) = entry.split_once(',').ok_or_else(|| QueryError::Malformed {
        field: "sortBy",
        entry: entry.to_string(),
        expected: "a|d,property",
    })?;
    Ok(SortBy { property: prop.parse()?, direction: dir.parse()? })
}

impl TryFrom<RawQuery> for DataSelectQuery {
    type Error = QueryError;

    fn try_from(raw: RawQuery) -> Result<Self, Self::Error> {
        let filter: SmallVec<[FilterBy; 4]> = raw.filter_by.iter().map(|e| parse_filter(e)).collect::<Result<_, QueryError>>()?;
        let sort: SmallVec<[SortBy; 4]> = raw.sort_by.iter().map(|e| parse_sort(e)).collect::<Result<_, QueryError>>()?;
        let pagination = PaginationQuery {
            items_per_page: non_negative(raw.items_per_page, QueryError::NegativePageSize)?,
            page: non_negative(raw.page, QueryError::NegativePage)?,
        };
        let metric_names: SmallVec<[MetricName; 2]> = raw.metrics.iter().map(|m| m.parse::<MetricName>()).collect::<Result<_, QueryError>>()?;
        let aggregation = raw.aggregation.as_deref().map(str::parse::<Aggregation>).transpose()?;
        let metrics = match (metric_names.is_empty(), aggregation) {
            (true, None) => None,
            (true, Some(_)) => return Err(QueryError::AggregationWithoutMetric),
            (false, agg) => Some(MetricQuery { metrics: metric_names, aggregation: agg.unwrap_or_default() }),
        };
        Ok(DataSelectQuery { filter, sort, pagination, metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::Quantity;

    fn raw() -> RawQuery { RawQuery::default() }

    #[test]
    fn empty_raw_query_is_a_no_op() {
        let q = DataSelectQuery::try_from(raw()).unwrap();
        assert_eq!(q, DataSelectQuery::new());
        assert!(!q.pagination.is_enabled());
    }

    #[test]
    fn parses_filters_with_typed_values() {
        let q = DataSelectQuery::try_from(RawQuery {
            filter_by: vec!["reason,Failed".into(), "restarts,1000m".into(), "message,a,b".into()],
            ..raw()
        })
        .unwrap();
        assert_eq!(q.filter[0], FilterBy { property: PropertyName::Reason, value: "Failed".into() });
        assert_eq!(q.filter[1].value, ComparableValue::Quantity(Quantity::from(1i64)));
        assert_eq!(q.filter[2].value, "a,b".into());
    }

    #[test]
    fn parses_sort_and_paging() {
        let q = DataSelectQuery::try_from(RawQuery {
            sort_by: vec!["d,creationTimestamp".into(), "a,name".into()],
            page: Some(2),
            items_per_page: Some(10),
            ..raw()
        })
        .unwrap();
        assert_eq!(q.sort[0], SortBy { property: PropertyName::CreationTimestamp, direction: SortDirection::Descending });
        assert_eq!(q.sort[1].direction, SortDirection::Ascending);
        assert_eq!(q.pagination, PaginationQuery::new(10, 2));
    }

    #[test]
    fn rejects_malformed_specs() {
        let err = |r: RawQuery| DataSelectQuery::try_from(r).unwrap_err();
        assert!(matches!(err(RawQuery { items_per_page: Some(-1), ..raw() }), QueryError::NegativePageSize(-1)));
        assert!(matches!(err(RawQuery { page: Some(-3), ..raw() }), QueryError::NegativePage(-3)));
        assert!(matches!(err(RawQuery { filter_by: vec!["name".into()], ..raw() }), QueryError::Malformed { .. }));
        assert!(matches!(err(RawQuery { filter_by: vec!["colour,red".into()], ..raw() }), QueryError::UnknownProperty(_)));
        assert!(matches!(
            err(RawQuery { filter_by: vec!["lastSeen,yesterday".into()], ..raw() }),
            QueryError::InvalidValue { property: PropertyName::LastSeen, .. }
        ));
        assert!(matches!(err(RawQuery { sort_by: vec!["up,name".into()], ..raw() }), QueryError::UnknownDirection(_)));
        assert!(matches!(err(RawQuery { metrics: vec!["disk".into()], ..raw() }), QueryError::UnknownMetric(_)));
        assert!(matches!(err(RawQuery { aggregation: Some("avg".into()), ..raw() }), QueryError::AggregationWithoutMetric));
    }

    #[test]
    fn metrics_default_to_latest() {
        let q = DataSelectQuery::try_from(RawQuery { metrics: vec!["cpu".into(), "memory".into()], ..raw() }).unwrap();
        let m = q.metrics.unwrap();
        assert_eq!(m.aggregation, Aggregation::Latest);
        assert_eq!(m.metrics.as_slice(), &[MetricName::Cpu, MetricName::Memory]);
    }

    #[test]
    fn raw_query_deserializes_from_camel_case_json() {
        let r: RawQuery = serde_json::from_str(r#"{"filterBy":["type,Warning"],"itemsPerPage":5}"#).unwrap();
        assert_eq!(r.filter_by, vec!["type,Warning".to_string()]);
        assert_eq!(r.items_per_page, Some(5));
        assert_eq!(r.page, None);
    }
}
