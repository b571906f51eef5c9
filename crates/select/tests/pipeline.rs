#![forbid(unsafe_code)]

use chrono::{TimeZone, Utc};
use dash_core::{ComparableValue, DataCell, PropertyName, Quantity};
use dash_select::{
    generic_data_select, generic_data_select_with_metrics, join_by_identity, Aggregation, DataSelectQuery, MetricCell,
    MetricName, MetricPoint, MetricQuery, MetricTarget, MetricsError, MetricsSource, SortDirection,
};

#[derive(Debug, Clone, PartialEq)]
struct Rec {
    id: usize,
    name: String,
    restarts: Option<i64>,
    created: i64,
}

impl DataCell for Rec {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Name => Some(self.name.as_str().into()),
            PropertyName::Restarts => self.restarts.map(|r| Quantity::from(r).into()),
            PropertyName::CreationTimestamp => Some(Utc.timestamp_opt(self.created, 0).unwrap().into()),
            _ => None,
        }
    }
}

impl MetricCell for Rec {
    fn metric_target(&self) -> Option<MetricTarget> { Some(MetricTarget::new(Some("default"), &self.name)) }
}

fn rec(id: usize, name: &str, restarts: Option<i64>) -> Rec {
    Rec { id, name: name.to_string(), restarts, created: 1_700_000_000 + id as i64 }
}

fn seven() -> Vec<Rec> {
    (0..7).map(|i| rec(i, &format!("pod-{i}"), Some((i % 3) as i64))).collect()
}

fn ids(v: &[Rec]) -> Vec<usize> { v.iter().map(|r| r.id).collect() }

// Small deterministic generator so large-input tests need no extra crates.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn empty_query_is_identity() {
    let sel = generic_data_select(seven(), &DataSelectQuery::new());
    assert_eq!(sel.total(), 7);
    assert_eq!(ids(&sel.items), (0..7).collect::<Vec<_>>());
}

#[test]
fn last_partial_page_and_out_of_range_page() {
    let q = DataSelectQuery::new().with_pagination(3, 2);
    let sel = generic_data_select(seven(), &q);
    assert_eq!(sel.total(), 7);
    assert_eq!(ids(&sel.items), vec![6]);

    let q = DataSelectQuery::new().with_pagination(3, 5);
    let sel = generic_data_select(seven(), &q);
    assert_eq!(sel.total(), 7);
    assert!(sel.items.is_empty());
}

#[test]
fn total_is_identical_across_pages() {
    let base = DataSelectQuery::new().with_filter(PropertyName::Restarts, Quantity::from(1i64));
    let mut seen = Vec::new();
    for page in 0..4 {
        let sel = generic_data_select(seven(), &base.clone().with_pagination(1, page));
        assert_eq!(sel.total(), 2);
        seen.extend(ids(&sel.items));
    }
    assert_eq!(seen, vec![1, 4]);
}

#[test]
fn filtering_is_idempotent() {
    let q = DataSelectQuery::new().with_filter(PropertyName::Name, "pod-");
    let once = generic_data_select(seven(), &q).items;
    let twice = generic_data_select(once.clone(), &q).items;
    assert_eq!(once, twice);
}

#[test]
fn sort_is_stable_on_equal_keys() {
    let q = DataSelectQuery::new().with_sort(PropertyName::Restarts, SortDirection::Ascending);
    let sel = generic_data_select(seven(), &q);
    // restarts: 0,1,2,0,1,2,0 -> equal keys keep input order
    assert_eq!(ids(&sel.items), vec![0, 3, 6, 1, 4, 2, 5]);
}

#[test]
fn descending_reverses_tie_free_ascending_input() {
    let asc = generic_data_select(seven(), &DataSelectQuery::new().with_sort(PropertyName::CreationTimestamp, SortDirection::Ascending));
    let desc = generic_data_select(asc.items.clone(), &DataSelectQuery::new().with_sort(PropertyName::CreationTimestamp, SortDirection::Descending));
    let mut rev = ids(&asc.items);
    rev.reverse();
    assert_eq!(ids(&desc.items), rev);
}

#[test]
fn absent_values_sort_last_in_both_directions() {
    let items = || vec![rec(0, "a", None), rec(1, "b", Some(5)), rec(2, "c", None), rec(3, "d", Some(2))];
    for (dir, expect) in [(SortDirection::Ascending, vec![3, 1, 0, 2]), (SortDirection::Descending, vec![1, 3, 0, 2])] {
        let sel = generic_data_select(items(), &DataSelectQuery::new().with_sort(PropertyName::Restarts, dir));
        assert_eq!(ids(&sel.items), expect, "{dir:?}");
    }
}

#[test]
fn quantities_sort_numerically() {
    let items = vec![rec(0, "a", Some(10)), rec(1, "b", Some(9)), rec(2, "c", Some(100))];
    let sel = generic_data_select(items, &DataSelectQuery::new().with_sort(PropertyName::Restarts, SortDirection::Ascending));
    assert_eq!(ids(&sel.items), vec![1, 0, 2]);
}

#[test]
fn runs_are_deterministic() {
    let q = DataSelectQuery::new()
        .with_filter(PropertyName::Name, "pod")
        .with_sort(PropertyName::Restarts, SortDirection::Descending)
        .with_sort(PropertyName::Name, SortDirection::Ascending)
        .with_pagination(2, 1);
    let a = generic_data_select(seven(), &q);
    let b = generic_data_select(seven(), &q);
    assert_eq!(a, b);
    assert_eq!(ids(&a.items), vec![1, 4]);
}

#[test]
fn hashed_join_matches_brute_force() {
    let mut rng = Lcg(42);
    let events: Vec<(usize, String)> = (0..5_000).map(|i| (i, format!("uid-{}", rng.next() % 2_000))).collect();
    let pods: Vec<String> = (0..700).map(|_| format!("uid-{}", rng.next() % 2_000)).collect();

    let brute: Vec<(usize, String)> = events.iter().filter(|(_, u)| pods.iter().any(|p| p == u)).cloned().collect();
    let hashed = join_by_identity(events, &pods, |e| Some(e.1.as_str()), |p| Some(p.as_str()));
    assert_eq!(hashed, brute);
    assert!(!hashed.is_empty());
}

#[test]
fn join_example() {
    let events = vec!["A", "B", "C"];
    let out = join_by_identity(events, &["B", "D"], |e| Some(*e), |p| Some(*p));
    assert_eq!(out, vec!["B"]);
}

struct FlakySource;

impl MetricsSource for FlakySource {
    fn series(&self, target: &MetricTarget, metric: MetricName) -> Result<Vec<MetricPoint>, MetricsError> {
        if target.name == "pod-1" {
            return Err(MetricsError::Unavailable("scrape timed out".into()));
        }
        let base = match metric { MetricName::Cpu => 100, MetricName::Memory => 1 << 20 };
        Ok((0..3).map(|i| MetricPoint { timestamp: Utc.timestamp_opt(i, 0).unwrap(), value: base * (i as u64 + 1) }).collect())
    }
}

#[test]
fn metrics_attach_after_paging_and_tolerate_failures() {
    let q = DataSelectQuery::new()
        .with_pagination(2, 0)
        .with_metrics(MetricQuery::new([MetricName::Cpu, MetricName::Memory], Aggregation::Max));
    let sel = generic_data_select_with_metrics(seven(), &q, &FlakySource);
    let m = sel.metrics.as_ref().unwrap();
    assert_eq!(m.len(), sel.items.len());
    assert_eq!(m[0][0].value, Some(300));
    assert_eq!(m[0][1].value, Some(3 << 20));
    assert_eq!(m[1][0].value, None);
    assert_eq!(m[1][1].value, None);
}

#[test]
fn metrics_absent_when_not_requested() {
    let sel = generic_data_select_with_metrics(seven(), &DataSelectQuery::new(), &FlakySource);
    assert!(sel.metrics.is_none());
}
