use dash_core::{ComparableValue, DataCell, PropertyName, ResourceKind};
use dash_select::{generic_data_select, generic_data_select_with_metrics, AggregatedMetric, DataSelectQuery, ListMeta, MetricCell, MetricTarget, MetricsSource};
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};

use crate::common::{count, meta_property, text, ObjectMeta, TypeMeta};

/// Sum of container restarts.
pub fn restart_count(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|cs| cs.iter().map(|c| c.restart_count).sum())
        .unwrap_or(0)
}

pub fn phase(pod: &Pod) -> Option<&str> { pod.status.as_ref().and_then(|s| s.phase.as_deref()) }

pub struct PodCell<'a>(pub &'a Pod);

impl DataCell for PodCell<'_> {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        let p = self.0;
        match name {
            PropertyName::Name | PropertyName::Namespace | PropertyName::CreationTimestamp => meta_property(&p.metadata, name),
            PropertyName::Status => text(phase(p)),
            PropertyName::NodeName => text(p.spec.as_ref().and_then(|s| s.node_name.as_deref())),
            PropertyName::Restarts => Some(count(restart_count(p).into())),
            _ => None,
        }
    }
}

impl MetricCell for PodCell<'_> {
    fn metric_target(&self) -> Option<MetricTarget> {
        let m = &self.0.metadata;
        m.name.as_deref().map(|n| MetricTarget::new(m.namespace.as_deref(), n))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodView {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub pod_phase: String,
    pub node_name: String,
    pub restart_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
}

impl From<&Pod> for PodView {
    fn from(p: &Pod) -> Self {
        Self {
            object_meta: ObjectMeta::from(&p.metadata),
            type_meta: TypeMeta::new(ResourceKind::Pod),
            pod_phase: phase(p).unwrap_or_default().to_string(),
            node_name: p.spec.as_ref().and_then(|s| s.node_name.clone()).unwrap_or_default(),
            restart_count: restart_count(p),
            pod_ip: p.status.as_ref().and_then(|s| s.pod_ip.clone()),
        }
    }
}

impl DataCell for PodView {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => text(Some(&self.pod_phase)),
            PropertyName::NodeName => text(Some(&self.node_name)),
            PropertyName::Restarts => Some(count(self.restart_count.into())),
            other => self.object_meta.property(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodList {
    pub list_meta: ListMeta,
    pub pods: Vec<PodView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<Vec<AggregatedMetric>>>,
}

/// Select over `pods`; metrics are attached only when a source is given and the query asks.
pub fn create_pod_list(pods: &[Pod], query: &DataSelectQuery, metrics: Option<&dyn MetricsSource>) -> PodList {
    let cells: Vec<PodCell<'_>> = pods.iter().map(PodCell).collect();
    let sel = match metrics {
        Some(source) => generic_data_select_with_metrics(cells, query, source),
        None => generic_data_select(cells, query),
    };
    PodList { list_meta: sel.list_meta, metrics: sel.metrics, pods: sel.items.into_iter().map(|c| PodView::from(c.0)).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::Quantity;
    use dash_select::{Aggregation, MetricName, MetricPoint, MetricQuery, MetricsError, SortDirection};
    use serde_json::json;

    fn pod(name: &str, phase: &str, restarts: &[i32]) -> Pod {
        let statuses: Vec<_> = restarts.iter().enumerate().map(|(i, r)| json!({"name": format!("c{i}"), "restartCount": r, "ready": true, "image": "img", "imageID": ""})).collect();
        serde_json::from_value(json!({
            "metadata": {"name": name, "namespace": "default"},
            "spec": {"nodeName": "node-1", "containers": [{"name": "c0", "image": "img"}]},
            "status": {"phase": phase, "containerStatuses": statuses},
        }))
        .unwrap()
    }

    #[test]
    fn restarts_sum_across_containers() {
        let p = pod("a", "Running", &[1, 4]);
        assert_eq!(restart_count(&p), 5);
        assert_eq!(PodCell(&p).property(PropertyName::Restarts), Some(ComparableValue::Quantity(Quantity::from(5i64))));
        assert_eq!(PodCell(&p).property(PropertyName::NodeName), Some("node-1".into()));
        assert_eq!(PodCell(&p).property(PropertyName::Reason), None);
    }

    #[test]
    fn view_exposes_the_same_properties() {
        let p = pod("a", "Running", &[2]);
        let v = PodView::from(&p);
        for name in PropertyName::ALL {
            assert_eq!(v.property(name), PodCell(&p).property(name), "{name}");
        }
    }

    #[test]
    fn empty_phase_is_absent_in_view_and_cell() {
        let p = pod("a", "", &[]);
        assert_eq!(PodCell(&p).property(PropertyName::Status), None);
        assert_eq!(PodView::from(&p).property(PropertyName::Status), None);
    }

    #[test]
    fn list_sorts_by_restarts() {
        let pods = vec![pod("a", "Running", &[3]), pod("b", "Pending", &[]), pod("c", "Running", &[1])];
        let q = DataSelectQuery::new().with_sort(PropertyName::Restarts, SortDirection::Descending);
        let list = create_pod_list(&pods, &q, None);
        let names: Vec<&str> = list.pods.iter().map(|p| p.object_meta.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
        assert!(list.metrics.is_none());
    }

    struct Fixed;

    impl MetricsSource for Fixed {
        fn series(&self, target: &MetricTarget, _metric: MetricName) -> Result<Vec<MetricPoint>, MetricsError> {
            if target.namespace.as_deref() != Some("default") {
                return Err(MetricsError::Unavailable("wrong namespace".into()));
            }
            Ok(vec![MetricPoint { timestamp: chrono::Utc::now(), value: 250 }])
        }
    }

    #[test]
    fn list_attaches_metrics_per_pod() {
        let pods = vec![pod("a", "Running", &[])];
        let q = DataSelectQuery::new().with_metrics(MetricQuery::new([MetricName::Cpu], Aggregation::Latest));
        let list = create_pod_list(&pods, &q, Some(&Fixed));
        assert_eq!(list.metrics.unwrap()[0][0].value, Some(250));
    }
}
