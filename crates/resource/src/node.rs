use dash_core::{ComparableValue, DataCell, PropertyName, Quantity, ResourceKind};
use dash_select::{generic_data_select, DataSelectQuery, ListMeta};
use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};

use crate::common::{meta_property, to_quantity, ObjectMeta, TypeMeta};

/// `Ready`, `NotReady` or `Unknown` from the Ready condition.
pub fn node_status(node: &Node) -> &'static str {
    let ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|cs| cs.iter().find(|c| c.type_ == "Ready"));
    match ready.map(|c| c.status.as_str()) {
        Some("True") => "Ready",
        Some("False") => "NotReady",
        _ => "Unknown",
    }
}

fn capacity<'a>(node: &'a Node, resource: &str) -> Option<&'a k8s_openapi::apimachinery::pkg::api::resource::Quantity> {
    node.status.as_ref().and_then(|s| s.capacity.as_ref()).and_then(|c| c.get(resource))
}

pub struct NodeCell<'a>(pub &'a Node);

impl DataCell for NodeCell<'_> {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        let n = self.0;
        match name {
            PropertyName::Name | PropertyName::CreationTimestamp => meta_property(&n.metadata, name),
            PropertyName::Status => Some(node_status(n).into()),
            PropertyName::CpuCapacity => capacity(n, "cpu").and_then(to_quantity).map(Into::into),
            PropertyName::MemoryCapacity => capacity(n, "memory").and_then(to_quantity).map(Into::into),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub ready: String,
    pub unschedulable: bool,
    pub cpu_capacity: Option<String>,
    pub memory_capacity: Option<String>,
}

impl From<&Node> for NodeView {
    fn from(n: &Node) -> Self {
        Self {
            object_meta: ObjectMeta::from(&n.metadata),
            type_meta: TypeMeta::new(ResourceKind::Node),
            ready: node_status(n).to_string(),
            unschedulable: n.spec.as_ref().and_then(|s| s.unschedulable).unwrap_or(false),
            cpu_capacity: capacity(n, "cpu").map(|q| q.0.clone()),
            memory_capacity: capacity(n, "memory").map(|q| q.0.clone()),
        }
    }
}

impl DataCell for NodeView {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        let parsed = |s: &Option<String>| s.as_deref().and_then(|q| Quantity::parse(q).ok()).map(ComparableValue::Quantity);
        match name {
            PropertyName::Status => Some(self.ready.as_str().into()),
            PropertyName::CpuCapacity => parsed(&self.cpu_capacity),
            PropertyName::MemoryCapacity => parsed(&self.memory_capacity),
            PropertyName::Namespace => None,
            other => self.object_meta.property(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeList {
    pub list_meta: ListMeta,
    pub nodes: Vec<NodeView>,
}

pub fn create_node_list(nodes: &[Node], query: &DataSelectQuery) -> NodeList {
    let cells: Vec<NodeCell<'_>> = nodes.iter().map(NodeCell).collect();
    let sel = generic_data_select(cells, query);
    NodeList { list_meta: sel.list_meta, nodes: sel.items.into_iter().map(|c| NodeView::from(c.0)).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_select::SortDirection;
    use serde_json::json;

    fn node(name: &str, ready: Option<&str>, memory: &str) -> Node {
        let conditions: Vec<_> = ready.map(|r| json!({"type": "Ready", "status": r})).into_iter().collect();
        serde_json::from_value(json!({
            "metadata": {"name": name},
            "status": {"capacity": {"cpu": "4", "memory": memory}, "conditions": conditions},
        }))
        .unwrap()
    }

    #[test]
    fn status_from_ready_condition() {
        assert_eq!(node_status(&node("a", Some("True"), "1Gi")), "Ready");
        assert_eq!(node_status(&node("a", Some("False"), "1Gi")), "NotReady");
        assert_eq!(node_status(&node("a", None, "1Gi")), "Unknown");
    }

    #[test]
    fn memory_capacity_sorts_by_quantity_not_text() {
        let nodes = vec![node("small", None, "900Mi"), node("big", None, "2Gi"), node("mid", None, "1500M")];
        let q = DataSelectQuery::new().with_sort(PropertyName::MemoryCapacity, SortDirection::Ascending);
        let names: Vec<String> = create_node_list(&nodes, &q).nodes.into_iter().map(|n| n.object_meta.name).collect();
        assert_eq!(names, vec!["small", "mid", "big"]);
    }

    #[test]
    fn malformed_capacity_is_absent_and_sorts_last() {
        let mut bad = node("bad", None, "1Gi");
        if let Some(c) = bad.status.as_mut().and_then(|s| s.capacity.as_mut()) {
            c.insert("cpu".into(), k8s_openapi::apimachinery::pkg::api::resource::Quantity("lots".into()));
        }
        assert_eq!(NodeCell(&bad).property(PropertyName::CpuCapacity), None);
        assert_eq!(NodeView::from(&bad).property(PropertyName::CpuCapacity), None);

        let nodes = vec![bad, node("ok", None, "1Gi")];
        for dir in [SortDirection::Ascending, SortDirection::Descending] {
            let q = DataSelectQuery::new().with_sort(PropertyName::CpuCapacity, dir);
            let names: Vec<String> = create_node_list(&nodes, &q).nodes.into_iter().map(|n| n.object_meta.name).collect();
            assert_eq!(names, vec!["ok", "bad"]);
        }
    }

    #[test]
    fn nodes_have_no_namespace() {
        let n = node("a", None, "1Gi");
        assert_eq!(NodeCell(&n).property(PropertyName::Namespace), None);
        assert_eq!(NodeView::from(&n).cpu_capacity.as_deref(), Some("4"));
    }
}
