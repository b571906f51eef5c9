//! View types and helpers shared by every kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dash_core::{ComparableValue, PropertyName, Quantity, ResourceKind};
use k8s_openapi::api::core::v1::{Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta as KubeObjectMeta, Time};
use serde::{Deserialize, Serialize};

/// Compact object metadata carried by every view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl From<&KubeObjectMeta> for ObjectMeta {
    fn from(m: &KubeObjectMeta) -> Self {
        Self {
            name: m.name.clone().unwrap_or_default(),
            namespace: m.namespace.clone(),
            uid: m.uid.clone(),
            labels: m.labels.clone().unwrap_or_default(),
            annotations: m.annotations.clone().unwrap_or_default(),
            creation_timestamp: m.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}

impl ObjectMeta {
    /// name/namespace/creationTimestamp of a view, mirroring [`meta_property`].
    pub(crate) fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Name => text(Some(&self.name)),
            PropertyName::Namespace => text(self.namespace.as_deref()),
            PropertyName::CreationTimestamp => self.creation_timestamp.map(ComparableValue::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMeta {
    pub kind: ResourceKind,
}

impl TypeMeta {
    pub fn new(kind: ResourceKind) -> Self { Self { kind } }
}

/// name/namespace/creationTimestamp straight from object metadata.
pub(crate) fn meta_property(meta: &KubeObjectMeta, name: PropertyName) -> Option<ComparableValue> {
    match name {
        PropertyName::Name => text(meta.name.as_deref()),
        PropertyName::Namespace => text(meta.namespace.as_deref()),
        PropertyName::CreationTimestamp => time(meta.creation_timestamp.as_ref()),
        _ => None,
    }
}

/// Empty strings count as absent.
pub(crate) fn text(s: Option<&str>) -> Option<ComparableValue> { s.filter(|s| !s.is_empty()).map(ComparableValue::from) }

pub(crate) fn time(t: Option<&Time>) -> Option<ComparableValue> { t.map(|t| ComparableValue::Timestamp(t.0)) }

pub(crate) fn count(n: i64) -> ComparableValue { ComparableValue::Quantity(Quantity::from(n)) }

/// Parse an API quantity; malformed text is treated as absent.
pub fn to_quantity(q: &KubeQuantity) -> Option<Quantity> { Quantity::parse(&q.0).ok() }

/// Images of the spec's containers, in declaration order.
pub fn container_images(spec: Option<&PodSpec>) -> Vec<String> {
    spec.map(|s| s.containers.iter().filter_map(|c| c.image.clone()).collect()).unwrap_or_default()
}

/// `k=v,k2=v2` label selector text; empty map gives an empty string.
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
}

/// Pods in `namespace` whose labels contain every selector pair. An empty selector matches all.
pub fn filter_namespaced_pods_by_selector(pods: Vec<Pod>, namespace: &str, selector: &BTreeMap<String, String>) -> Vec<Pod> {
    pods.into_iter()
        .filter(|p| p.metadata.namespace.as_deref() == Some(namespace))
        .filter(|p| {
            let labels = p.metadata.labels.as_ref();
            selector.iter().all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
        })
        .collect()
}
