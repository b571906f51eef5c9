use dash_core::{ComparableValue, DataCell, PropertyName, ResourceKind};
use dash_select::{generic_data_select, DataSelectQuery, ListMeta};
use k8s_openapi::api::core::v1::Namespace;
use serde::{Deserialize, Serialize};

use crate::common::{meta_property, text, ObjectMeta, TypeMeta};

fn phase(ns: &Namespace) -> Option<&str> { ns.status.as_ref().and_then(|s| s.phase.as_deref()) }

pub struct NamespaceCell<'a>(pub &'a Namespace);

impl DataCell for NamespaceCell<'_> {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Name | PropertyName::CreationTimestamp => meta_property(&self.0.metadata, name),
            PropertyName::Status => text(phase(self.0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceView {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub phase: String,
}

impl From<&Namespace> for NamespaceView {
    fn from(ns: &Namespace) -> Self {
        Self {
            object_meta: ObjectMeta::from(&ns.metadata),
            type_meta: TypeMeta::new(ResourceKind::Namespace),
            phase: phase(ns).unwrap_or_default().to_string(),
        }
    }
}

impl DataCell for NamespaceView {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => text(Some(&self.phase)),
            PropertyName::Namespace => None,
            other => self.object_meta.property(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceList {
    pub list_meta: ListMeta,
    pub namespaces: Vec<NamespaceView>,
}

pub fn create_namespace_list(namespaces: &[Namespace], query: &DataSelectQuery) -> NamespaceList {
    let cells: Vec<NamespaceCell<'_>> = namespaces.iter().map(NamespaceCell).collect();
    let sel = generic_data_select(cells, query);
    NamespaceList { list_meta: sel.list_meta, namespaces: sel.items.into_iter().map(|c| NamespaceView::from(c.0)).collect() }
}
