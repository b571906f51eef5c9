//! Dash resource kinds: one [`dash_core::DataCell`] adapter per kind, plus
//! the list and detail views built from the select pipeline.

#![forbid(unsafe_code)]

pub mod common;
pub mod event;
pub mod job;
pub mod namespace;
pub mod node;
pub mod pod;

pub use common::{container_images, filter_namespaced_pods_by_selector, selector_string, ObjectMeta, TypeMeta};
pub use event::{
    classify, create_event_list, fill_events_type, filter_events_by_pods_uid, is_type_filled, pod_warnings, EventCell, EventList,
    EventType, EventView, WarningReasons, DEFAULT_WARNING_REASONS,
};
pub use job::{build_job_detail, create_job_list, job_selector, JobCell, JobDetail, JobList, JobView, PodInfo};
pub use namespace::{create_namespace_list, NamespaceCell, NamespaceList, NamespaceView};
pub use node::{create_node_list, NodeCell, NodeList, NodeView};
pub use pod::{create_pod_list, PodCell, PodList, PodView};
