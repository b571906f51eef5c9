//! Jobs: accessor, list view, and the detail view assembled from the job's pods and events.

use dash_core::{ComparableValue, DataCell, PropertyName, ResourceKind};
use dash_select::{generic_data_select, DataSelectQuery, ListMeta};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use serde::{Deserialize, Serialize};

use crate::common::{container_images, count, filter_namespaced_pods_by_selector, meta_property, text, ObjectMeta, TypeMeta};
use crate::event::{create_event_list, pod_warnings, EventList, EventView, WarningReasons};
use crate::pod::{create_pod_list, phase, PodList};

/// `Complete` or `Failed` from a true condition, otherwise `Running`.
pub fn job_status(job: &Job) -> &'static str {
    let conditions = job.status.as_ref().and_then(|s| s.conditions.as_deref()).unwrap_or_default();
    for c in conditions.iter().filter(|c| c.status == "True") {
        match c.type_.as_str() {
            "Complete" => return "Complete",
            "Failed" => return "Failed",
            _ => {}
        }
    }
    "Running"
}

fn succeeded(job: &Job) -> i32 { job.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0) }

pub struct JobCell<'a>(pub &'a Job);

impl DataCell for JobCell<'_> {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        let j = self.0;
        match name {
            PropertyName::Name | PropertyName::Namespace | PropertyName::CreationTimestamp => meta_property(&j.metadata, name),
            PropertyName::Status => Some(job_status(j).into()),
            PropertyName::Completions => Some(count(succeeded(j).into())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub status: String,
    pub completions: Option<i32>,
    pub succeeded: i32,
    pub container_images: Vec<String>,
}

impl From<&Job> for JobView {
    fn from(j: &Job) -> Self {
        Self {
            object_meta: ObjectMeta::from(&j.metadata),
            type_meta: TypeMeta::new(ResourceKind::Job),
            status: job_status(j).to_string(),
            completions: j.spec.as_ref().and_then(|s| s.completions),
            succeeded: succeeded(j),
            container_images: template_images(j),
        }
    }
}

impl DataCell for JobView {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => text(Some(&self.status)),
            PropertyName::Completions => Some(count(self.succeeded.into())),
            other => self.object_meta.property(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobList {
    pub list_meta: ListMeta,
    pub jobs: Vec<JobView>,
}

pub fn create_job_list(jobs: &[Job], query: &DataSelectQuery) -> JobList {
    let cells: Vec<JobCell<'_>> = jobs.iter().map(JobCell).collect();
    let sel = generic_data_select(cells, query);
    JobList { list_meta: sel.list_meta, jobs: sel.items.into_iter().map(|c| JobView::from(c.0)).collect() }
}

fn template_images(job: &Job) -> Vec<String> {
    container_images(job.spec.as_ref().and_then(|s| s.template.spec.as_ref()))
}

/// Label selector pairs the job uses to own its pods.
pub fn job_selector(job: &Job) -> std::collections::BTreeMap<String, String> {
    job.spec
        .as_ref()
        .and_then(|s| s.selector.as_ref())
        .and_then(|s| s.match_labels.clone())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub current: i32,
    pub desired: i32,
    pub running: i32,
    pub pending: i32,
    pub failed: i32,
    pub succeeded: i32,
    pub warnings: Vec<EventView>,
}

pub fn pod_info(job: &Job, pods: &[Pod], warnings: Vec<EventView>) -> PodInfo {
    let mut info = PodInfo {
        current: job.status.as_ref().and_then(|s| s.active).unwrap_or(0),
        desired: job.spec.as_ref().and_then(|s| s.completions).unwrap_or(0),
        warnings,
        ..PodInfo::default()
    };
    for p in pods {
        match phase(p) {
            Some("Running") => info.running += 1,
            Some("Pending") => info.pending += 1,
            Some("Failed") => info.failed += 1,
            Some("Succeeded") => info.succeeded += 1,
            _ => {}
        }
    }
    info
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub pod_info: PodInfo,
    pub pod_list: PodList,
    pub container_images: Vec<String>,
    pub event_list: EventList,
}

fn involves_job(e: &Event, job: &Job) -> bool {
    let obj = &e.involved_object;
    match (obj.uid.as_deref(), job.metadata.uid.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() => a == b,
        _ => obj.kind.as_deref() == Some("Job") && obj.name == job.metadata.name,
    }
}

/// Assemble the detail view from the job, the namespace's pods and the namespace's events.
pub fn build_job_detail(job: &Job, pods: Vec<Pod>, events: Vec<Event>, reasons: &WarningReasons) -> JobDetail {
    let namespace = job.metadata.namespace.as_deref().unwrap_or_default();
    let matching = filter_namespaced_pods_by_selector(pods, namespace, &job_selector(job));
    let (own, rest): (Vec<Event>, Vec<Event>) = events.into_iter().partition(|e| involves_job(e, job));
    let warnings = pod_warnings(rest, &matching, reasons);
    JobDetail {
        object_meta: ObjectMeta::from(&job.metadata),
        type_meta: TypeMeta::new(ResourceKind::Job),
        pod_info: pod_info(job, &matching, warnings),
        pod_list: create_pod_list(&matching, &DataSelectQuery::new(), None),
        container_images: template_images(job),
        event_list: create_event_list(own, &DataSelectQuery::new(), reasons),
    }
}
