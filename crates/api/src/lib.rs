//! Dash public API façade (in-process).
//!
//! Frontends depend on [`ConsoleApi`]; [`InProcApi`] fetches through any
//! [`RecordSource`] and runs the select pipeline over the result.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dash_kubehub::{ListOptions, MetricsSnapshot, RecordSource};
use dash_resource::{
    build_job_detail, create_event_list, create_job_list, create_namespace_list, create_node_list, create_pod_list, selector_string,
    EventList, JobDetail, JobList, NamespaceList, NodeList, PodList, WarningReasons,
};
use dash_select::{DataSelectQuery, MetricsSource, QueryError};

/// API errors suitable for transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DashError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("upstream {resource}: {message}")]
    Upstream { resource: String, message: String },
    #[error("internal: {0}")]
    Internal(String),
}

pub type DashResult<T> = Result<T, DashError>;

impl From<QueryError> for DashError {
    fn from(e: QueryError) -> Self { DashError::Validation(e.to_string()) }
}

fn upstream(resource: &'static str) -> impl FnOnce(anyhow::Error) -> DashError {
    move |e| DashError::Upstream { resource: resource.to_string(), message: format!("{e:#}") }
}

/// Console views over the cluster.
#[async_trait::async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Events in a namespace, or in all namespaces for `None`.
    async fn events(&self, namespace: Option<&str>, query: &DataSelectQuery) -> DashResult<EventList>;

    /// Events whose involved object has the given name.
    async fn resource_events(&self, namespace: &str, name: &str, query: &DataSelectQuery) -> DashResult<EventList>;

    /// Events of the pods matched by a label selector.
    async fn pods_events(&self, namespace: &str, selector: &BTreeMap<String, String>, query: &DataSelectQuery) -> DashResult<EventList>;

    async fn node_events(&self, node: &str, query: &DataSelectQuery) -> DashResult<EventList>;

    /// Pods; attaches metrics when the query requests them.
    async fn pods(&self, namespace: Option<&str>, query: &DataSelectQuery) -> DashResult<PodList>;

    async fn jobs(&self, namespace: Option<&str>, query: &DataSelectQuery) -> DashResult<JobList>;

    async fn nodes(&self, query: &DataSelectQuery) -> DashResult<NodeList>;

    async fn namespaces(&self, query: &DataSelectQuery) -> DashResult<NamespaceList>;

    async fn job_detail(&self, namespace: &str, name: &str) -> DashResult<JobDetail>;
}

// ----------------- In-process implementation -----------------

/// In-process implementation over a record source.
pub struct InProcApi {
    source: Arc<dyn RecordSource>,
    reasons: WarningReasons,
}

impl InProcApi {
    /// Warning reasons come from `DASH_WARNING_REASONS` when set.
    pub fn new(source: Arc<dyn RecordSource>) -> Self { Self { source, reasons: WarningReasons::from_env() } }

    pub fn with_reasons(mut self, reasons: WarningReasons) -> Self {
        self.reasons = reasons;
        self
    }

    async fn event_list(&self, namespace: Option<&str>, opts: ListOptions, query: &DataSelectQuery) -> DashResult<EventList> {
        let events = self.source.list_events(namespace, &opts).await.map_err(upstream("events"))?;
        Ok(create_event_list(events, query, &self.reasons))
    }
}

#[async_trait::async_trait]
impl ConsoleApi for InProcApi {
    async fn events(&self, namespace: Option<&str>, query: &DataSelectQuery) -> DashResult<EventList> {
        let t0 = Instant::now();
        info!(ns = %namespace.unwrap_or("(all)"), "api: events start");
        let list = self.event_list(namespace, ListOptions::default(), query).await?;
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: events ok");
        Ok(list)
    }

    async fn resource_events(&self, namespace: &str, name: &str, query: &DataSelectQuery) -> DashResult<EventList> {
        let t0 = Instant::now();
        info!(ns = %namespace, name = %name, "api: resource events start");
        let opts = ListOptions::default().fields(format!("involvedObject.name={name}"));
        let list = self.event_list(Some(namespace), opts, query).await?;
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: resource events ok");
        Ok(list)
    }

    async fn pods_events(&self, namespace: &str, selector: &BTreeMap<String, String>, query: &DataSelectQuery) -> DashResult<EventList> {
        let t0 = Instant::now();
        let sel = selector_string(selector);
        info!(ns = %namespace, selector = %sel, "api: pods events start");
        let pod_opts = ListOptions::default().labels(sel);
        let all = ListOptions::default();
        let (pods, events) = tokio::join!(self.source.list_pods(Some(namespace), &pod_opts), self.source.list_events(Some(namespace), &all));
        let pods = pods.map_err(upstream("pods"))?;
        let events = events.map_err(upstream("events"))?;
        let joined = dash_resource::filter_events_by_pods_uid(events, &pods);
        let list = create_event_list(joined, query, &self.reasons);
        info!(pods = pods.len(), total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: pods events ok");
        Ok(list)
    }

    async fn node_events(&self, node: &str, query: &DataSelectQuery) -> DashResult<EventList> {
        let t0 = Instant::now();
        info!(node = %node, "api: node events start");
        if self.source.get_node(node).await.map_err(upstream("nodes"))?.is_none() {
            return Err(DashError::NotFound(format!("node {node}")));
        }
        let opts = ListOptions::default().fields(format!("involvedObject.kind=Node,involvedObject.name={node}"));
        let list = self.event_list(None, opts, query).await?;
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: node events ok");
        Ok(list)
    }

    async fn pods(&self, namespace: Option<&str>, query: &DataSelectQuery) -> DashResult<PodList> {
        let t0 = Instant::now();
        info!(ns = %namespace.unwrap_or("(all)"), metrics = query.metrics.is_some(), "api: pods start");
        let opts = ListOptions::default();
        let list = if query.metrics.is_some() {
            let (pods, snapshot) = tokio::join!(self.source.list_pods(namespace, &opts), self.source.pod_metrics(namespace));
            let pods = pods.map_err(upstream("pods"))?;
            let snapshot = snapshot.unwrap_or_else(|e| {
                warn!(error = %e, "api: pod metrics unavailable");
                MetricsSnapshot::new()
            });
            create_pod_list(&pods, query, Some(&snapshot as &dyn MetricsSource))
        } else {
            let pods = self.source.list_pods(namespace, &opts).await.map_err(upstream("pods"))?;
            create_pod_list(&pods, query, None)
        };
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: pods ok");
        Ok(list)
    }

    async fn jobs(&self, namespace: Option<&str>, query: &DataSelectQuery) -> DashResult<JobList> {
        let t0 = Instant::now();
        info!(ns = %namespace.unwrap_or("(all)"), "api: jobs start");
        let jobs = self.source.list_jobs(namespace, &ListOptions::default()).await.map_err(upstream("jobs"))?;
        let list = create_job_list(&jobs, query);
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: jobs ok");
        Ok(list)
    }

    async fn nodes(&self, query: &DataSelectQuery) -> DashResult<NodeList> {
        let t0 = Instant::now();
        let nodes = self.source.list_nodes(&ListOptions::default()).await.map_err(upstream("nodes"))?;
        let list = create_node_list(&nodes, query);
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: nodes ok");
        Ok(list)
    }

    async fn namespaces(&self, query: &DataSelectQuery) -> DashResult<NamespaceList> {
        let t0 = Instant::now();
        let namespaces = self.source.list_namespaces(&ListOptions::default()).await.map_err(upstream("namespaces"))?;
        let list = create_namespace_list(&namespaces, query);
        info!(total = list.list_meta.total_items, took_ms = %t0.elapsed().as_millis(), "api: namespaces ok");
        Ok(list)
    }

    async fn job_detail(&self, namespace: &str, name: &str) -> DashResult<JobDetail> {
        let t0 = Instant::now();
        info!(ns = %namespace, name = %name, "api: job detail start");
        let job = self
            .source
            .get_job(namespace, name)
            .await
            .map_err(upstream("jobs"))?
            .ok_or_else(|| DashError::NotFound(format!("job {namespace}/{name}")))?;
        let all = ListOptions::default();
        let (pods, events) = tokio::join!(self.source.list_pods(Some(namespace), &all), self.source.list_events(Some(namespace), &all));
        let pods = pods.map_err(upstream("pods"))?;
        let events = events.map_err(upstream("events"))?;
        let detail = build_job_detail(&job, pods, events, &self.reasons);
        info!(pods = detail.pod_list.pods.len(), took_ms = %t0.elapsed().as_millis(), "api: job detail ok");
        Ok(detail)
    }
}
