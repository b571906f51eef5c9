//! Dash kubehub: record and metrics sources for the console.
//!
//! [`RecordSource`] is the seam the API layer fetches through; [`KubeSource`]
//! talks to the cluster, [`MemorySource`] serves fixed objects for tests and demos.

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};
use kube::{
    api::{Api, ListParams},
    Client,
};
use serde_json::Value;
use tracing::{debug, info};

mod memory;
mod snapshot;

pub use memory::MemorySource;
pub use snapshot::{MetricsSnapshot, PodUsage};

/// Label and field selectors applied server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl ListOptions {
    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn fields(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into()).filter(|s: &String| !s.is_empty());
        self
    }

    fn params(&self) -> ListParams {
        let mut lp = ListParams::default();
        if let Some(l) = &self.label_selector {
            lp = lp.labels(l);
        }
        if let Some(f) = &self.field_selector {
            lp = lp.fields(f);
        }
        lp
    }
}

/// Where the console reads objects from. `namespace: None` means all namespaces.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    async fn list_events(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Event>>;
    async fn list_pods(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Pod>>;
    async fn list_jobs(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Job>>;
    async fn list_nodes(&self, opts: &ListOptions) -> Result<Vec<Node>>;
    async fn list_namespaces(&self, opts: &ListOptions) -> Result<Vec<Namespace>>;
    /// `Ok(None)` when the job does not exist.
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>>;
    async fn get_node(&self, name: &str) -> Result<Option<Node>>;
    /// Current pod usage from the metrics API.
    async fn pod_metrics(&self, namespace: Option<&str>) -> Result<MetricsSnapshot>;
}

/// `DASH_FETCH_TIMEOUT_SECS`, default 30.
pub fn fetch_timeout() -> Duration {
    let secs = std::env::var("DASH_FETCH_TIMEOUT_SECS").ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(30);
    Duration::from_secs(secs.max(1))
}

/// Record source over a live cluster.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    timeout: Duration,
}

impl KubeSource {
    pub fn new(client: Client) -> Self { Self { client, timeout: fetch_timeout() } }

    /// Client from the ambient kubeconfig or in-cluster environment.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await.context("building kube client")?;
        Ok(Self::new(client))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list<K>(&self, kind: &'static str, api: Api<K>, opts: &ListOptions) -> Result<Vec<K>>
    where
        K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
    {
        let t0 = Instant::now();
        let lp = opts.params();
        let list = tokio::time::timeout(self.timeout, api.list(&lp))
            .await
            .map_err(|_| anyhow!("listing {kind} timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("listing {kind}"))?;
        let elapsed = t0.elapsed();
        metrics::histogram!("kubehub_list_ms", elapsed.as_secs_f64() * 1_000.0, "kind" => kind);
        debug!(kind, items = list.items.len(), took_ms = %elapsed.as_millis(), "kubehub: list ok");
        Ok(list.items)
    }

    async fn get<K>(&self, kind: &'static str, api: Api<K>, name: &str) -> Result<Option<K>>
    where
        K: kube::Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
    {
        tokio::time::timeout(self.timeout, api.get_opt(name))
            .await
            .map_err(|_| anyhow!("getting {kind} {name} timed out"))?
            .with_context(|| format!("getting {kind} {name}"))
    }
}

#[async_trait::async_trait]
impl RecordSource for KubeSource {
    async fn list_events(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Event>> {
        self.list("events", self.scoped(namespace), opts).await
    }

    async fn list_pods(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Pod>> {
        self.list("pods", self.scoped(namespace), opts).await
    }

    async fn list_jobs(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Job>> {
        self.list("jobs", self.scoped(namespace), opts).await
    }

    async fn list_nodes(&self, opts: &ListOptions) -> Result<Vec<Node>> {
        self.list("nodes", Api::all(self.client.clone()), opts).await
    }

    async fn list_namespaces(&self, opts: &ListOptions) -> Result<Vec<Namespace>> {
        self.list("namespaces", Api::all(self.client.clone()), opts).await
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>> {
        self.get("job", Api::namespaced(self.client.clone(), namespace), name).await
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        self.get("node", Api::all(self.client.clone()), name).await
    }

    async fn pod_metrics(&self, namespace: Option<&str>) -> Result<MetricsSnapshot> {
        use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let ar = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };
        let objs = self.list("podmetrics", api, &ListOptions::default()).await?;
        let raw: Vec<Value> = objs.iter().map(serde_json::to_value).collect::<Result<_, _>>().context("serializing PodMetrics")?;
        let snap = MetricsSnapshot::from_pod_metrics(&raw);
        info!(pods = snap.len(), "kubehub: pod metrics fetched");
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selectors_are_dropped() {
        let o = ListOptions::default().labels("").fields("involvedObject.name=web");
        assert_eq!(o.label_selector, None);
        assert_eq!(o.field_selector.as_deref(), Some("involvedObject.name=web"));
        let lp = o.params();
        assert_eq!(lp.field_selector.as_deref(), Some("involvedObject.name=web"));
        assert_eq!(lp.label_selector, None);
    }
}
