use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::{ListOptions, MetricsSnapshot, RecordSource};

/// In-memory record source. Honors namespace scope, equality label selectors
/// and the event field selectors the console uses.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub events: Vec<Event>,
    pub pods: Vec<Pod>,
    pub jobs: Vec<Job>,
    pub nodes: Vec<Node>,
    pub namespaces: Vec<Namespace>,
    pub metrics: MetricsSnapshot,
    /// Kinds ("events", "pods", ...) whose calls fail.
    pub failing: Vec<&'static str>,
}

fn pairs(selector: &str) -> Result<Vec<(&str, &str)>> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.split_once('=').map(|(k, v)| (k.trim(), v.trim_start_matches('=').trim())).ok_or_else(|| anyhow!("unsupported selector term {s:?}")))
        .collect()
}

fn in_scope(meta: &ObjectMeta, namespace: Option<&str>) -> bool {
    namespace.map_or(true, |ns| meta.namespace.as_deref() == Some(ns))
}

fn labels_match(meta: &ObjectMeta, opts: &ListOptions) -> Result<bool> {
    let Some(sel) = &opts.label_selector else { return Ok(true) };
    let empty = BTreeMap::new();
    let labels = meta.labels.as_ref().unwrap_or(&empty);
    Ok(pairs(sel)?.into_iter().all(|(k, v)| labels.get(k).map(String::as_str) == Some(v)))
}

fn event_field(e: &Event, key: &str) -> Result<Option<String>> {
    let o = &e.involved_object;
    Ok(match key {
        "involvedObject.name" => o.name.clone(),
        "involvedObject.kind" => o.kind.clone(),
        "involvedObject.uid" => o.uid.clone(),
        "involvedObject.namespace" => o.namespace.clone(),
        "metadata.name" => e.metadata.name.clone(),
        "metadata.namespace" => e.metadata.namespace.clone(),
        "type" => e.type_.clone(),
        "reason" => e.reason.clone(),
        other => bail!("field selector {other:?} is not supported for events"),
    })
}

fn fields_match(e: &Event, opts: &ListOptions) -> Result<bool> {
    let Some(sel) = &opts.field_selector else { return Ok(true) };
    for (k, v) in pairs(sel)? {
        if event_field(e, k)?.as_deref().unwrap_or_default() != v {
            return Ok(false);
        }
    }
    Ok(true)
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    fn check(&self, kind: &'static str) -> Result<()> {
        if self.failing.contains(&kind) {
            bail!("{kind}: connection refused");
        }
        Ok(())
    }

    fn select<T, F>(&self, items: &[T], meta: F, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<T>>
    where
        T: Clone,
        F: Fn(&T) -> &ObjectMeta,
    {
        let mut out = Vec::new();
        for it in items {
            if in_scope(meta(it), namespace) && labels_match(meta(it), opts)? {
                out.push(it.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl RecordSource for MemorySource {
    async fn list_events(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Event>> {
        self.check("events")?;
        let scoped = self.select(&self.events, |e| &e.metadata, namespace, opts)?;
        let mut out = Vec::with_capacity(scoped.len());
        for e in scoped {
            if fields_match(&e, opts)? {
                out.push(e);
            }
        }
        Ok(out)
    }

    async fn list_pods(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Pod>> {
        self.check("pods")?;
        self.select(&self.pods, |p| &p.metadata, namespace, opts)
    }

    async fn list_jobs(&self, namespace: Option<&str>, opts: &ListOptions) -> Result<Vec<Job>> {
        self.check("jobs")?;
        self.select(&self.jobs, |j| &j.metadata, namespace, opts)
    }

    async fn list_nodes(&self, opts: &ListOptions) -> Result<Vec<Node>> {
        self.check("nodes")?;
        self.select(&self.nodes, |n| &n.metadata, None, opts)
    }

    async fn list_namespaces(&self, opts: &ListOptions) -> Result<Vec<Namespace>> {
        self.check("namespaces")?;
        self.select(&self.namespaces, |n| &n.metadata, None, opts)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>> {
        self.check("jobs")?;
        Ok(self
            .jobs
            .iter()
            .find(|j| j.metadata.namespace.as_deref() == Some(namespace) && j.metadata.name.as_deref() == Some(name))
            .cloned())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        self.check("nodes")?;
        Ok(self.nodes.iter().find(|n| n.metadata.name.as_deref() == Some(name)).cloned())
    }

    async fn pod_metrics(&self, _namespace: Option<&str>) -> Result<MetricsSnapshot> {
        self.check("podmetrics")?;
        Ok(self.metrics.clone())
    }
}
