use chrono::{DateTime, Utc};
use dash_core::Quantity;
use dash_select::{MetricName, MetricPoint, MetricTarget, MetricsError, MetricsSource};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::warn;

/// Summed container usage of one pod at one sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PodUsage {
    pub timestamp: DateTime<Utc>,
    pub cpu_millis: u64,
    pub memory_bytes: u64,
}

/// Point-in-time pod usage, keyed by namespace then name.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pods: FxHashMap<String, FxHashMap<String, PodUsage>>,
}

impl MetricsSnapshot {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, namespace: &str, name: &str, usage: PodUsage) {
        self.pods.entry(namespace.to_string()).or_default().insert(name.to_string(), usage);
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&PodUsage> {
        self.pods.get(namespace)?.get(name)
    }

    pub fn len(&self) -> usize { self.pods.values().map(|by_name| by_name.len()).sum() }

    pub fn is_empty(&self) -> bool { self.pods.is_empty() }

    /// Build from raw `metrics.k8s.io/v1beta1` PodMetrics objects; malformed entries are skipped.
    pub fn from_pod_metrics(items: &[Value]) -> Self {
        let mut snap = Self::new();
        for v in items {
            match parse_pod_metrics(v) {
                Some((ns, name, usage)) => snap.insert(&ns, &name, usage),
                None => warn!(object = %v.pointer("/metadata/name").and_then(serde_json::Value::as_str).unwrap_or("?"), "kubehub: skipping malformed PodMetrics"),
            }
        }
        snap
    }
}

fn usage_of(container: &Value, resource: &str, to_u64: fn(&Quantity) -> Option<i64>) -> Option<u64> {
    let raw = container.get("usage")?.get(resource)?.as_str()?;
    let q = Quantity::parse(raw).ok()?;
    u64::try_from(to_u64(&q)?).ok()
}

fn parse_pod_metrics(v: &Value) -> Option<(String, String, PodUsage)> {
    let name = v.pointer("/metadata/name")?.as_str()?.to_string();
    let namespace = v.pointer("/metadata/namespace").and_then(Value::as_str).unwrap_or_default().to_string();
    let timestamp = v
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))?;
    let mut usage = PodUsage { timestamp, cpu_millis: 0, memory_bytes: 0 };
    for c in v.get("containers")?.as_array()? {
        usage.cpu_millis = usage.cpu_millis.saturating_add(usage_of(c, "cpu", Quantity::to_milli_units)?);
        usage.memory_bytes = usage.memory_bytes.saturating_add(usage_of(c, "memory", Quantity::to_units)?);
    }
    Some((namespace, name, usage))
}

impl MetricsSource for MetricsSnapshot {
    fn series(&self, target: &MetricTarget, metric: MetricName) -> Result<Vec<MetricPoint>, MetricsError> {
        let usage = self
            .get(target.namespace.as_deref().unwrap_or_default(), &target.name)
            .ok_or_else(|| MetricsError::NotFound { target: target.to_string(), metric })?;
        let value = match metric {
            MetricName::Cpu => usage.cpu_millis,
            MetricName::Memory => usage.memory_bytes,
        };
        Ok(vec![MetricPoint { timestamp: usage.timestamp, value }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod_metrics(name: &str, containers: Value) -> Value {
        json!({
            "apiVersion": "metrics.k8s.io/v1beta1",
            "kind": "PodMetrics",
            "metadata": {"name": name, "namespace": "default"},
            "timestamp": "2024-05-01T12:00:00Z",
            "window": "30s",
            "containers": containers,
        })
    }

    #[test]
    fn sums_container_usage() {
        let raw = vec![pod_metrics(
            "web",
            json!([
                {"name": "app", "usage": {"cpu": "250m", "memory": "64Mi"}},
                {"name": "proxy", "usage": {"cpu": "1500000n", "memory": "1Ki"}},
            ]),
        )];
        let snap = MetricsSnapshot::from_pod_metrics(&raw);
        let u = snap.get("default", "web").unwrap();
        assert_eq!(u.cpu_millis, 252);
        assert_eq!(u.memory_bytes, 64 * 1024 * 1024 + 1024);
    }

    #[test]
    fn lookup_is_scoped_by_namespace() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let mut snap = MetricsSnapshot::new();
        snap.insert("a", "web", PodUsage { timestamp: at, cpu_millis: 1, memory_bytes: 10 });
        snap.insert("b", "web", PodUsage { timestamp: at, cpu_millis: 2, memory_bytes: 20 });
        snap.insert("a", "web", PodUsage { timestamp: at, cpu_millis: 3, memory_bytes: 30 });
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("a", "web").map(|u| u.cpu_millis), Some(3));
        assert_eq!(snap.get("b", "web").map(|u| u.memory_bytes), Some(20));
        assert!(snap.get("c", "web").is_none());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let raw = vec![pod_metrics("bad", json!([{"name": "app", "usage": {"cpu": "lots", "memory": "1Mi"}}])), json!({"metadata": {}})];
        assert!(MetricsSnapshot::from_pod_metrics(&raw).is_empty());
    }

    #[test]
    fn series_reports_missing_pods() {
        let snap = MetricsSnapshot::from_pod_metrics(&[pod_metrics("web", json!([{"name": "app", "usage": {"cpu": "1", "memory": "1"}}]))]);
        let t = MetricTarget::new(Some("default"), "web");
        assert_eq!(snap.series(&t, MetricName::Cpu).unwrap()[0].value, 1000);
        let missing = MetricTarget::new(Some("default"), "db");
        assert!(matches!(snap.series(&missing, MetricName::Memory), Err(MetricsError::NotFound { .. })));
    }
}
