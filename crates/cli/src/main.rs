use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dash_api::{ConsoleApi, InProcApi};
use dash_core::columns::{columns_for, render_header, render_row};
use dash_core::{DataCell, ResourceKind};
use dash_kubehub::KubeSource;
use dash_select::{AggregatedMetric, DataSelectQuery, RawQuery};
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dashctl", version, about = "Dash console CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: all, or `default` where one is required)
    #[arg(long = "ns", global = true, env = "DASH_NAMESPACE")]
    namespace: Option<String>,

    #[command(flatten)]
    query: QueryArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Args, Debug, Default, Clone)]
struct QueryArgs {
    /// Keep items whose property contains the value: prop=value (repeatable)
    #[arg(long = "filter", global = true)]
    filter: Vec<String>,
    /// Order by property; prefix `-` for descending (repeatable)
    #[arg(long = "sort", global = true, allow_hyphen_values = true)]
    sort: Vec<String>,
    /// Zero-based page index
    #[arg(long = "page", global = true, allow_negative_numbers = true)]
    page: Option<i64>,
    /// Items per page (0 disables paging)
    #[arg(long = "page-size", global = true, allow_negative_numbers = true)]
    page_size: Option<i64>,
    /// Pod metric to attach: cpu|memory (repeatable)
    #[arg(long = "metric", global = true)]
    metric: Vec<String>,
    /// latest|average|min|max|sum
    #[arg(long = "aggregation", global = true)]
    aggregation: Option<String>,
}

impl QueryArgs {
    fn to_raw(&self) -> Result<RawQuery> {
        let filter_by = self
            .filter
            .iter()
            .map(|f| f.split_once('=').map(|(p, v)| format!("{},{}", p.trim(), v)).ok_or_else(|| anyhow!("--filter expects prop=value, got {f:?}")))
            .collect::<Result<Vec<_>>>()?;
        let sort_by = self
            .sort
            .iter()
            .map(|s| match s.strip_prefix('-') {
                Some(p) => format!("d,{p}"),
                None => format!("a,{}", s.strip_prefix('+').unwrap_or(s)),
            })
            .collect();
        Ok(RawQuery {
            filter_by,
            sort_by,
            page: self.page,
            items_per_page: self.page_size,
            metrics: self.metric.clone(),
            aggregation: self.aggregation.clone(),
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List events (namespace, resource, node or selected pods)
    Events {
        /// Events of the object with this name
        #[arg(long = "resource", conflicts_with_all = ["node", "pods_selector"])]
        resource: Option<String>,
        /// Events of this node (cluster-wide)
        #[arg(long = "node", conflicts_with = "pods_selector")]
        node: Option<String>,
        /// Events of pods matching k=v[,k=v...]
        #[arg(long = "pods-selector")]
        pods_selector: Option<String>,
    },
    /// List pods
    Pods,
    /// List jobs
    Jobs,
    /// List nodes
    Nodes,
    /// List namespaces
    Namespaces,
    /// Show job detail: pod counts, pods, images and events
    Job {
        name: String,
    },
}

fn init_tracing() {
    let env = std::env::var("DASH_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("DASH_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid DASH_METRICS_ADDR; expected host:port");
        }
    }
}

fn parse_selector(s: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let Some((k, v)) = term.split_once('=') else { bail!("selector term {term:?} is not k=v") };
        out.insert(k.trim().to_string(), v.trim().to_string());
    }
    Ok(out)
}

fn print_table<T: DataCell>(kind: ResourceKind, rows: &[T], metrics: Option<&[Vec<AggregatedMetric>]>) {
    let cols = columns_for(kind);
    let now = Utc::now();
    println!("{}", render_header(&cols));
    for (i, r) in rows.iter().enumerate() {
        let mut line = render_row(&cols, r, now);
        if let Some(row) = metrics.and_then(|m| m.get(i)) {
            for m in row {
                let v = m.value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
                line.push_str(&format!("  {}={}", m.metric, v));
            }
        }
        println!("{line}");
    }
}

fn emit<T: Serialize>(output: Output, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    match output {
        Output::Human => human(value),
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

async fn run(cli: Cli, api: &dyn ConsoleApi, query: &DataSelectQuery) -> Result<()> {
    let ns = cli.namespace.as_deref();
    let out = cli.output;
    match cli.command {
        Commands::Events { resource, node, pods_selector } => {
            info!(ns = ?ns, resource = ?resource, node = ?node, "events invoked");
            let list = match (resource, node, pods_selector) {
                (Some(name), _, _) => api.resource_events(ns.unwrap_or("default"), &name, query).await?,
                (_, Some(node), _) => api.node_events(&node, query).await?,
                (_, _, Some(sel)) => api.pods_events(ns.unwrap_or("default"), &parse_selector(&sel)?, query).await?,
                _ => api.events(ns, query).await?,
            };
            emit(out, &list, |l| {
                print_table(ResourceKind::Event, &l.events, None);
                println!("({} total)", l.list_meta.total_items);
            })?;
        }
        Commands::Pods => {
            let list = api.pods(ns, query).await?;
            emit(out, &list, |l| print_table(ResourceKind::Pod, &l.pods, l.metrics.as_deref()))?;
        }
        Commands::Jobs => {
            let list = api.jobs(ns, query).await?;
            emit(out, &list, |l| print_table(ResourceKind::Job, &l.jobs, None))?;
        }
        Commands::Nodes => {
            let list = api.nodes(query).await?;
            emit(out, &list, |l| print_table(ResourceKind::Node, &l.nodes, None))?;
        }
        Commands::Namespaces => {
            let list = api.namespaces(query).await?;
            emit(out, &list, |l| print_table(ResourceKind::Namespace, &l.namespaces, None))?;
        }
        Commands::Job { name } => {
            let d = api.job_detail(ns.unwrap_or("default"), &name).await?;
            emit(out, &d, |d| {
                let p = &d.pod_info;
                println!("Job {}/{}", d.object_meta.namespace.as_deref().unwrap_or("-"), d.object_meta.name);
                println!("Images: {}", d.container_images.join(", "));
                println!(
                    "Pods: {} current / {} desired ({} running, {} pending, {} failed, {} succeeded)",
                    p.current, p.desired, p.running, p.pending, p.failed, p.succeeded
                );
                for w in &p.warnings {
                    println!("Warning: {} {}: {}", w.object_meta.name, w.reason, w.message);
                }
                println!();
                print_table(ResourceKind::Pod, &d.pod_list.pods, None);
                println!();
                print_table(ResourceKind::Event, &d.event_list.events, None);
            })?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let query = DataSelectQuery::try_from(cli.query.to_raw()?)?;
    let source = KubeSource::try_default().await?;
    let api = InProcApi::new(Arc::new(source));
    if let Err(e) = run(cli, &api, &query).await {
        error!(error = ?e, "command failed");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_flags_map_onto_raw_query() {
        let cli = Cli::parse_from([
            "dashctl", "pods", "--filter", "status=Running", "--sort", "-restarts", "--sort", "+name", "--page", "1", "--page-size", "20", "--metric", "cpu",
        ]);
        let raw = cli.query.to_raw().unwrap();
        assert_eq!(raw.filter_by, vec!["status,Running"]);
        assert_eq!(raw.sort_by, vec!["d,restarts", "a,name"]);
        assert_eq!((raw.page, raw.items_per_page), (Some(1), Some(20)));
        assert!(DataSelectQuery::try_from(raw).is_ok());
    }

    #[test]
    fn bad_filter_flag_is_rejected() {
        let q = QueryArgs { filter: vec!["status".into()], ..QueryArgs::default() };
        assert!(q.to_raw().is_err());
    }

    #[test]
    fn selector_parsing() {
        let sel = parse_selector("app=web, tier=front").unwrap();
        assert_eq!(sel.get("tier").map(String::as_str), Some("front"));
        assert!(parse_selector("app").is_err());
    }

    #[test]
    fn events_flags_conflict() {
        assert!(Cli::try_parse_from(["dashctl", "events", "--resource", "a", "--node", "b"]).is_err());
    }
}
