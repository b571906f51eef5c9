//! Built-in table columns per resource kind.
//!
//! Columns read their values through [`DataCell`], so any kind with an
//! accessor can be rendered without a dedicated formatter.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};

use crate::{ComparableValue, DataCell, PropertyName, ResourceKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Namespace,
    Name,
    Age,
    Property(PropertyName),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub kind: ColumnKind,
    pub label: &'static str,
    pub width: usize,
}

fn col(kind: ColumnKind, label: &'static str, width: usize) -> ColumnSpec {
    ColumnSpec { kind, label, width }
}

fn prop(p: PropertyName, label: &'static str, width: usize) -> ColumnSpec {
    col(ColumnKind::Property(p), label, width)
}

/// Full column set for a kind, including Namespace/Name/Age.
pub fn columns_for(kind: ResourceKind) -> Vec<ColumnSpec> {
    let mut cols: Vec<ColumnSpec> = Vec::new();
    if kind.namespaced() {
        cols.push(col(ColumnKind::Namespace, "NAMESPACE", 16));
    }
    cols.push(col(ColumnKind::Name, "NAME", 32));

    match kind {
        ResourceKind::Event => {
            cols.push(prop(PropertyName::Type, "TYPE", 8));
            cols.push(prop(PropertyName::Reason, "REASON", 20));
            cols.push(prop(PropertyName::Count, "COUNT", 6));
            cols.push(prop(PropertyName::Message, "MESSAGE", 48));
        }
        ResourceKind::Pod => {
            cols.push(prop(PropertyName::Status, "STATUS", 10));
            cols.push(prop(PropertyName::Restarts, "RESTARTS", 8));
            cols.push(prop(PropertyName::NodeName, "NODE", 20));
        }
        ResourceKind::Job => {
            cols.push(prop(PropertyName::Completions, "SUCCEEDED", 9));
            cols.push(prop(PropertyName::Status, "STATUS", 10));
        }
        ResourceKind::Node => {
            // cluster-scoped: Name, Status, CPU, Memory, Age
            cols.push(prop(PropertyName::Status, "STATUS", 10));
            cols.push(prop(PropertyName::CpuCapacity, "CPU", 6));
            cols.push(prop(PropertyName::MemoryCapacity, "MEMORY", 12));
        }
        ResourceKind::Namespace => {
            cols.push(prop(PropertyName::Status, "STATUS", 10));
        }
    }

    cols.push(col(ColumnKind::Age, "AGE", 8));
    cols
}

impl ColumnSpec {
    /// Render one cell; unsupported properties render as "-".
    pub fn render(&self, cell: &dyn DataCell, now: DateTime<Utc>) -> String {
        let value = match &self.kind {
            ColumnKind::Namespace => cell.property(PropertyName::Namespace),
            ColumnKind::Name => cell.property(PropertyName::Name),
            ColumnKind::Property(p) => cell.property(*p),
            ColumnKind::Age => {
                return match cell.property(PropertyName::CreationTimestamp) {
                    Some(ComparableValue::Timestamp(t)) => render_age(t, now),
                    _ => "-".to_string(),
                };
            }
        };
        match value {
            Some(v) => {
                let s = v.to_string();
                if s.is_empty() { "-".to_string() } else { s }
            }
            None => "-".to_string(),
        }
    }
}

/// Render a row as fixed-width columns (last column unpadded).
pub fn render_row(cols: &[ColumnSpec], cell: &dyn DataCell, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for (i, c) in cols.iter().enumerate() {
        let v = c.render(cell, now);
        if i + 1 == cols.len() { out.push_str(&v); } else { out.push_str(&format!("{:<w$} ", v, w = c.width)); }
    }
    out
}

pub fn render_header(cols: &[ColumnSpec]) -> String {
    let mut out = String::new();
    for (i, c) in cols.iter().enumerate() {
        if i + 1 == cols.len() { out.push_str(c.label); } else { out.push_str(&format!("{:<w$} ", c.label, w = c.width)); }
    }
    out
}

pub fn render_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut secs = (now - created).num_seconds().max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}
