//! Events: property accessor, view model, severity inference and the pod join.

use std::fmt;

use chrono::{DateTime, Utc};
use dash_core::{ComparableValue, DataCell, PropertyName, ResourceKind};
use dash_select::{generic_data_select, join_by_identity, DataSelectQuery, ListMeta};
use k8s_openapi::api::core::v1::{Event, Pod};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{count, meta_property, text, time, ObjectMeta, TypeMeta};

/// Reason substrings that mark an event as a warning, lowercased.
pub const DEFAULT_WARNING_REASONS: &[&str] =
    &["failed", "err", "exceeded", "invalid", "unhealthy", "mismatch", "insufficient", "conflict", "outof", "nil", "backoff"];

/// Ordered, case-insensitive reason patterns used for type inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningReasons(Vec<String>);

impl Default for WarningReasons {
    fn default() -> Self { Self::new(DEFAULT_WARNING_REASONS.iter().copied()) }
}

impl WarningReasons {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(patterns.into_iter().map(|p| p.as_ref().trim().to_lowercase()).filter(|p| !p.is_empty()).collect())
    }

    /// `DASH_WARNING_REASONS` (comma-separated) or the defaults.
    pub fn from_env() -> Self {
        match std::env::var("DASH_WARNING_REASONS") {
            Ok(s) if !s.trim().is_empty() => Self::new(s.split(',')),
            _ => Self::default(),
        }
    }

    pub fn patterns(&self) -> &[String] { &self.0 }

    pub fn is_warning(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        self.0.iter().any(|p| reason.contains(p.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self { EventType::Normal => "Normal", EventType::Warning => "Warning" }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

pub fn classify(reason: &str, reasons: &WarningReasons) -> EventType {
    if reasons.is_warning(reason) { EventType::Warning } else { EventType::Normal }
}

fn has_type(e: &Event) -> bool { e.type_.as_deref().map_or(false, |t| !t.is_empty()) }

/// Infer `type` from `reason` for events that lack one. Explicit types are kept.
pub fn fill_events_type(events: &mut [Event], reasons: &WarningReasons) {
    for e in events.iter_mut().filter(|e| !has_type(e)) {
        let t = classify(e.reason.as_deref().unwrap_or_default(), reasons);
        e.type_ = Some(t.as_str().to_string());
    }
}

/// True when every event carries a type. Empty input reports false.
pub fn is_type_filled(events: &[Event]) -> bool { !events.is_empty() && events.iter().all(has_type) }

/// Events whose involved object is one of `pods`, by uid.
pub fn filter_events_by_pods_uid(events: Vec<Event>, pods: &[Pod]) -> Vec<Event> {
    join_by_identity(events, pods, |e| e.involved_object.uid.as_deref(), |p| p.metadata.uid.as_deref())
}

pub struct EventCell<'a>(pub &'a Event);

impl DataCell for EventCell<'_> {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        let e = self.0;
        match name {
            PropertyName::Name | PropertyName::Namespace | PropertyName::CreationTimestamp => meta_property(&e.metadata, name),
            PropertyName::Type => text(e.type_.as_deref()),
            PropertyName::Reason => text(e.reason.as_deref()),
            PropertyName::Message => text(e.message.as_deref()),
            PropertyName::Count => e.count.map(|c| count(c.into())),
            PropertyName::FirstSeen => time(e.first_timestamp.as_ref()),
            PropertyName::LastSeen => time(e.last_timestamp.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub message: String,
    pub source_component: String,
    pub source_host: String,
    pub sub_object: String,
    pub count: i32,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub reason: String,
    #[serde(rename = "type")]
    pub type_: String,
}

impl From<&Event> for EventView {
    fn from(e: &Event) -> Self {
        let source = e.source.as_ref();
        Self {
            object_meta: ObjectMeta::from(&e.metadata),
            type_meta: TypeMeta::new(ResourceKind::Event),
            message: e.message.clone().unwrap_or_default(),
            source_component: source.and_then(|s| s.component.clone()).unwrap_or_default(),
            source_host: source.and_then(|s| s.host.clone()).unwrap_or_default(),
            sub_object: e.involved_object.field_path.clone().unwrap_or_default(),
            count: e.count.unwrap_or_default(),
            first_seen: e.first_timestamp.as_ref().map(|t| t.0),
            last_seen: e.last_timestamp.as_ref().map(|t| t.0),
            reason: e.reason.clone().unwrap_or_default(),
            type_: e.type_.clone().unwrap_or_default(),
        }
    }
}

impl DataCell for EventView {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Type => text(Some(&self.type_)),
            PropertyName::Reason => text(Some(&self.reason)),
            PropertyName::Message => text(Some(&self.message)),
            PropertyName::Count => Some(count(self.count.into())),
            PropertyName::FirstSeen => self.first_seen.map(ComparableValue::Timestamp),
            PropertyName::LastSeen => self.last_seen.map(ComparableValue::Timestamp),
            other => self.object_meta.property(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    pub list_meta: ListMeta,
    pub events: Vec<EventView>,
}

/// Run the select pipeline over `events`, inferring types first so `type` filters work.
pub fn create_event_list(mut events: Vec<Event>, query: &DataSelectQuery, reasons: &WarningReasons) -> EventList {
    if !is_type_filled(&events) {
        debug!(events = events.len(), "events: inferring missing types");
        fill_events_type(&mut events, reasons);
    }
    let cells: Vec<EventCell<'_>> = events.iter().map(EventCell).collect();
    let sel = generic_data_select(cells, query);
    EventList { list_meta: sel.list_meta, events: sel.items.into_iter().map(|c| EventView::from(c.0)).collect() }
}

/// Warning-typed events of `pods`, in input order.
pub fn pod_warnings(events: Vec<Event>, pods: &[Pod], reasons: &WarningReasons) -> Vec<EventView> {
    let mut joined = filter_events_by_pods_uid(events, pods);
    if !is_type_filled(&joined) {
        fill_events_type(&mut joined, reasons);
    }
    joined.iter().filter(|e| e.type_.as_deref() == Some(EventType::Warning.as_str())).map(EventView::from).collect()
}
