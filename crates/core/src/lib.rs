//! Dash core types shared by every resource kind.
//!
//! A record kind takes part in the data-select pipeline by implementing
//! [`DataCell`]: a fixed table from [`PropertyName`] to [`ComparableValue`].

#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod columns;
pub mod quantity;
mod value;

pub use quantity::{Quantity, QuantityError};
pub use value::{ComparableValue, ValueError};

pub mod prelude {
    pub use super::{ComparableValue, DataCell, PropertyName, Quantity, ResourceKind, ValueKind};
}

/// Kind-agnostic property identifiers. Wire names are camelCase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyName {
    Name,
    Namespace,
    CreationTimestamp,
    Type,
    Reason,
    Message,
    Status,
    NodeName,
    Restarts,
    Count,
    FirstSeen,
    LastSeen,
    Completions,
    CpuCapacity,
    MemoryCapacity,
}

impl PropertyName {
    pub const ALL: [PropertyName; 15] = [
        PropertyName::Name,
        PropertyName::Namespace,
        PropertyName::CreationTimestamp,
        PropertyName::Type,
        PropertyName::Reason,
        PropertyName::Message,
        PropertyName::Status,
        PropertyName::NodeName,
        PropertyName::Restarts,
        PropertyName::Count,
        PropertyName::FirstSeen,
        PropertyName::LastSeen,
        PropertyName::Completions,
        PropertyName::CpuCapacity,
        PropertyName::MemoryCapacity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyName::Name => "name",
            PropertyName::Namespace => "namespace",
            PropertyName::CreationTimestamp => "creationTimestamp",
            PropertyName::Type => "type",
            PropertyName::Reason => "reason",
            PropertyName::Message => "message",
            PropertyName::Status => "status",
            PropertyName::NodeName => "nodeName",
            PropertyName::Restarts => "restarts",
            PropertyName::Count => "count",
            PropertyName::FirstSeen => "firstSeen",
            PropertyName::LastSeen => "lastSeen",
            PropertyName::Completions => "completions",
            PropertyName::CpuCapacity => "cpuCapacity",
            PropertyName::MemoryCapacity => "memoryCapacity",
        }
    }

    /// The tag every accessor must use when returning this property.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            PropertyName::CreationTimestamp | PropertyName::FirstSeen | PropertyName::LastSeen => ValueKind::Timestamp,
            PropertyName::Restarts
            | PropertyName::Count
            | PropertyName::Completions
            | PropertyName::CpuCapacity
            | PropertyName::MemoryCapacity => ValueKind::Quantity,
            _ => ValueKind::String,
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown property: {0}")]
pub struct UnknownProperty(pub String);

impl FromStr for PropertyName {
    type Err = UnknownProperty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        PropertyName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProperty(s.to_string()))
    }
}

/// Tag of a [`ComparableValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    String,
    Timestamp,
    Quantity,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::String => f.write_str("string"),
            ValueKind::Timestamp => f.write_str("timestamp"),
            ValueKind::Quantity => f.write_str("quantity"),
        }
    }
}

/// Resource kinds the console knows how to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Event,
    Pod,
    Job,
    Node,
    Namespace,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Event => "event",
            ResourceKind::Pod => "pod",
            ResourceKind::Job => "job",
            ResourceKind::Node => "node",
            ResourceKind::Namespace => "namespace",
        }
    }

    pub fn namespaced(&self) -> bool {
        matches!(self, ResourceKind::Event | ResourceKind::Pod | ResourceKind::Job)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Property accessor over one record.
///
/// Returning `None` means the kind does not carry `name`; the pipeline treats
/// that as "never matches a filter" and "sorts last", never as an error.
pub trait DataCell {
    fn property(&self, name: PropertyName) -> Option<ComparableValue>;
}

impl<T: DataCell + ?Sized> DataCell for &T {
    fn property(&self, name: PropertyName) -> Option<ComparableValue> { (**self).property(name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_names_round_trip_through_wire_names() {
        for p in PropertyName::ALL {
            assert_eq!(p.as_str().parse::<PropertyName>().unwrap(), p);
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
        }
    }

    #[test]
    fn property_parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("CreationTimestamp".parse::<PropertyName>().unwrap(), PropertyName::CreationTimestamp);
        assert_eq!("bogus".parse::<PropertyName>(), Err(UnknownProperty("bogus".into())));
    }

    #[test]
    fn declared_kinds() {
        assert_eq!(PropertyName::LastSeen.value_kind(), ValueKind::Timestamp);
        assert_eq!(PropertyName::MemoryCapacity.value_kind(), ValueKind::Quantity);
        assert_eq!(PropertyName::Reason.value_kind(), ValueKind::String);
    }
}
