//! Core data model: identifiers, property values, and materialized
//! node/edge views.
//!
//! Node and edge identifiers are separate `u64` spaces per graph, allocated
//! monotonically from zero and never reused, even after deletion. Within an
//! open change, identifiers at or above the fork-time watermark are
//! provisional: they belong to the change's local space and are translated
//! into main's global space when the change is submitted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeId = u64;
pub type EdgeId = u64;
pub type ChangeId = u64;

/// Interned schema identifiers. Each kind has a fixed-size space per graph.
pub type LabelId = u16;
pub type EdgeTypeId = u16;
pub type PropertyTypeId = u16;

/// Commit identifier, assigned when a change seals its pending mutations.
pub type CommitHash = u64;

/// The value type of a property, as reported by the property-type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
}

/// A typed property value stored on a node or edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyValue::Bool(_) => ValueType::Bool,
            PropertyValue::Int(_) => ValueType::Int,
            PropertyValue::Float(_) => ValueType::Float,
            PropertyValue::String(_) => ValueType::String,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

/// A node materialized for reading, with label names and property names
/// resolved through the graph's schema registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

/// An edge materialized for reading. Edges are dependent entities: deleting
/// either endpoint tombstones the edge as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub type_name: String,
    pub source: NodeId,
    pub target: NodeId,
    pub properties: BTreeMap<String, PropertyValue>,
}
