//! Per-graph schema registry.
//!
//! Labels, edge types, and property types are interned into fixed-size
//! identifier spaces. Interning an already-registered name returns the
//! existing identifier; allocation is monotonic and identifiers are never
//! reclaimed. Allocating past a space's capacity fails with a capacity
//! diagnostic citing the identifier that would have been created, which
//! equals the capacity itself.
//!
//! Allocation is staged through a [`SchemaBatch`]: names resolve against the
//! registry plus the batch's pending entries, and nothing is published until
//! the batch is applied. A submission that fails validation partway through
//! therefore leaves the registry untouched.

use crate::db::config::Config;
use crate::error::{GraphError, Result};
use crate::model::{EdgeTypeId, LabelId, PropertyTypeId, ValueType};
use rustc_hash::FxHashMap;

#[derive(Debug)]
struct IdSpace {
    /// Identifier kind as it appears in capacity diagnostics, e.g. "LabelID".
    id_kind: &'static str,
    /// Space name as it appears in capacity diagnostics, e.g. "label".
    space: &'static str,
    capacity: usize,
    names: Vec<String>,
    index: FxHashMap<String, u16>,
}

impl IdSpace {
    fn new(id_kind: &'static str, space: &'static str, capacity: usize) -> Self {
        Self {
            id_kind,
            space,
            // Identifiers are u16; a larger configured capacity could not be
            // addressed and would alias on truncation.
            capacity: capacity.min(1 << 16),
            names: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Resolves `name` against the registered names plus `pending`, staging
    /// it into `pending` when new.
    fn resolve(&self, pending: &mut Vec<String>, name: &str) -> Result<u16> {
        if let Some(&id) = self.index.get(name) {
            return Ok(id);
        }
        if let Some(pos) = pending.iter().position(|p| p == name) {
            return Ok((self.names.len() + pos) as u16);
        }
        let id = self.names.len() + pending.len();
        if id >= self.capacity {
            return Err(GraphError::Capacity(format!(
                "Attempted to create {} {}, which exceeds graph {} capacity.",
                self.id_kind, id, self.space
            )));
        }
        pending.push(name.to_string());
        Ok(id as u16)
    }

    /// Publishes a name staged by [`IdSpace::resolve`].
    fn insert(&mut self, name: String) {
        let id = self.names.len() as u16;
        self.index.insert(name.clone(), id);
        self.names.push(name);
    }

    fn name(&self, id: u16) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    fn listing(&self) -> Vec<(u16, String)> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u16, name.clone()))
            .collect()
    }
}

/// Pending schema allocations for one submission. Built against a registry's
/// current state and published atomically with [`SchemaRegistry::apply_batch`].
#[derive(Default)]
pub(crate) struct SchemaBatch {
    new_labels: Vec<String>,
    new_edge_types: Vec<String>,
    new_property_types: Vec<String>,
    /// Value type per entry of `new_property_types`, first use wins.
    new_property_value_types: Vec<ValueType>,
}

/// Owns the Label, EdgeType, and PropertyType identifier spaces for one graph.
#[derive(Debug)]
pub(crate) struct SchemaRegistry {
    labels: IdSpace,
    edge_types: IdSpace,
    property_types: IdSpace,
    /// Value type recorded at first intern of each property type.
    property_value_types: Vec<ValueType>,
}

impl SchemaRegistry {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            labels: IdSpace::new("LabelID", "label", config.label_capacity),
            edge_types: IdSpace::new("EdgeTypeID", "edge type", config.edge_type_capacity),
            property_types: IdSpace::new(
                "PropertyTypeID",
                "property type",
                config.property_type_capacity,
            ),
            property_value_types: Vec::new(),
        }
    }

    pub(crate) fn begin_batch(&self) -> SchemaBatch {
        SchemaBatch::default()
    }

    pub(crate) fn resolve_label(&self, batch: &mut SchemaBatch, name: &str) -> Result<LabelId> {
        self.labels.resolve(&mut batch.new_labels, name)
    }

    pub(crate) fn resolve_edge_type(
        &self,
        batch: &mut SchemaBatch,
        name: &str,
    ) -> Result<EdgeTypeId> {
        self.edge_types.resolve(&mut batch.new_edge_types, name)
    }

    /// Resolves a property type, staging its value type on first use.
    /// An existing or already-staged name keeps the value type recorded
    /// first.
    pub(crate) fn resolve_property_type(
        &self,
        batch: &mut SchemaBatch,
        name: &str,
        value_type: ValueType,
    ) -> Result<PropertyTypeId> {
        let staged = batch.new_property_types.len();
        let id = self
            .property_types
            .resolve(&mut batch.new_property_types, name)?;
        if batch.new_property_types.len() > staged {
            batch.new_property_value_types.push(value_type);
        }
        Ok(id)
    }

    /// Publishes a validated batch. The batch must have been built against
    /// this registry's current state.
    pub(crate) fn apply_batch(&mut self, batch: SchemaBatch) {
        for name in batch.new_labels {
            self.labels.insert(name);
        }
        for name in batch.new_edge_types {
            self.edge_types.insert(name);
        }
        for (name, value_type) in batch
            .new_property_types
            .into_iter()
            .zip(batch.new_property_value_types)
        {
            self.property_types.insert(name);
            self.property_value_types.push(value_type);
        }
    }

    pub(crate) fn label_name(&self, id: LabelId) -> Option<&str> {
        self.labels.name(id)
    }

    pub(crate) fn edge_type_name(&self, id: EdgeTypeId) -> Option<&str> {
        self.edge_types.name(id)
    }

    pub(crate) fn property_type_name(&self, id: PropertyTypeId) -> Option<&str> {
        self.property_types.name(id)
    }

    pub(crate) fn labels(&self) -> Vec<(LabelId, String)> {
        self.labels.listing()
    }

    pub(crate) fn edge_types(&self) -> Vec<(EdgeTypeId, String)> {
        self.edge_types.listing()
    }

    pub(crate) fn property_types(&self) -> Vec<(PropertyTypeId, String, ValueType)> {
        self.property_types
            .listing()
            .into_iter()
            .map(|(id, name)| (id, name, self.property_value_types[id as usize]))
            .collect()
    }
}
