//! Sessions: per-client cursor over one graph.
//!
//! A session holds the active context its operations are routed to, either
//! main's head or a specific open change. Checking out a change affects
//! only this session; other sessions on the same graph are untouched.

use crate::db::change::ChangeState;
use crate::db::graph::{Context, Graph};
use crate::db::history::HistoryEntry;
use crate::error::{GraphError, Result};
use crate::model::{
    ChangeId, CommitHash, Edge, EdgeId, EdgeTypeId, LabelId, Node, NodeId, PropertyTypeId,
    PropertyValue, ValueType,
};
use std::sync::Arc;

pub struct Session {
    graph: Arc<Graph>,
    ctx: Context,
}

impl Session {
    pub(crate) fn new(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            ctx: Context::Main,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn context(&self) -> Context {
        self.ctx
    }

    /// Forks a new change from main's current head and checks it out.
    pub fn new_change(&mut self) -> ChangeId {
        let id = self.graph.new_change();
        self.ctx = Context::Change(id);
        id
    }

    /// Routes subsequent operations to main's head snapshot.
    pub fn checkout_main(&mut self) {
        self.ctx = Context::Main;
    }

    /// Routes subsequent operations to an existing change.
    pub fn checkout(&mut self, change: ChangeId) -> Result<()> {
        if !self.graph.has_change(change) {
            return Err(GraphError::NotFound(format!("Change {change}")));
        }
        self.ctx = Context::Change(change);
        Ok(())
    }

    fn current_change(&self) -> Result<ChangeId> {
        match self.ctx {
            Context::Change(id) => Ok(id),
            Context::Main => Err(GraphError::InvalidState(
                "no change checked out; operation requires a change context".into(),
            )),
        }
    }

    // Mutation and reads, routed to the active context --------------------

    pub fn create_node(
        &self,
        labels: &[&str],
        properties: &[(&str, PropertyValue)],
    ) -> Result<NodeId> {
        self.graph.create_node(self.ctx, labels, properties)
    }

    pub fn create_edge(
        &self,
        type_name: &str,
        source: NodeId,
        target: NodeId,
        properties: &[(&str, PropertyValue)],
    ) -> Result<EdgeId> {
        self.graph
            .create_edge(self.ctx, type_name, source, target, properties)
    }

    pub fn delete_nodes(&self, ids: &[NodeId]) -> Result<()> {
        self.graph.delete_nodes(self.ctx, ids)
    }

    pub fn delete_edges(&self, ids: &[EdgeId]) -> Result<()> {
        self.graph.delete_edges(self.ctx, ids)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        self.graph.get_node(self.ctx, id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Option<Edge>> {
        self.graph.get_edge(self.ctx, id)
    }

    pub fn node_count(&self) -> Result<usize> {
        self.graph.node_count(self.ctx)
    }

    pub fn edge_count(&self) -> Result<usize> {
        self.graph.edge_count(self.ctx)
    }

    // Change lifecycle ----------------------------------------------------

    /// Seals the checked-out change's pending mutations into a local commit.
    pub fn commit(&self) -> Result<Option<CommitHash>> {
        self.graph.commit(self.current_change()?)
    }

    /// Submits the checked-out change. On acceptance the session moves back
    /// to main; on rejection it stays on the (now terminal) change so the
    /// diagnostic can be inspected.
    pub fn submit(&mut self) -> Result<CommitHash> {
        let id = self.current_change()?;
        let hash = self.graph.submit(id)?;
        self.ctx = Context::Main;
        Ok(hash)
    }

    pub fn change_state(&self, id: ChangeId) -> Result<ChangeState> {
        self.graph.change_state(id)
    }

    pub fn rejection(&self, id: ChangeId) -> Result<Option<String>> {
        self.graph.rejection(id)
    }

    pub fn list_changes(&self) -> Vec<(ChangeId, ChangeState)> {
        self.graph.list_changes()
    }

    pub fn delete_change(&mut self, id: ChangeId) -> Result<()> {
        self.graph.delete_change(id)?;
        if self.ctx == Context::Change(id) {
            self.ctx = Context::Main;
        }
        Ok(())
    }

    // Metadata ------------------------------------------------------------

    pub fn labels(&self) -> Vec<(LabelId, String)> {
        self.graph.labels()
    }

    pub fn edge_types(&self) -> Vec<(EdgeTypeId, String)> {
        self.graph.edge_types()
    }

    pub fn property_types(&self) -> Vec<(PropertyTypeId, String, ValueType)> {
        self.graph.property_types()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.graph.history()
    }
}
