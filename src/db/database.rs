//! The store instance: a registry of named graphs.

use crate::db::config::Config;
use crate::db::graph::Graph;
use crate::db::session::Session;
use crate::error::{GraphError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// A store instance owning any number of named graphs. Graph names are
/// unique per instance.
#[derive(Default)]
pub struct Database {
    graphs: DashMap<String, Arc<Graph>>,
    config: Config,
}

impl Database {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            graphs: DashMap::new(),
            config,
        }
    }

    /// Creates a graph. Fails if a graph with this name already exists.
    pub fn create_graph(&self, name: &str) -> Result<Arc<Graph>> {
        match self.graphs.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GraphError::InvalidArgument(
                format!("graph '{name}' already exists"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let graph = Arc::new(Graph::new(name, &self.config));
                slot.insert(graph.clone());
                info!(graph = name, "graph created");
                Ok(graph)
            }
        }
    }

    /// Resolves an existing graph by name.
    pub fn load_graph(&self, name: &str) -> Result<Arc<Graph>> {
        self.graphs
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| GraphError::NotFound(format!("Graph '{name}'")))
    }

    pub fn list_graphs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.graphs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Opens a session on an existing graph, positioned on main.
    pub fn session(&self, graph: &str) -> Result<Session> {
        Ok(Session::new(self.load_graph(graph)?))
    }
}
