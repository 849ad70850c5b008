//! Store configuration.

/// Configuration options for a graph's fixed-size schema identifier spaces.
///
/// Each graph interns label, edge-type, and property-type names into
/// per-kind identifier spaces with a fixed capacity. Identifiers are
/// allocated on first use and never reclaimed; exhausting a space fails
/// with [`crate::GraphError::Capacity`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of distinct labels per graph.
    pub label_capacity: usize,
    /// Maximum number of distinct edge types per graph.
    pub edge_type_capacity: usize,
    /// Maximum number of distinct property types per graph.
    pub property_type_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_capacity: 256,
            edge_type_capacity: 256,
            property_type_capacity: 256,
        }
    }
}
