// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity types for the dataflow graph: nodes, edges, and the graph itself.

crate::define_id! {
    /// Identifies a node in a dataflow graph.
    pub struct NodeId("node");
}

crate::define_id! {
    /// Identifies a directed edge between two nodes.
    pub struct EdgeId("edge");
}

crate::define_id! {
    /// Identifies a dataflow graph.
    pub struct GraphId("grph");
}

/// Index of an outbound port on a node. Ports are numbered `0..num_ports`.
pub type PortIndex = usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_across_kinds() {
        let node = NodeId::new();
        let edge = EdgeId::new();
        let graph = GraphId::new();
        assert!(node.as_str().starts_with(NodeId::PREFIX));
        assert!(edge.as_str().starts_with(EdgeId::PREFIX));
        assert!(graph.as_str().starts_with(GraphId::PREFIX));
    }
}
