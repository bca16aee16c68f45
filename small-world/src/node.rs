//! Per-node adjacency storage: forward connections plus symmetric back-links, one `Vec` per
//! layer the node participates in. Growable rather than fixed-stride, and tracks in-edges
//! alongside out-edges so deletion/repair never has to scan the whole arena for back-references.

use crate::types::NodeId;

/// A single node's per-layer adjacency. `connections[l]` holds the node's out-edges at layer
/// `l`; `in_connections[l]` holds the ids of nodes that point back at this one at layer `l`,
/// kept in lockstep so deletion/repair never has to scan the whole arena for back-references.
#[derive(Clone, Debug, Default)]
pub struct Node {
    connections: Vec<Vec<NodeId>>,
    in_connections: Vec<Vec<NodeId>>,
}

impl Node {
    /// A node that exists on layers `0..=top_layer`, with no edges yet.
    pub fn new(top_layer: usize) -> Self {
        let layers = top_layer + 1;
        Self {
            connections: vec![Vec::new(); layers],
            in_connections: vec![Vec::new(); layers],
        }
    }

    /// Reconstruct a node from already-materialized adjacency, used when decoding a serialized
    /// graph. `connections` and `in_connections` must be the same length.
    pub(crate) fn from_layers(connections: Vec<Vec<NodeId>>, in_connections: Vec<Vec<NodeId>>) -> Self {
        debug_assert_eq!(connections.len(), in_connections.len());
        Self {
            connections,
            in_connections,
        }
    }

    /// Highest layer this node participates in (layer 0 always exists).
    pub fn top_layer(&self) -> usize {
        self.connections.len() - 1
    }

    pub fn layer_count(&self) -> usize {
        self.connections.len()
    }

    pub fn has_layer(&self, layer: usize) -> bool {
        layer < self.connections.len()
    }

    pub fn connections(&self, layer: usize) -> &[NodeId] {
        self.connections.get(layer).map_or(&[], Vec::as_slice)
    }

    pub fn in_connections(&self, layer: usize) -> &[NodeId] {
        self.in_connections.get(layer).map_or(&[], Vec::as_slice)
    }

    pub fn degree(&self, layer: usize) -> usize {
        self.connections(layer).len()
    }

    /// Replace the full out-edge set at `layer`. Callers are responsible for updating the
    /// removed/added neighbors' `in_connections` to match (see `Node::add_in_connection` /
    /// `Node::remove_in_connection`), since a `Node` has no arena access of its own.
    pub fn set_connections(&mut self, layer: usize, neighbors: Vec<NodeId>) {
        self.connections[layer] = neighbors;
    }

    pub fn add_connection(&mut self, layer: usize, neighbor: NodeId) {
        let edges = &mut self.connections[layer];
        if !edges.contains(&neighbor) {
            edges.push(neighbor);
        }
    }

    pub fn remove_connection(&mut self, layer: usize, neighbor: NodeId) {
        self.connections[layer].retain(|&id| id != neighbor);
    }

    pub fn add_in_connection(&mut self, layer: usize, source: NodeId) {
        let edges = &mut self.in_connections[layer];
        if !edges.contains(&source) {
            edges.push(source);
        }
    }

    pub fn remove_in_connection(&mut self, layer: usize, source: NodeId) {
        self.in_connections[layer].retain(|&id| id != source);
    }

    /// All distinct neighbors across every layer, forward and back, used when a node is being
    /// removed and every link touching it must be repaired.
    pub fn all_neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.connections
            .iter()
            .chain(self.in_connections.iter())
            .flatten()
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_has_empty_layers() {
        let node = Node::new(2);
        assert_eq!(node.layer_count(), 3);
        assert_eq!(node.top_layer(), 2);
        assert!(node.connections(2).is_empty());
    }

    #[test]
    fn add_connection_is_idempotent() {
        let mut node = Node::new(0);
        node.add_connection(0, NodeId(1));
        node.add_connection(0, NodeId(1));
        assert_eq!(node.connections(0), &[NodeId(1)]);
    }

    #[test]
    fn remove_connection_drops_only_matching_id() {
        let mut node = Node::new(0);
        node.add_connection(0, NodeId(1));
        node.add_connection(0, NodeId(2));
        node.remove_connection(0, NodeId(1));
        assert_eq!(node.connections(0), &[NodeId(2)]);
    }

    #[test]
    fn in_connections_track_independently_of_out_edges() {
        let mut node = Node::new(0);
        node.add_in_connection(0, NodeId(9));
        assert_eq!(node.in_connections(0), &[NodeId(9)]);
        assert!(node.connections(0).is_empty());
    }
}
