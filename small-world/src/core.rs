//! Node/item arena: the id-indexed storage the rest of the engine operates over, plus the
//! tunable parameters and the connect/disconnect primitives that keep adjacency symmetric.
//!
//! Nodes and items live in parallel, densely indexed `Vec`s; ids are arena offsets, never object
//! references. A node can be tombstoned and its id handed back out to a later insert via a free
//! list, so the arena never grows without bound under a steady mix of inserts and removes.

use crate::costs::TravelingCosts;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::select::NeighborSelector;
use crate::types::{Candidate, NodeId};

/// Validated, immutable-after-construction tuning parameters.
#[derive(Clone, Debug)]
pub struct Params {
    /// Max out-neighbors per node on layers above 0; layer 0 allows `2 * m`.
    pub m: usize,
    /// `efConstruction`: beam width used while wiring a new node's connections.
    pub ef_construction: usize,
    /// Lower bound on the `ef` used for a `k`-NN search (`max(k, min_nn)`).
    pub min_nn: usize,
    /// Which SELECT-NEIGHBORS variant to run when shrinking an over-full connection list.
    pub selector: NeighborSelector,
    /// Arena capacity hint, reserved up front to avoid reallocation during the first batch.
    pub initial_items_size: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            m: 10,
            ef_construction: 200,
            min_nn: 0,
            selector: NeighborSelector::Simple,
            initial_items_size: 1024,
        }
    }
}

impl Params {
    /// Layer-assignment decay, `1 / ln(M)`, used by the layer-sampling formula in
    /// [`crate::engine::sample_layer`].
    pub fn level_lambda(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    /// `GetM(layer)`: `2M` at layer 0, `M` everywhere else.
    pub fn m_for_layer(&self, layer: usize) -> usize {
        if layer == 0 {
            2 * self.m
        } else {
            self.m
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.m < 2 {
            return Err(Error::InvalidParameters(format!(
                "m must be >= 2, got {}",
                self.m
            )));
        }
        if self.ef_construction < 1 {
            return Err(Error::InvalidParameters(format!(
                "ef_construction must be >= 1, got {}",
                self.ef_construction
            )));
        }
        Ok(())
    }
}

/// The id-addressed node/item arena plus the live graph's entry point and version counter.
///
/// `items[id]` is `None` for a tombstoned id whose slot has not yet been reused, and briefly
/// `None` for a slot that has been allocated but not yet populated mid-insert (invariant 6).
#[derive(Debug)]
pub struct Core<T> {
    nodes: Vec<Node>,
    items: Vec<Option<T>>,
    /// Stack of tombstoned ids available for reuse, most-recently-removed on top.
    free_list: Vec<NodeId>,
    entry_point: Option<NodeId>,
    version: u64,
    pub params: Params,
}

impl<T> Core<T> {
    pub fn new(params: Params) -> Self {
        let cap = params.initial_items_size;
        Self {
            nodes: Vec::with_capacity(cap),
            items: Vec::with_capacity(cap),
            free_list: Vec::new(),
            entry_point: None,
            version: 0,
            params,
        }
    }

    /// Reconstruct a `Core` from the pieces decoded by [`crate::facade`]'s deserializer.
    /// `nodes`/`items` must be the same length; positions with no corresponding `WireNode` are
    /// pushed onto `free_list` so they remain reusable.
    pub(crate) fn from_parts(
        params: Params,
        nodes: Vec<Node>,
        items: Vec<Option<T>>,
        free_list: Vec<NodeId>,
        entry_point: Option<NodeId>,
    ) -> Self {
        Self {
            nodes,
            items,
            free_list,
            entry_point,
            version: 0,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Increment and return the new version. Called once per structural edit, strictly before
    /// that edit becomes visible, so a concurrent reader that captured the prior version will
    /// observe a mismatch and retry.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[usize::from(id)]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[usize::from(id)]
    }

    pub fn item(&self, id: NodeId) -> Option<&T> {
        self.items.get(usize::from(id)).and_then(Option::as_ref)
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        usize::from(id) < self.nodes.len() && self.item(id).is_some()
    }

    /// Allocate a slot for a new node at `top_layer`, reusing a tombstoned id when available.
    /// The returned id's item slot is populated immediately; the node has no edges yet.
    pub fn allocate(&mut self, top_layer: usize, item: T) -> NodeId {
        let node = Node::new(top_layer);
        if let Some(id) = self.free_list.pop() {
            self.nodes[usize::from(id)] = node;
            self.items[usize::from(id)] = Some(item);
            id
        } else {
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(node);
            self.items.push(Some(item));
            id
        }
    }

    /// Undo a just-allocated slot that failed to wire up: if it was the
    /// most recently appended id, truncate the arena; if it was reused from `free_list`, hand
    /// it back. Must be called immediately after the failed `allocate`, before any other
    /// allocation, so "most recently appended" unambiguously identifies the freshly-pushed case.
    pub fn rollback_allocation(&mut self, id: NodeId) {
        let idx = usize::from(id);
        if idx + 1 == self.nodes.len() {
            self.nodes.truncate(idx);
            self.items.truncate(idx);
        } else {
            self.items[idx] = None;
            self.free_list.push(id);
        }
    }

    pub fn set_entry_point(&mut self, id: Option<NodeId>) {
        self.entry_point = id;
    }

    /// Tombstone `id`: clear its adjacency, drop its item, and make the id reusable. Does not
    /// touch any other node's adjacency; callers (`GraphEngine::remove`) are responsible for
    /// disconnecting peers first.
    pub fn tombstone(&mut self, id: NodeId) {
        let idx = usize::from(id);
        self.nodes[idx] = Node::new(0);
        self.items[idx] = None;
        self.free_list.push(id);
    }

    pub fn removed_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.free_list.iter().copied()
    }

    /// Live node ids in arena order, for iteration (serialize, self-recall tests, etc).
    pub fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(|&id| self.is_live(id))
    }

    /// Bidirectionally connect `a` and `b` at `layer`, shrinking `a`'s (then `b`'s) connection
    /// list back to `m_for_layer(layer)` via the configured [`NeighborSelector`] whenever the
    /// append pushes it over the limit. Mirrors any resulting removals into the evicted peer's
    /// `in_connections` and into `a`/`b`'s own `in_connections` for the survivors.
    ///
    /// Requires `T: Clone` so the shrink pass can pull an owned copy of the pinned item out of
    /// the arena before calling back into `self` for neighbor lookups; real items (dense
    /// vectors) are cheaply `Clone` in practice.
    pub fn connect<D, F>(&mut self, a: NodeId, b: NodeId, layer: usize, distance_fn: &F)
    where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        self.link_one_direction(a, b, layer, distance_fn);
        self.link_one_direction(b, a, layer, distance_fn);
        self.bump_version();
    }

    fn link_one_direction<D, F>(&mut self, from: NodeId, to: NodeId, layer: usize, distance_fn: &F)
    where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        self.node_mut(from).add_connection(layer, to);
        self.node_mut(to).add_in_connection(layer, from);

        let limit = self.params.m_for_layer(layer);
        if self.node(from).degree(layer) <= limit {
            return;
        }

        let Some(from_item) = self.item(from).cloned() else {
            return;
        };

        let neighbors: Vec<NodeId> = self.node(from).connections(layer).to_vec();
        let candidates: Vec<Candidate<D>> = neighbors
            .iter()
            .filter_map(|&id| self.item(id).map(|item| (id, item)))
            .map(|(id, item)| Candidate {
                distance: distance_fn(&from_item, item),
                id,
            })
            .collect();

        let costs = TravelingCosts::for_node(&from_item, from, distance_fn);
        let selector = self.params.selector;
        let selected = selector.select(
            limit,
            candidates,
            &costs,
            |id| self.node(id).connections(layer).to_vec(),
            |id| self.item(id).cloned(),
        );

        let kept: std::collections::HashSet<NodeId> = selected.iter().copied().collect();
        let dropped: Vec<NodeId> = neighbors.into_iter().filter(|n| !kept.contains(n)).collect();
        for dropped_id in &dropped {
            self.node_mut(from).remove_connection(layer, *dropped_id);
            self.node_mut(*dropped_id).remove_in_connection(layer, from);
        }
    }

    /// Remove the edge between `a` and `b` at `layer` on both sides, if present.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId, layer: usize) {
        if a.is_valid() && self.is_live(a) {
            self.node_mut(a).remove_connection(layer, b);
            self.node_mut(a).remove_in_connection(layer, b);
        }
        if b.is_valid() && self.is_live(b) {
            self.node_mut(b).remove_connection(layer, a);
            self.node_mut(b).remove_in_connection(layer, a);
        }
        self.bump_version();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &f32, b: &f32) -> crate::types::Distance<f32> {
        crate::types::Distance::from((a - b).abs())
    }

    #[test]
    fn allocate_reuses_tombstoned_ids() {
        let mut core = Core::new(Params::default());
        let a = core.allocate(0, 1.0f32);
        let b = core.allocate(0, 2.0f32);
        core.tombstone(a);
        let c = core.allocate(0, 3.0f32);
        assert_eq!(c, a);
        assert!(core.is_live(b));
        assert!(core.is_live(c));
        assert_eq!(core.len(), 2);
    }

    #[test]
    fn connect_is_symmetric() {
        let mut core = Core::new(Params::default());
        let a = core.allocate(0, 0.0f32);
        let b = core.allocate(0, 1.0f32);
        core.connect(a, b, 0, &distance);
        assert_eq!(core.node(a).connections(0), &[b]);
        assert_eq!(core.node(b).in_connections(0), &[a]);
        assert_eq!(core.node(b).connections(0), &[a]);
        assert_eq!(core.node(a).in_connections(0), &[b]);
    }

    #[test]
    fn connect_shrinks_when_over_the_layer_limit() {
        let mut params = Params::default();
        params.m = 2;
        let mut core = Core::new(params);
        let center = core.allocate(0, 0.0f32);
        let mut others = Vec::new();
        for v in [1.0, 2.0, 3.0, 10.0] {
            others.push(core.allocate(0, v));
        }
        for &other in &others {
            core.connect(center, other, 0, &distance);
        }
        assert!(core.node(center).degree(0) <= core.params.m_for_layer(0));
    }

    #[test]
    fn rollback_truncates_a_freshly_appended_slot() {
        let mut core = Core::new(Params::default());
        let a = core.allocate(0, 1.0f32);
        core.rollback_allocation(a);
        assert_eq!(core.capacity(), 0);
    }
}
