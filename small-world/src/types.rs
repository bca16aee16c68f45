use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A stable identifier for a node in the graph, equal to its index into the arena.
///
/// Ids are reused: once a node is removed, its id is eligible for reassignment to a later
/// insert. Holders of an old id must not assume it still refers to the same item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel used internally by [`crate::costs::TravelingCosts`] for a destination that has
    /// no arena slot (the query point in a search). Must never be written into a node's
    /// `connections` or `in_connections` list.
    pub const INVALID: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for usize {
    fn from(value: NodeId) -> Self {
        value.0 as usize
    }
}

/// A `(node, distance-to-some-fixed-point)` pair with a deterministic tie-break on id.
///
/// `D` is the caller's distance type; wrapping it in [`OrderedFloat`]-style newtype semantics
/// is the caller's job when `D` is a float (see [`crate::core::Core`]). `Candidate` itself only
/// needs `D: PartialOrd` to stay generic over integer distance types too.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<D> {
    pub distance: D,
    pub id: NodeId,
}

impl<D: PartialEq> PartialEq for Candidate<D> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}

impl<D: PartialEq> Eq for Candidate<D> {}

impl<D: PartialOrd> PartialOrd for Candidate<D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<D: PartialOrd> Ord for Candidate<D> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.partial_cmp(&other.distance) {
            Some(Ordering::Equal) | None => self.id.cmp(&other.id),
            Some(ord) => ord,
        }
    }
}

/// Newtype giving any `PartialOrd` distance a total order, panicking on incomparable values
/// (e.g. NaN) rather than silently misordering the heap.
pub type Distance<D> = OrderedFloat<D>;
