//! Neighbor selection: the three SELECT-NEIGHBORS variants used to shrink a candidate set down
//! to `M_ℓ` edges when connecting a node into a layer.

use crate::costs::TravelingCosts;
use crate::heap::{BinaryHeap, HeapKind};
use crate::types::{Candidate, NodeId};

/// Which SELECT-NEIGHBORS algorithm a graph uses when shrinking a connection list to `M_ℓ`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighborSelector {
    /// Algorithm 3: keep the `M_ℓ` nearest candidates, full stop.
    Simple,
    /// Algorithm 4, with the two tuning flags from the original paper.
    Heuristic {
        /// Expand the working set with each initial candidate's own out-neighbors before
        /// selecting.
        expand_candidates: bool,
        /// If the selected set is still short of `M_ℓ` after the main pass, backfill from the
        /// nearest discarded candidates.
        keep_pruned_connections: bool,
    },
    /// Algorithm 5 ("RNG-like"): accept a candidate iff it is closer to the target than to
    /// every already-accepted result. Simpler than `Heuristic`, no discard reuse.
    Custom,
}

impl Default for NeighborSelector {
    fn default() -> Self {
        NeighborSelector::Simple
    }
}

impl NeighborSelector {
    /// Select up to `m` neighbors for `destination` out of `candidates` (already paired with
    /// their distance to `destination`) plus, for the heuristic variant, expansion through
    /// `neighbors_of`.
    ///
    /// `candidates` need not be sorted; this owns sorting/heaping internally. Returns ids in
    /// ascending distance order, nearest first, so the first element can be used directly as
    /// the next coarse-descent entry point.
    pub fn select<T, D, F>(
        &self,
        m: usize,
        candidates: Vec<Candidate<D>>,
        costs: &TravelingCosts<'_, T, D, F>,
        neighbors_of: impl Fn(NodeId) -> Vec<NodeId>,
        item_at: impl Fn(NodeId) -> Option<T>,
    ) -> Vec<NodeId>
    where
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        match *self {
            NeighborSelector::Simple => select_simple(m, candidates),
            NeighborSelector::Heuristic {
                expand_candidates,
                keep_pruned_connections,
            } => select_heuristic(
                m,
                candidates,
                costs,
                neighbors_of,
                item_at,
                expand_candidates,
                keep_pruned_connections,
            ),
            NeighborSelector::Custom => select_custom(m, candidates, costs, item_at),
        }
    }
}

fn select_simple<D: PartialOrd + Copy>(m: usize, candidates: Vec<Candidate<D>>) -> Vec<NodeId> {
    let mut heap = BinaryHeap::build(HeapKind::Min, candidates);
    let mut out = Vec::with_capacity(m.min(heap.len()));
    while out.len() < m {
        match heap.pop() {
            Some(c) => out.push(c.id),
            None => break,
        }
    }
    out
}

fn select_heuristic<T, D, F>(
    m: usize,
    candidates: Vec<Candidate<D>>,
    costs: &TravelingCosts<'_, T, D, F>,
    neighbors_of: impl Fn(NodeId) -> Vec<NodeId>,
    item_at: impl Fn(NodeId) -> Option<T>,
    expand_candidates: bool,
    keep_pruned_connections: bool,
) -> Vec<NodeId>
where
    D: PartialOrd + Copy,
    F: Fn(&T, &T) -> D,
{
    let mut working: Vec<Candidate<D>> = candidates;

    if expand_candidates {
        let seed_ids: Vec<NodeId> = working.iter().map(|c| c.id).collect();
        let mut seen: std::collections::HashSet<NodeId> = seed_ids.iter().copied().collect();
        for seed in seed_ids {
            for n in neighbors_of(seed) {
                if seen.insert(n) {
                    if let Some(item) = item_at(n) {
                        working.push(Candidate {
                            distance: costs.distance_to(&item),
                            id: n,
                        });
                    }
                }
            }
        }
    }

    let mut frontier = BinaryHeap::build(HeapKind::Min, working);
    let mut accepted: Vec<Candidate<D>> = Vec::with_capacity(m);
    let mut discarded = BinaryHeap::new(HeapKind::Min);

    while accepted.len() < m {
        let Some(candidate) = frontier.pop() else {
            break;
        };
        let closer_than_farthest_accepted = match accepted.last() {
            Some(farthest) => candidate.distance < farthest.distance,
            None => true,
        };
        if closer_than_farthest_accepted {
            accepted.push(candidate);
        } else {
            discarded.push(candidate);
        }
    }

    if keep_pruned_connections {
        while accepted.len() < m {
            match discarded.pop() {
                Some(c) => accepted.push(c),
                None => break,
            }
        }
    }

    accepted.sort_by(|a, b| a.cmp(b));
    accepted.into_iter().map(|c| c.id).collect()
}

fn select_custom<T, D, F>(
    m: usize,
    candidates: Vec<Candidate<D>>,
    costs: &TravelingCosts<'_, T, D, F>,
    item_at: impl Fn(NodeId) -> Option<T>,
) -> Vec<NodeId>
where
    D: PartialOrd + Copy,
    F: Fn(&T, &T) -> D,
{
    let mut frontier = BinaryHeap::build(HeapKind::Min, candidates);
    let mut accepted: Vec<(NodeId, T, D)> = Vec::with_capacity(m);

    while accepted.len() < m {
        let Some(candidate) = frontier.pop() else {
            break;
        };
        let Some(item) = item_at(candidate.id) else {
            continue;
        };
        let distance_to_target = candidate.distance;
        let closer_to_target_than_to_every_accepted = accepted.iter().all(|(_, accepted_item, _)| {
            distance_to_target < costs.item_distance(&item, accepted_item)
        });
        if closer_to_target_than_to_every_accepted {
            accepted.push((candidate.id, item, distance_to_target));
        }
    }

    accepted.into_iter().map(|(id, _, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Distance;

    fn distance(a: &f32, b: &f32) -> Distance<f32> {
        Distance::from((a - b).abs())
    }

    #[test]
    fn simple_keeps_m_nearest() {
        let cands = vec![
            Candidate { distance: Distance::from(5.0), id: NodeId(0) },
            Candidate { distance: Distance::from(1.0), id: NodeId(1) },
            Candidate { distance: Distance::from(3.0), id: NodeId(2) },
        ];
        let selected = select_simple(2, cands);
        assert_eq!(selected, vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn custom_rejects_candidates_too_close_to_an_accepted_result() {
        let target = 0.0f32;
        let items = [(NodeId(0), 1.0f32), (NodeId(1), 1.1f32), (NodeId(2), 10.0f32)];
        let costs = TravelingCosts::for_query(&target, &distance);
        let cands: Vec<_> = items
            .iter()
            .map(|(id, v)| Candidate { distance: costs.distance_to(v), id: *id })
            .collect();
        let item_at = |id: NodeId| items.iter().find(|(i, _)| *i == id).map(|(_, v)| *v);
        let selected = select_custom(3, cands, &costs, item_at);
        // NodeId(1) at 1.1 is nearly on top of NodeId(0) at 1.0 (distance 0.1) which is closer
        // to the target (1.0) than NodeId(1) is to the target (1.1), so it gets rejected.
        assert_eq!(selected, vec![NodeId(0), NodeId(2)]);
    }
}
