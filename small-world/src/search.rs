//! SEARCH-LAYER beam search: the inner loop run at every layer during both insertion and k-NN
//! search, with reusable scratch buffers and a version re-check for concurrent mutation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::costs::TravelingCosts;
use crate::core::Core;
use crate::error::GraphChanged;
use crate::heap::{BinaryHeap, HeapKind};
use crate::types::{Candidate, NodeId};
use crate::visited::VisitedBitSet;

/// A cheaply-cloneable flag a caller can use to ask an in-flight k-NN search to stop early.
/// Polled at the top of [`LayerSearcher::search_layer`]'s loop and before each neighbor
/// expansion; a cancelled search returns its partial `top_candidates`, not an error.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-thread, per-search scratch state. Own a `LayerSearcher` per worker thread and call
/// [`LayerSearcher::search_layer`] repeatedly; its buffers are cleared (not reallocated)
/// between calls.
pub struct LayerSearcher<D> {
    visited: VisitedBitSet,
    candidates: BinaryHeap<D>,
    top_candidates: BinaryHeap<D>,
}

/// Outcome of a single SEARCH-LAYER call: either a (possibly cancellation-truncated) ordered
/// result, or a signal that the caller's `version_at_start` is stale and the search should be
/// restarted from the top of the K-NN-SEARCH retry loop.
pub enum SearchOutcome<D> {
    Completed(Vec<Candidate<D>>),
    Cancelled(Vec<Candidate<D>>),
}

impl<D: PartialOrd + Copy> LayerSearcher<D> {
    pub fn new() -> Self {
        Self {
            visited: VisitedBitSet::default(),
            candidates: BinaryHeap::new(HeapKind::Min),
            top_candidates: BinaryHeap::new(HeapKind::Max),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            visited: VisitedBitSet::with_capacity(capacity),
            candidates: BinaryHeap::with_capacity(HeapKind::Min, capacity),
            top_candidates: BinaryHeap::with_capacity(HeapKind::Max, capacity),
        }
    }

    /// SEARCH-LAYER(entry, target, ef, layer, filter).
    ///
    /// `costs` pins the search target and supplies the distance function. `filter` gates
    /// membership in `top_candidates` only: a filtered-out node is still expanded through, so it
    /// can act as a stepping stone toward nodes that do pass.
    #[allow(clippy::too_many_arguments)]
    pub fn search_layer<T, F>(
        &mut self,
        core: &Core<T>,
        entry: NodeId,
        ef: usize,
        layer: usize,
        costs: &TravelingCosts<'_, T, D, F>,
        filter: impl Fn(&T) -> bool,
        version_at_start: u64,
        cancellation: &CancellationToken,
    ) -> Result<SearchOutcome<D>, GraphChanged>
    where
        F: Fn(&T, &T) -> D,
    {
        self.candidates.clear();
        self.top_candidates.clear();
        self.visited.reserve(core.capacity());
        self.visited.clear();

        if !core.is_live(entry) {
            return Ok(SearchOutcome::Completed(Vec::new()));
        }

        let Some(entry_item) = core.item(entry) else {
            return Ok(SearchOutcome::Completed(Vec::new()));
        };
        let entry_distance = costs.distance_to(entry_item);
        self.visited.insert(entry);
        self.candidates.push(Candidate {
            distance: entry_distance,
            id: entry,
        });
        if filter(entry_item) {
            self.top_candidates.push(Candidate {
                distance: entry_distance,
                id: entry,
            });
        }

        loop {
            if cancellation.is_cancelled() {
                return Ok(SearchOutcome::Cancelled(self.drain_sorted()));
            }

            let Some(closest) = self.candidates.peek().copied() else {
                break;
            };
            if self.top_candidates.len() >= ef {
                if let Some(farthest) = self.top_candidates.peek() {
                    if closest.distance > farthest.distance {
                        break;
                    }
                }
            }

            if core.version() != version_at_start {
                return Err(GraphChanged);
            }

            let current = self.candidates.pop().expect("peeked above");
            let neighbors = core.node(current.id).connections(layer).to_vec();

            for neighbor in neighbors {
                if cancellation.is_cancelled() {
                    return Ok(SearchOutcome::Cancelled(self.drain_sorted()));
                }
                if !self.visited.insert(neighbor) {
                    continue;
                }
                let Some(item) = core.item(neighbor) else {
                    continue;
                };
                let distance = costs.distance_to(item);

                let should_expand = self.top_candidates.len() < ef
                    || match self.top_candidates.peek() {
                        Some(farthest) => distance < farthest.distance,
                        None => true,
                    };

                if should_expand {
                    self.candidates.push(Candidate {
                        distance,
                        id: neighbor,
                    });
                    if filter(item) {
                        self.top_candidates.push(Candidate {
                            distance,
                            id: neighbor,
                        });
                        if self.top_candidates.len() > ef {
                            self.top_candidates.pop();
                        }
                    }
                }
            }
        }

        Ok(SearchOutcome::Completed(self.drain_sorted()))
    }

    /// Pop every entry out of `top_candidates` (max-heap, descending pop order) and reverse it
    /// into ascending order, leaving both scratch heaps empty for the next call.
    fn drain_sorted(&mut self) -> Vec<Candidate<D>> {
        let mut out = Vec::with_capacity(self.top_candidates.len());
        while let Some(c) = self.top_candidates.pop() {
            out.push(c);
        }
        out.reverse();
        self.candidates.clear();
        out
    }
}

impl<D: PartialOrd + Copy> Default for LayerSearcher<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn distance(a: &f32, b: &f32) -> crate::types::Distance<f32> {
        crate::types::Distance::from((a - b).abs())
    }

    fn line_graph(core: &mut Core<f32>, values: &[f32]) -> Vec<NodeId> {
        let ids: Vec<NodeId> = values.iter().map(|&v| core.allocate(0, v)).collect();
        for window in ids.windows(2) {
            core.connect(window[0], window[1], 0, &distance);
        }
        ids
    }

    #[test]
    fn search_layer_finds_nearest_along_a_line() {
        let mut core = Core::new(crate::core::Params::default());
        let ids = line_graph(&mut core, &[0.0, 1.0, 2.0, 3.0, 4.0]);
        let target = 3.1f32;
        let costs = TravelingCosts::for_query(&target, &distance);
        let mut searcher = LayerSearcher::new();
        let outcome = searcher
            .search_layer(
                &core,
                ids[0],
                2,
                0,
                &costs,
                |_| true,
                core.version(),
                &CancellationToken::new(),
            )
            .unwrap();
        let SearchOutcome::Completed(result) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result[0].id, ids[3]);
    }

    #[test]
    fn stale_version_signals_graph_changed() {
        let mut core = Core::new(crate::core::Params::default());
        let ids = line_graph(&mut core, &[0.0, 1.0, 2.0]);
        let target = 1.5f32;
        let costs = TravelingCosts::for_query(&target, &distance);
        let mut searcher = LayerSearcher::new();
        let stale_version = core.version().wrapping_sub(1);
        let result = searcher.search_layer(
            &core,
            ids[0],
            2,
            0,
            &costs,
            |_| true,
            stale_version,
            &CancellationToken::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cancellation_returns_partial_result_not_error() {
        let mut core = Core::new(crate::core::Params::default());
        let ids = line_graph(&mut core, &[0.0, 1.0, 2.0]);
        let target = 1.0f32;
        let costs = TravelingCosts::for_query(&target, &distance);
        let mut searcher = LayerSearcher::new();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = searcher
            .search_layer(&core, ids[0], 2, 0, &costs, |_| true, core.version(), &token)
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Cancelled(_)));
        let _ = Node::new(0);
    }
}
