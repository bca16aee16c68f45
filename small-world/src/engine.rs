//! INSERT / REMOVE / K-NN-SEARCH orchestration: the layer-by-layer algorithms that drive
//! [`crate::core::Core`] and [`crate::search::LayerSearcher`].
//!
//! Insertion runs coarse descent down to the node's assigned layer, then SEARCH-LAYER +
//! SELECT-NEIGHBORS + bidirectional connect at each layer from there down to 0. Removal walks
//! the removed node's back-links to repair exactly the peers it touched, rather than rebuilding
//! any part of the graph.

use rand::Rng;

use crate::core::Core;
use crate::costs::TravelingCosts;
use crate::error::{Error, GraphChanged, Result};
use crate::events::EventReporting;
use crate::search::{CancellationToken, LayerSearcher, SearchOutcome};
use crate::types::{Candidate, NodeId};

/// Bound on K-NN-SEARCH's version-conflict retry loop.
const MAX_SEARCH_RETRIES: u32 = 1024;

/// Sample a new node's top layer as `⌊-ln(u) / ln(M)⌋`, `u ~ Uniform(0, 1]`.
///
/// `rng.gen::<f64>()` draws from `[0, 1)`; flipped to `1.0 - u` so the input to `ln` is always
/// in `(0, 1]` and never exactly zero.
pub fn sample_layer(rng: &mut impl Rng, level_lambda: f64) -> usize {
    let u: f64 = 1.0 - rng.gen::<f64>();
    (-u.ln() * level_lambda).floor() as usize
}

/// Stateless driver over a [`Core`]; holds no data of its own beyond what's passed in, so a
/// single engine can be shared across threads behind the facade's `RwLock`.
pub struct GraphEngine;

impl GraphEngine {
    /// INSERT: wire a freshly allocated node into every layer from
    /// `min(entry.maxLayer, new.maxLayer)` down to 0.
    pub fn insert<T, D, F>(
        core: &mut Core<T>,
        searcher: &mut LayerSearcher<D>,
        id: NodeId,
        top_layer: usize,
        distance_fn: &F,
        events: Option<&dyn EventReporting>,
    ) where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        let Some(entry) = core.entry_point() else {
            core.set_entry_point(Some(id));
            return;
        };

        let item = core
            .item(id)
            .cloned()
            .expect("inserted node's item slot was just populated");
        let costs = TravelingCosts::for_node(&item, id, distance_fn);

        let entry_top_layer = core.node(entry).top_layer();
        let mut ep = Self::coarse_descend(core, entry, entry_top_layer, top_layer + 1, &costs);

        for layer in (0..=top_layer.min(entry_top_layer)).rev() {
            // Construction runs single-writer: nothing else can bump `version` between
            // the call below and its own completion, so `GraphChanged` cannot occur here.
            let outcome = searcher
                .search_layer(
                    core,
                    ep,
                    core.params.ef_construction,
                    layer,
                    &costs,
                    |_| true,
                    core.version(),
                    &CancellationToken::new(),
                )
                .unwrap_or(SearchOutcome::Completed(Vec::new()));

            let candidates = match outcome {
                SearchOutcome::Completed(c) | SearchOutcome::Cancelled(c) => c,
            };
            if candidates.is_empty() {
                continue;
            }

            let limit = core.params.m_for_layer(layer);
            let selector = core.params.selector;
            let neighbor_ids = selector.select(
                limit,
                candidates,
                &costs,
                |n| core.node(n).connections(layer).to_vec(),
                |n| core.item(n).cloned(),
            );

            for &neighbor in &neighbor_ids {
                core.connect(id, neighbor, layer, distance_fn);
            }
            if let Some(&best) = neighbor_ids.first() {
                ep = best;
            }
        }

        if top_layer > entry_top_layer {
            core.set_entry_point(Some(id));
        }
        if let Some(sink) = events {
            sink.on_progress(1, 1);
        }
    }

    /// Single-candidate greedy descent from `from_layer` down to (but not
    /// including) `target_layer`, hopping to the nearest neighbor at each layer until no
    /// neighbor improves on the current node's distance to the search target.
    fn coarse_descend<T, D, F>(
        core: &Core<T>,
        mut current: NodeId,
        from_layer: usize,
        target_layer: usize,
        costs: &TravelingCosts<'_, T, D, F>,
    ) -> NodeId
    where
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        if from_layer < target_layer {
            return current;
        }
        for layer in (target_layer..=from_layer).rev() {
            loop {
                let Some(current_item) = core.item(current) else {
                    break;
                };
                let mut best_distance = costs.distance_to(current_item);
                let mut improved = None;
                for &neighbor in core.node(current).connections(layer) {
                    let Some(item) = core.item(neighbor) else {
                        continue;
                    };
                    let d = costs.distance_to(item);
                    if d < best_distance {
                        best_distance = d;
                        improved = Some(neighbor);
                    }
                }
                match improved {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        current
    }

    /// REMOVE: unlink `id` from every peer, repair any peer whose degree drops below
    /// `M_ℓ / 2`, then tombstone the slot.
    pub fn remove<T, D, F>(
        core: &mut Core<T>,
        searcher: &mut LayerSearcher<D>,
        id: NodeId,
        distance_fn: &F,
    ) -> Result<()>
    where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        if !core.is_live(id) {
            return Err(Error::InvalidOperation(format!(
                "removeItem called with id {} which is not live",
                id.0
            )));
        }

        if core.entry_point() == Some(id) {
            Self::reseat_entry_point(core, id);
        }

        let top_layer = core.node(id).top_layer();
        let mut needs_repair: Vec<(NodeId, usize)> = Vec::new();

        for layer in 0..=top_layer {
            let in_peers = core.node(id).in_connections(layer).to_vec();
            for peer in in_peers {
                core.disconnect(peer, id, layer);
                let limit = core.params.m_for_layer(layer);
                if core.is_live(peer) && core.node(peer).degree(layer) < limit / 2 {
                    needs_repair.push((peer, layer));
                }
            }
            // Hedge against invariant drift: also walk the node's own out-edges for any stale
            // reverse link pass above didn't cover.
            let out_peers = core.node(id).connections(layer).to_vec();
            for peer in out_peers {
                core.disconnect(id, peer, layer);
            }
        }

        core.tombstone(id);

        for (peer, layer) in needs_repair {
            if core.is_live(peer) {
                Self::local_repair(core, searcher, peer, layer, distance_fn);
            }
        }

        Ok(())
    }

    /// If the entry point has no out-edges at any of its layers, fall back to scanning for any
    /// other live node rather than leaving the entry point dangling on a removed id.
    fn reseat_entry_point<T>(core: &mut Core<T>, removed: NodeId) {
        let top_layer = core.node(removed).top_layer();
        for layer in (0..=top_layer).rev() {
            if let Some(&replacement) = core.node(removed).connections(layer).first() {
                core.set_entry_point(Some(replacement));
                return;
            }
        }
        let fallback = core.live_ids().find(|&id| id != removed);
        core.set_entry_point(fallback);
    }

    /// Local repair: re-wire `node_id` at `layer` as if it were being freshly inserted
    /// there, using a fresh traveling-costs closure and a new coarse descent from the entry
    /// point.
    fn local_repair<T, D, F>(
        core: &mut Core<T>,
        searcher: &mut LayerSearcher<D>,
        node_id: NodeId,
        layer: usize,
        distance_fn: &F,
    ) where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        let Some(entry) = core.entry_point() else {
            return;
        };
        let Some(item) = core.item(node_id).cloned() else {
            return;
        };
        let costs = TravelingCosts::for_node(&item, node_id, distance_fn);
        let entry_top_layer = core.node(entry).top_layer();
        let ep = Self::coarse_descend(core, entry, entry_top_layer, layer + 1, &costs);

        let outcome = searcher.search_layer(
            core,
            ep,
            core.params.ef_construction,
            layer,
            &costs,
            |_| true,
            core.version(),
            &CancellationToken::new(),
        );
        let candidates = match outcome {
            Ok(SearchOutcome::Completed(c)) | Ok(SearchOutcome::Cancelled(c)) => c,
            Err(GraphChanged) => return,
        };
        if candidates.is_empty() {
            return;
        }

        let limit = core.params.m_for_layer(layer);
        let selector = core.params.selector;
        let neighbor_ids = selector.select(
            limit,
            candidates,
            &costs,
            |n| core.node(n).connections(layer).to_vec(),
            |n| core.item(n).cloned(),
        );
        for neighbor in neighbor_ids {
            core.connect(node_id, neighbor, layer, distance_fn);
        }
    }

    /// K-NN-SEARCH: bounded retry loop guarding against a concurrent structural
    /// mutation observed mid-traversal.
    pub fn knn_search<T, D, F>(
        core: &Core<T>,
        searcher: &mut LayerSearcher<D>,
        query: &T,
        k: usize,
        filter: impl Fn(&T) -> bool + Copy,
        distance_fn: &F,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Candidate<D>>>
    where
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        let Some(entry) = core.entry_point() else {
            return Ok(Vec::new());
        };
        let costs = TravelingCosts::for_query(query, distance_fn);
        let ef = k.max(core.params.min_nn);

        for attempt in 0..MAX_SEARCH_RETRIES {
            let version_at_start = core.version();
            let entry_top_layer = core.node(entry).top_layer();
            let ep = Self::coarse_descend(core, entry, entry_top_layer, 1, &costs);

            match searcher.search_layer(core, ep, ef, 0, &costs, filter, version_at_start, cancellation) {
                Ok(SearchOutcome::Completed(mut results) | SearchOutcome::Cancelled(mut results)) => {
                    results.truncate(k);
                    return Ok(results);
                }
                Err(GraphChanged) => {
                    if attempt + 1 == MAX_SEARCH_RETRIES {
                        return Err(Error::RetriesExhausted {
                            attempts: MAX_SEARCH_RETRIES,
                        });
                    }
                    continue;
                }
            }
        }
        Err(Error::RetriesExhausted {
            attempts: MAX_SEARCH_RETRIES,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Params;
    use rand::SeedableRng;

    fn distance(a: &[f32; 2], b: &[f32; 2]) -> crate::types::Distance<f32> {
        let dx = a[0] - b[0];
        let dy = a[1] - b[1];
        crate::types::Distance::from((dx * dx + dy * dy).sqrt())
    }

    fn build_grid(core: &mut Core<[f32; 2]>, searcher: &mut LayerSearcher<crate::types::Distance<f32>>) -> Vec<NodeId> {
        let mut rng = rand::rngs::SmallRng::seed_from_u64(7);
        let points: Vec<[f32; 2]> = (0..25)
            .map(|i| [(i % 5) as f32, (i / 5) as f32])
            .collect();
        let mut ids = Vec::new();
        for point in points {
            let top_layer = sample_layer(&mut rng, core.params.level_lambda());
            let id = core.allocate(top_layer, point);
            GraphEngine::insert(core, searcher, id, top_layer, &distance, None);
            ids.push(id);
        }
        ids
    }

    #[test]
    fn insert_makes_the_graph_searchable_for_self_recall() {
        let mut core = Core::new(Params::default());
        let mut searcher = LayerSearcher::new();
        let ids = build_grid(&mut core, &mut searcher);

        let query = core.item(ids[12]).copied().unwrap();
        let result = GraphEngine::knn_search(
            &core,
            &mut searcher,
            &query,
            1,
            |_| true,
            &distance,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(result[0].id, ids[12]);
    }

    #[test]
    fn remove_keeps_entry_point_live() {
        let mut core = Core::new(Params::default());
        let mut searcher = LayerSearcher::new();
        let ids = build_grid(&mut core, &mut searcher);

        let entry = core.entry_point().unwrap();
        GraphEngine::remove(&mut core, &mut searcher, entry, &distance).unwrap();
        let new_entry = core.entry_point();
        assert_ne!(new_entry, Some(entry));
        assert!(new_entry.map_or(false, |id| core.is_live(id)));

        for &id in &ids {
            if id == entry {
                assert!(!core.is_live(id));
            }
        }
    }

    #[test]
    fn filter_rejecting_everything_returns_empty_in_finite_time() {
        let mut core = Core::new(Params::default());
        let mut searcher = LayerSearcher::new();
        build_grid(&mut core, &mut searcher);

        let query = [2.0, 2.0];
        let result = GraphEngine::knn_search(
            &core,
            &mut searcher,
            &query,
            5,
            |_| false,
            &distance,
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(result.is_empty());
    }
}
