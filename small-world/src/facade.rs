//! The public entry point: `SmallWorld`, its `Builder`, and the serialize/deserialize framing.
//! Wraps [`crate::core::Core`] in a single `parking_lot::RwLock` so mutations take the write
//! lane exclusively while searches share the read lane. A `Mutex<Vec<LayerSearcher>>` pool keeps
//! scratch search buffers instance-owned rather than allocated per query.

use std::io::{Read, Write};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::{Core, Params};
use crate::engine::{sample_layer, GraphEngine};
use crate::error::{Error, Result};
use crate::events::EventReporting;
use crate::node::Node;
use crate::search::{CancellationToken, LayerSearcher};
use crate::select::NeighborSelector;
use crate::types::{Candidate, Distance, NodeId};

const WIRE_HEADER: &str = "HNSW";

/// A single `(id, item, distance)` result row, sorted ascending by distance within a
/// `knn_search` response.
#[derive(Clone, Debug)]
pub struct SearchHit<T, D> {
    pub id: NodeId,
    pub item: T,
    pub distance: D,
}

/// Thread-safe, lock-guarded HNSW index over items `T` under distance function `F: Fn(&T, &T)
/// -> D`. Construct with [`Builder`].
pub struct SmallWorld<T, D, F> {
    core: RwLock<Core<T>>,
    pool: Mutex<Vec<LayerSearcher<D>>>,
    distance_fn: F,
    rng: Mutex<SmallRng>,
    events: Option<Box<dyn EventReporting>>,
}

impl<T, D, F> SmallWorld<T, D, F>
where
    T: Clone,
    D: PartialOrd + Copy,
    F: Fn(&T, &T) -> D,
{
    /// Check out a scratch searcher from the pool, sized for `capacity_hint` if a fresh one
    /// has to be allocated. Takes the hint as a parameter (rather than reading `self.core`
    /// itself) so it can be called while the caller already holds either the read or write
    /// guard on `self.core` without deadlocking on `parking_lot`'s non-reentrant `RwLock`.
    fn checkout_searcher(&self, capacity_hint: usize) -> LayerSearcher<D> {
        self.pool
            .lock()
            .pop()
            .unwrap_or_else(|| LayerSearcher::with_capacity(capacity_hint))
    }

    fn return_searcher(&self, searcher: LayerSearcher<D>) {
        self.pool.lock().push(searcher);
    }

    fn report_latency(&self, operation: &str, started: Instant) {
        if let Some(sink) = &self.events {
            sink.on_latency(operation, started.elapsed());
        }
    }

    /// `addItems`: insert each item in order, returning the newly assigned ids in the same
    /// order. All-or-nothing is not meaningful across a batch (each item's insert is its own
    /// structural unit), but a single item's insert is atomic.
    #[instrument(skip_all, fields(count = items.len()))]
    pub fn add_items(&self, items: Vec<T>) -> Result<Vec<NodeId>> {
        let started = Instant::now();
        let total = items.len();
        let mut core = self.core.write();
        let mut searcher = self.checkout_searcher(core.capacity());
        let mut ids = Vec::with_capacity(total);

        for (done, item) in items.into_iter().enumerate() {
            let level_lambda = core.params.level_lambda();
            let top_layer = {
                let mut rng = self.rng.lock();
                sample_layer(&mut *rng, level_lambda)
            };
            let id = core.allocate(top_layer, item);
            GraphEngine::insert(
                &mut core,
                &mut searcher,
                id,
                top_layer,
                &self.distance_fn,
                self.events.as_deref(),
            );
            ids.push(id);
            if let Some(sink) = &self.events {
                sink.on_progress(done + 1, total);
            }
        }

        self.return_searcher(searcher);
        drop(core);
        self.report_latency("add_items", started);
        Ok(ids)
    }

    /// `removeItem`: tombstone `id`. Returns `Error::InvalidOperation` if `id` is not live.
    #[instrument(skip(self))]
    pub fn remove_item(&self, id: NodeId) -> Result<()> {
        let started = Instant::now();
        let mut core = self.core.write();
        let mut searcher = self.checkout_searcher(core.capacity());
        let result = GraphEngine::remove(&mut core, &mut searcher, id, &self.distance_fn);
        self.return_searcher(searcher);
        drop(core);
        self.report_latency("remove_item", started);
        result
    }

    /// `knnSearch`: up to `k` nearest items to `query`, ascending by distance.
    #[instrument(skip_all, fields(k))]
    pub fn knn_search(
        &self,
        query: &T,
        k: usize,
        filter: impl Fn(&T) -> bool + Copy,
        cancellation: &CancellationToken,
    ) -> Result<Vec<SearchHit<T, D>>> {
        let started = Instant::now();
        let core = self.core.read();
        let mut searcher = self.checkout_searcher(core.capacity());
        let candidates = GraphEngine::knn_search(
            &core,
            &mut searcher,
            query,
            k,
            filter,
            &self.distance_fn,
            cancellation,
        )?;
        let hits = candidates
            .into_iter()
            .filter_map(|Candidate { id, distance }| {
                core.item(id).cloned().map(|item| SearchHit { id, item, distance })
            })
            .collect();
        drop(core);
        self.return_searcher(searcher);
        self.report_latency("knn_search", started);
        Ok(hits)
    }

    /// `getItem`.
    pub fn get_item(&self, id: NodeId) -> Option<T> {
        self.core.read().item(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.core.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.read().is_empty()
    }

    /// `serializeGraph`: header, parameter record, then the core block. Items are not
    /// written; the caller must supply the same positional items list to `deserialize`.
    #[instrument(skip_all)]
    pub fn serialize_graph(&self, writer: &mut impl Write) -> Result<()> {
        let core = self.core.read();
        let wire = WireGraph::from_core(&core);
        drop(core);
        bincode::serialize_into(&mut *writer, WIRE_HEADER)?;
        bincode::serialize_into(&mut *writer, &wire)?;
        Ok(())
    }

    /// `deserializeGraph`: rebuild a `SmallWorld` from a previously serialized stream plus the
    /// original positional items list. `reader` is consumed fully; on a bad header no attempt
    /// is made to seek back except when the caller passes a `Seek`-capable reader to
    /// [`Self::deserialize_graph_seekable`].
    #[instrument(skip_all, fields(count = items.len()))]
    pub fn deserialize_graph(
        items: Vec<T>,
        distance_fn: F,
        rng: SmallRng,
        reader: &mut impl Read,
        events: Option<Box<dyn EventReporting>>,
    ) -> Result<Self> {
        let header: String = bincode::deserialize_from(&mut *reader)?;
        if header != WIRE_HEADER {
            return Err(Error::InvalidData(format!(
                "expected header {WIRE_HEADER:?}, got {header:?}"
            )));
        }
        let wire: WireGraph = bincode::deserialize_from(&mut *reader)?;
        let core = wire.into_core(items)?;
        Ok(Self {
            core: RwLock::new(core),
            pool: Mutex::new(Vec::new()),
            distance_fn,
            rng: Mutex::new(rng),
            events,
        })
    }

    /// Like [`Self::deserialize_graph`], but seeks back to the stream's start on an invalid
    /// header instead of leaving the reader partway through a failed parse.
    pub fn deserialize_graph_seekable<R: Read + std::io::Seek>(
        items: Vec<T>,
        distance_fn: F,
        rng: SmallRng,
        reader: &mut R,
        events: Option<Box<dyn EventReporting>>,
    ) -> Result<Self> {
        let start = reader.stream_position()?;
        match Self::deserialize_graph(items, distance_fn, rng, reader, events) {
            Ok(graph) => Ok(graph),
            Err(err) => {
                reader.seek(std::io::SeekFrom::Start(start))?;
                Err(err)
            }
        }
    }
}

/// Validated configuration surface. Invalid parameters are rejected here rather than
/// deferred to first use.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    params: Params,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn m(mut self, m: usize) -> Self {
        self.params.m = m;
        self
    }

    pub fn ef_construction(mut self, ef_construction: usize) -> Self {
        self.params.ef_construction = ef_construction;
        self
    }

    pub fn min_nn(mut self, min_nn: usize) -> Self {
        self.params.min_nn = min_nn;
        self
    }

    pub fn selector(mut self, selector: NeighborSelector) -> Self {
        self.params.selector = selector;
        self
    }

    pub fn initial_items_size(mut self, initial_items_size: usize) -> Self {
        self.params.initial_items_size = initial_items_size;
        self
    }

    /// `build(distance, rng, parameters, threadSafe)`. `threadSafe` has no separate code path
    /// here: the `RwLock` facade is always used, so single- and multi-threaded callers share
    /// the same implementation.
    pub fn build<T, D, F>(
        self,
        distance_fn: F,
        rng: SmallRng,
        events: Option<Box<dyn EventReporting>>,
    ) -> Result<SmallWorld<T, D, F>>
    where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        self.params.validate()?;
        Ok(SmallWorld {
            core: RwLock::new(Core::new(self.params)),
            pool: Mutex::new(Vec::new()),
            distance_fn,
            rng: Mutex::new(rng),
            events,
        })
    }

    /// Convenience over [`Self::build`] that seeds its own `SmallRng` from entropy.
    pub fn build_with_default_rng<T, D, F>(
        self,
        distance_fn: F,
        events: Option<Box<dyn EventReporting>>,
    ) -> Result<SmallWorld<T, D, F>>
    where
        T: Clone,
        D: PartialOrd + Copy,
        F: Fn(&T, &T) -> D,
    {
        self.build(distance_fn, SmallRng::from_entropy(), events)
    }
}

#[derive(Serialize, Deserialize)]
struct WireParams {
    m: usize,
    ef_construction: usize,
    min_nn: usize,
    selector: WireSelector,
    initial_items_size: usize,
}

#[derive(Serialize, Deserialize)]
enum WireSelector {
    Simple,
    Heuristic {
        expand_candidates: bool,
        keep_pruned_connections: bool,
    },
    Custom,
}

impl From<NeighborSelector> for WireSelector {
    fn from(selector: NeighborSelector) -> Self {
        match selector {
            NeighborSelector::Simple => WireSelector::Simple,
            NeighborSelector::Heuristic {
                expand_candidates,
                keep_pruned_connections,
            } => WireSelector::Heuristic {
                expand_candidates,
                keep_pruned_connections,
            },
            NeighborSelector::Custom => WireSelector::Custom,
        }
    }
}

impl From<WireSelector> for NeighborSelector {
    fn from(selector: WireSelector) -> Self {
        match selector {
            WireSelector::Simple => NeighborSelector::Simple,
            WireSelector::Heuristic {
                expand_candidates,
                keep_pruned_connections,
            } => NeighborSelector::Heuristic {
                expand_candidates,
                keep_pruned_connections,
            },
            WireSelector::Custom => NeighborSelector::Custom,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireNode {
    id: u32,
    connections: Vec<Vec<u32>>,
    in_connections: Vec<Vec<u32>>,
}

#[derive(Serialize, Deserialize)]
struct WireGraph {
    params: WireParams,
    nodes: Vec<WireNode>,
    entry_point: Option<u32>,
}

impl WireGraph {
    fn from_core<T>(core: &Core<T>) -> Self {
        let params = &core.params;
        let wire_params = WireParams {
            m: params.m,
            ef_construction: params.ef_construction,
            min_nn: params.min_nn,
            selector: params.selector.into(),
            initial_items_size: params.initial_items_size,
        };
        let nodes = core
            .live_ids()
            .map(|id| {
                let node = core.node(id);
                let layers = node.layer_count();
                WireNode {
                    id: id.0,
                    connections: (0..layers).map(|l| node.connections(l).iter().map(|n| n.0).collect()).collect(),
                    in_connections: (0..layers)
                        .map(|l| node.in_connections(l).iter().map(|n| n.0).collect())
                        .collect(),
                }
            })
            .collect();
        WireGraph {
            params: wire_params,
            nodes,
            entry_point: core.entry_point().map(|id| id.0),
        }
    }

    fn into_core<T>(self, items: Vec<T>) -> Result<Core<T>> {
        let capacity = items.len();
        let params = Params {
            m: self.params.m,
            ef_construction: self.params.ef_construction,
            min_nn: self.params.min_nn,
            selector: self.params.selector.into(),
            initial_items_size: self.params.initial_items_size,
        };
        params.validate()?;

        let mut nodes: Vec<Option<Node>> = (0..capacity).map(|_| None).collect();
        let mut present = vec![false; capacity];
        for wire_node in &self.nodes {
            let idx = wire_node.id as usize;
            if idx >= capacity {
                return Err(Error::InvalidData(format!(
                    "node id {} out of range for {} supplied items",
                    wire_node.id, capacity
                )));
            }
            let connections = wire_node.connections.iter().map(|l| l.iter().map(|&n| NodeId(n)).collect()).collect();
            let in_connections = wire_node
                .in_connections
                .iter()
                .map(|l| l.iter().map(|&n| NodeId(n)).collect())
                .collect();
            nodes[idx] = Some(Node::from_layers(connections, in_connections));
            present[idx] = true;
        }

        let mut final_nodes = Vec::with_capacity(capacity);
        let mut final_items = Vec::with_capacity(capacity);
        let mut free_list = Vec::new();
        for (idx, (node, item)) in nodes.into_iter().zip(items.into_iter()).enumerate() {
            match node {
                Some(node) => {
                    final_nodes.push(node);
                    final_items.push(Some(item));
                }
                None => {
                    final_nodes.push(Node::new(0));
                    final_items.push(None);
                    free_list.push(NodeId(idx as u32));
                }
            }
        }

        let entry_point = self.entry_point.map(NodeId);
        if let Some(entry) = entry_point {
            if !present[usize::from(entry)] {
                return Err(Error::InvalidData(
                    "entry point id is not among the serialized live nodes".to_string(),
                ));
            }
        }

        Ok(Core::from_parts(params, final_nodes, final_items, free_list, entry_point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn distance(a: &f32, b: &f32) -> Distance<f32> {
        Distance::from((a - b).abs())
    }

    #[test]
    fn builder_rejects_invalid_m() {
        let result = Builder::new()
            .m(1)
            .build::<f32, Distance<f32>, _>(distance, SmallRng::seed_from_u64(1), None);
        assert!(result.is_err());
    }

    #[test]
    fn round_trip_preserves_search_results() {
        let graph = Builder::new()
            .build(distance, SmallRng::seed_from_u64(1), None)
            .unwrap();
        let items: Vec<f32> = (0..50).map(|i| i as f32).collect();
        graph.add_items(items.clone()).unwrap();

        let before = graph
            .knn_search(&10.0, 3, |_| true, &CancellationToken::new())
            .unwrap();

        let mut buf = Cursor::new(Vec::new());
        graph.serialize_graph(&mut buf).unwrap();
        buf.set_position(0);

        let restored = SmallWorld::deserialize_graph(items, distance, SmallRng::seed_from_u64(2), &mut buf, None).unwrap();
        let after = restored
            .knn_search(&10.0, 3, |_| true, &CancellationToken::new())
            .unwrap();

        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.id, a.id);
        }
    }
}
