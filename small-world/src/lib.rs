//! `small-world`: an incrementally-mutable Hierarchical Navigable Small World (HNSW)
//! approximate nearest-neighbor graph engine.
//!
//! Build an index with [`facade::Builder`], add items with [`facade::SmallWorld::add_items`],
//! and query it with [`facade::SmallWorld::knn_search`]. The graph supports incremental
//! insertion and removal (`remove_item`), concurrent search against a mutating graph, and a
//! `bincode`-framed serialize/deserialize round trip for the edge structure (items are not
//! serialized; callers supply them again at load time).
//!
//! ```
//! use small_world::facade::Builder;
//! use small_world::search::CancellationToken;
//! use small_world::types::Distance;
//! use rand::SeedableRng;
//!
//! fn distance(a: &[f32; 2], b: &[f32; 2]) -> Distance<f32> {
//!     let dx = a[0] - b[0];
//!     let dy = a[1] - b[1];
//!     Distance::from((dx * dx + dy * dy).sqrt())
//! }
//!
//! let graph = Builder::new()
//!     .m(16)
//!     .build(distance, rand::rngs::SmallRng::seed_from_u64(0), None)
//!     .unwrap();
//! let ids = graph.add_items(vec![[0.0, 0.0], [1.0, 1.0], [5.0, 5.0]]).unwrap();
//! let hits = graph
//!     .knn_search(&[0.1, 0.1], 1, |_| true, &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(hits[0].id, ids[0]);
//! ```

pub mod core;
pub mod costs;
pub mod engine;
pub mod error;
pub mod events;
pub mod facade;
pub mod heap;
pub mod node;
pub mod search;
pub mod select;
pub mod types;
mod visited;

pub use core::{Core, Params};
pub use engine::GraphEngine;
pub use error::{Error, Result};
pub use events::{EventReporting, NoopReporting};
pub use facade::{Builder, SearchHit, SmallWorld};
pub use node::Node;
pub use search::{CancellationToken, LayerSearcher, SearchOutcome};
pub use select::NeighborSelector;
pub use types::{Candidate, Distance, NodeId};
