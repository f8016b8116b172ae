//! Exact vector retrieval primitives.
//!
//! # Module Structure
//!
//! - `distance`: squared Euclidean distance and top-k selection
//! - `index`: the flat nearest-neighbor index
//! - `store`: the position-keyed document and embedding store

pub mod distance;
pub mod index;
pub mod store;

pub use self::distance::Neighbor;
pub use self::index::FlatIndex;
pub use self::store::DocumentStore;

/// A fixed-length embedding produced by a [`TextEmbedder`](crate::embedding::TextEmbedder).
pub type Embedding = Vec<f32>;
