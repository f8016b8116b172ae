//! Nearest-neighbor search over the active corpus.
//!
//! # Module Structure
//!
//! - `corpus`: an immutable document store plus its flat index
//! - `coordinator`: snapshot management and query routing
//! - `result`: hits, strategies and timings

pub mod coordinator;
pub mod corpus;
pub mod result;

pub use self::coordinator::{CoordinatorState, SearchCoordinator};
pub use self::corpus::Corpus;
pub use self::result::{SearchHit, SearchResult, SearchStrategy};
