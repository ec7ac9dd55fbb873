//! Simulation of ancestral recombination graphs (ARG)
//! under the coalescent with recombination.
//!
//! The simulation proceeds backwards in time from a set of
//! sample genomes, recording each recombination and common
//! ancestor event as nodes and edges of a [`TableCollection`].
//! Two encodings of the output are available:
//!
//! * [`Encoding::Resolved`] records, for every edge, the exact
//!   interval of genome transmitted from parent to child.
//! * [`Encoding::Unresolved`] records only the topology plus
//!   recombination breakpoints. [`convert_unresolved`]
//!   reconstructs the resolved ARG from it.
//!
//! ```
//! use coalescent_arg::{convert_unresolved, simulate_resolved, simulate_unresolved, ArgParameters};
//!
//! let params = ArgParameters::new(5, 0.3, 10).with_seed(42);
//! let resolved = simulate_resolved(&params).unwrap();
//! let unresolved = simulate_unresolved(&params).unwrap();
//! assert_eq!(convert_unresolved(&unresolved).unwrap(), resolved);
//! ```

use nohash::BuildNoHashHasher;
use std::collections::HashMap;

mod builder;
mod convert;
mod flags;
mod lineage;
mod observer;
mod scheduler;
mod segments;
mod simulation;
mod tables;

pub use builder::ArgBuilder;
pub use builder::Encoding;
pub use convert::convert_unresolved;
pub use convert::ConversionError;
pub use flags::NodeFlags;
pub use lineage::Lineage;
pub use lineage::LineageError;
pub use observer::EventCounter;
pub use observer::LoggingObserver;
pub use observer::NoopObserver;
pub use observer::SimulationObserver;
pub use scheduler::Event;
pub use segments::merge_ancestry;
pub use segments::overlapping_segments;
pub use segments::AncestryInterval;
pub use segments::GenomicInterval;
pub use segments::MergeAncestry;
pub use segments::MergedInterval;
pub use segments::Overlapper;
pub use simulation::simulate;
pub use simulation::simulate_resolved;
pub use simulation::simulate_unresolved;
pub use simulation::simulate_with_observer;
pub use simulation::ArgParameters;
pub use simulation::ParameterError;
pub use simulation::SimulationContext;
pub use simulation::SimulationError;
pub use simulation::ValidatedParameters;
pub use tables::Edge;
pub use tables::EdgeTable;
pub use tables::FrozenArg;
pub use tables::NodeMetadata;
pub use tables::NodeRow;
pub use tables::NodeTable;
pub use tables::TableCollection;
pub use tables::TableError;

/// Identifier of a node: its row in the [`NodeTable`].
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Node(usize);

impl Node {
    pub fn as_index(&self) -> usize {
        self.0
    }
}

impl From<usize> for Node {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps node ids to per-node state without hashing.
type NodeMap<T> = HashMap<Node, T, BuildNoHashHasher<usize>>;
