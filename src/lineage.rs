use crate::segments::AncestryInterval;
use crate::segments::GenomicInterval;
use crate::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LineageError {
    #[error("a lineage must carry at least one ancestry interval")]
    EmptyAncestry,
    #[error("interval at {left} overlaps one ending at {previous_right}")]
    UnsortedAncestry { previous_right: i64, left: i64 },
    #[error("breakpoint {breakpoint} is not strictly inside [{left}, {right})")]
    BreakpointOutOfRange {
        breakpoint: i64,
        left: i64,
        right: i64,
    },
}

/// An ancestral line that is still being traced back in time.
///
/// `node` is the most recent (going backwards) node at
/// which this lineage took part in an event.
/// The ancestry is sorted by position and never overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    node: Node,
    ancestry: Vec<AncestryInterval>,
}

impl Lineage {
    pub fn new(node: Node, ancestry: Vec<AncestryInterval>) -> Result<Self, LineageError> {
        if ancestry.is_empty() {
            return Err(LineageError::EmptyAncestry);
        }
        if let Some(w) = ancestry.windows(2).find(|w| w[1].left() < w[0].right()) {
            return Err(LineageError::UnsortedAncestry {
                previous_right: w[0].right(),
                left: w[1].left(),
            });
        }
        Ok(Self { node, ancestry })
    }

    /// A sample lineage: ancestral to itself
    /// over the whole genome.
    pub fn sample(node: Node, sequence_length: i64) -> Option<Self> {
        let ancestry = vec![AncestryInterval::new(0, sequence_length, 1)?];
        Some(Self { node, ancestry })
    }

    /// Used for the output of merges, which is
    /// sorted and disjoint by construction.
    /// Returns `None` when no ancestry remains.
    pub(crate) fn from_merged(node: Node, ancestry: Vec<AncestryInterval>) -> Option<Self> {
        if ancestry.is_empty() {
            None
        } else {
            let rv = Self { node, ancestry };
            debug_assert!(rv.is_sorted_and_disjoint());
            Some(rv)
        }
    }

    pub fn node(&self) -> Node {
        self.node
    }

    pub(crate) fn set_node(&mut self, node: Node) {
        self.node = node;
    }

    pub fn ancestry(&self) -> &[AncestryInterval] {
        &self.ancestry
    }

    /// Leftmost position of ancestral material.
    pub fn left(&self) -> i64 {
        self.ancestry[0].left()
    }

    /// Rightmost position of ancestral material.
    pub fn right(&self) -> i64 {
        self.ancestry[self.ancestry.len() - 1].right()
    }

    /// The number of positions at which a recombination
    /// can split this lineage's material.
    pub fn num_recombination_links(&self) -> u64 {
        // right > left, so this never underflows
        (self.right() - self.left() - 1) as u64
    }

    pub fn is_sorted_and_disjoint(&self) -> bool {
        self.ancestry
            .windows(2)
            .all(|w| w[0].right() <= w[1].left())
    }

    /// Split the ancestry at `breakpoint`.
    ///
    /// `self` keeps the material to the left of the breakpoint.
    /// The material to the right is returned as a new lineage
    /// that (initially) refers to the same node.
    pub fn split(&mut self, breakpoint: i64) -> Result<Lineage, LineageError> {
        if !(self.left() < breakpoint && breakpoint < self.right()) {
            return Err(LineageError::BreakpointOutOfRange {
                breakpoint,
                left: self.left(),
                right: self.right(),
            });
        }
        let mut left_ancestry = Vec::with_capacity(self.ancestry.len());
        let mut right_ancestry = vec![];
        for interval in std::mem::take(&mut self.ancestry) {
            if interval.right() <= breakpoint {
                left_ancestry.push(interval);
            } else if interval.left() >= breakpoint {
                right_ancestry.push(interval);
            } else {
                left_ancestry.push(interval.with_right(breakpoint));
                right_ancestry.push(interval.with_left(breakpoint));
            }
        }
        // Both are non-empty because the breakpoint
        // is strictly inside the span.
        self.ancestry = left_ancestry;
        Ok(Lineage {
            node: self.node,
            ancestry: right_ancestry,
        })
    }
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:[", self.node)?;
        for (i, interval) in self.ancestry.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "({}, {}, {})",
                interval.left(),
                interval.right(),
                interval.ancestral_to()
            )?;
        }
        write!(f, "]")
    }
}
