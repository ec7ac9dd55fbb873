use crate::segments::AncestryInterval;
use crate::segments::GenomicInterval;
use crate::segments::MergedInterval;
use crate::tables::Edge;
use crate::tables::NodeMetadata;
use crate::tables::TableCollection;
use crate::tables::TableError;
use crate::Lineage;
use crate::Node;
use crate::NodeFlags;

/// How much detail an [`ArgBuilder`] records per edge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Every edge carries the exact interval
    /// transmitted from parent to child.
    #[default]
    Resolved,
    /// Common ancestor events record two edges spanning
    /// the whole genome and recombinations record two
    /// edges split at the breakpoint.
    /// Interval detail must be recovered with
    /// [`crate::convert_unresolved`].
    Unresolved,
}

/// Appends the nodes and edges of simulated events
/// to a [`TableCollection`].
#[derive(Debug)]
pub struct ArgBuilder {
    tables: TableCollection,
    encoding: Encoding,
}

impl ArgBuilder {
    pub fn new(sequence_length: i64, encoding: Encoding) -> Result<Self, TableError> {
        Ok(Self {
            tables: TableCollection::new(sequence_length)?,
            encoding,
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    pub fn add_sample(&mut self) -> Node {
        self.tables
            .add_node(0.0, NodeFlags::sample(), NodeMetadata::default())
    }

    /// Record a recombination.
    ///
    /// `left` and `right` are the two halves of a lineage that
    /// was just split at `breakpoint`. Both must still refer to
    /// the node of the lineage before the split.
    ///
    /// Returns the new (left, right) parent nodes.
    pub fn record_recombination(
        &mut self,
        time: f64,
        breakpoint: i64,
        left: &Lineage,
        right: &Lineage,
    ) -> (Node, Node) {
        let child = left.node();
        debug_assert_eq!(child, right.node());
        let metadata = NodeMetadata::with_breakpoint(breakpoint);
        let left_parent = self
            .tables
            .add_node(time, NodeFlags::recombination(), metadata);
        let right_parent = self
            .tables
            .add_node(time, NodeFlags::recombination(), metadata);
        match self.encoding {
            Encoding::Resolved => {
                record_lineage_edges(&mut self.tables, left_parent, child, left.ancestry());
                record_lineage_edges(&mut self.tables, right_parent, child, right.ancestry());
            }
            Encoding::Unresolved => {
                self.tables
                    .add_edge(Edge::UNBOUNDED_LEFT, breakpoint, left_parent, child);
                self.tables
                    .add_edge(breakpoint, Edge::UNBOUNDED_RIGHT, right_parent, child);
            }
        }
        (left_parent, right_parent)
    }

    /// Record a common ancestor of `children`, whose
    /// merged ancestry is `merged`.
    ///
    /// Returns the new parent node.
    pub fn record_common_ancestor(
        &mut self,
        time: f64,
        flags: NodeFlags,
        children: [&Lineage; 2],
        merged: &[MergedInterval],
    ) -> Node {
        let parent = self.tables.add_node(time, flags, NodeMetadata::default());
        match self.encoding {
            Encoding::Resolved => record_merged_edges(&mut self.tables, parent, &children, merged),
            Encoding::Unresolved => {
                for child in children {
                    self.tables.add_edge(
                        Edge::UNBOUNDED_LEFT,
                        Edge::UNBOUNDED_RIGHT,
                        parent,
                        child.node(),
                    );
                }
            }
        }
        parent
    }

    /// Sort the edges and return the tables.
    pub fn finish(mut self) -> TableCollection {
        self.tables.sort();
        self.tables
    }
}

pub(crate) fn record_lineage_edges(
    tables: &mut TableCollection,
    parent: Node,
    child: Node,
    ancestry: &[AncestryInterval],
) {
    for interval in ancestry {
        tables.add_edge(interval.left(), interval.right(), parent, child);
    }
}

/// One edge per merged interval per contributing child.
pub(crate) fn record_merged_edges(
    tables: &mut TableCollection,
    parent: Node,
    children: &[&Lineage],
    merged: &[MergedInterval],
) {
    for m in merged {
        for &c in m.contributors() {
            tables.add_edge(m.left(), m.right(), parent, children[c].node());
        }
    }
}

#[cfg(test)]
mod test_arg_builder {
    use super::*;
    use crate::merge_ancestry;

    fn edge_tuple(e: Edge) -> (i64, i64, usize, usize) {
        (e.left, e.right, e.parent.as_index(), e.child.as_index())
    }

    fn split_sample(encoding: Encoding) -> TableCollection {
        let mut builder = ArgBuilder::new(10, encoding).unwrap();
        let sample = builder.add_sample();
        let mut left = Lineage::sample(sample, 10).unwrap();
        let right = left.split(3).unwrap();
        let (lp, rp) = builder.record_recombination(0.5, 3, &left, &right);
        assert_eq!(lp, Node::from(1));
        assert_eq!(rp, Node::from(2));
        builder.finish()
    }

    #[test]
    fn test_resolved_recombination() {
        let tables = split_sample(Encoding::Resolved);
        assert_eq!(tables.nodes().len(), 3);
        for p in [1, 2] {
            let row = tables.nodes().row(Node::from(p)).unwrap();
            assert!(row.flags.is_recombination());
            assert_eq!(row.metadata.breakpoint, Some(3));
        }
        let edges = tables.edges().iter().map(edge_tuple).collect::<Vec<_>>();
        assert_eq!(edges, vec![(0, 3, 1, 0), (3, 10, 2, 0)]);
    }

    #[test]
    fn test_unresolved_recombination() {
        let tables = split_sample(Encoding::Unresolved);
        let edges = tables.edges().iter().map(edge_tuple).collect::<Vec<_>>();
        assert_eq!(
            edges,
            vec![
                (Edge::UNBOUNDED_LEFT, 3, 1, 0),
                (3, Edge::UNBOUNDED_RIGHT, 2, 0)
            ]
        );
    }

    //  a: [0, 4)
    //  b: [2,    10)
    #[test]
    fn test_common_ancestor_edges() {
        for encoding in [Encoding::Resolved, Encoding::Unresolved] {
            let mut builder = ArgBuilder::new(10, encoding).unwrap();
            assert_eq!(builder.encoding(), encoding);
            let a = builder.add_sample();
            let b = builder.add_sample();
            let a = Lineage::new(a, vec![AncestryInterval::new(0, 4, 1).unwrap()]).unwrap();
            let b = Lineage::new(b, vec![AncestryInterval::new(2, 10, 1).unwrap()]).unwrap();
            let merged = merge_ancestry(&[&a, &b]).collect::<Vec<_>>();
            let parent =
                builder.record_common_ancestor(1.0, NodeFlags::coalescence(), [&a, &b], &merged);
            let tables = builder.finish();
            let edges = tables
                .edges()
                .iter()
                .map(|e| (e.left, e.right, e.child.as_index()))
                .collect::<Vec<_>>();
            assert!(tables.edges().iter().all(|e| e.parent == parent));
            match encoding {
                Encoding::Resolved => assert_eq!(
                    edges,
                    vec![(0, 2, 0), (2, 4, 0), (2, 4, 1), (4, 10, 1)]
                ),
                Encoding::Unresolved => {
                    assert_eq!(edges.len(), 2);
                    assert!(tables.edges().iter().all(|e| e.is_unbounded()));
                }
            }
        }
    }
}
