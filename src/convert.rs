use crate::builder::record_lineage_edges;
use crate::builder::record_merged_edges;
use crate::lineage::Lineage;
use crate::lineage::LineageError;
use crate::segments::common_ancestor_flags;
use crate::segments::merge_ancestry;
use crate::segments::retained_ancestry;
use crate::tables::NodeRow;
use crate::tables::TableCollection;
use crate::tables::TableError;
use crate::Node;
use crate::NodeFlags;
use crate::NodeMap;

/// Reasons why an unresolved ARG cannot be converted.
///
/// All of these mean that the input is corrupt, or was
/// not produced by [`crate::simulate_unresolved`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("the node table contains no samples")]
    NoSamples,
    #[error("sample {0} is not at time zero or does not precede all other nodes")]
    MisplacedSample(Node),
    #[error("node {0} has no active lineage")]
    MissingLineage(Node),
    #[error("node {node}: recorded flags {recorded:?}, but its ancestry implies {computed:?}")]
    FlagMismatch {
        node: Node,
        recorded: NodeFlags,
        computed: NodeFlags,
    },
    #[error("recombination node {0} records no breakpoint")]
    MissingBreakpoint(Node),
    #[error("recombination nodes {left} and {right} record different breakpoints")]
    BreakpointMismatch { left: Node, right: Node },
    #[error("recombination node {0} is not followed by a second recombination node")]
    UnpairedRecombination(Node),
    #[error("recombination nodes {left} and {right} do not share their child")]
    RecombinationChildMismatch { left: Node, right: Node },
    #[error("node {node} has {found} children, expected {expected}")]
    WrongNumberOfChildren {
        node: Node,
        expected: usize,
        found: usize,
    },
    #[error("lineages of nodes {0:?} never reach a common ancestor")]
    UnresolvedLineages(Vec<Node>),
    #[error(transparent)]
    Lineage(#[from] LineageError),
    #[error(transparent)]
    Tables(#[from] TableError),
}

fn children_of<'c>(children: &'c NodeMap<Vec<Node>>, node: Node) -> &'c [Node] {
    children.get(&node).map_or(&[], |c| c.as_slice())
}

fn only_child(children: &NodeMap<Vec<Node>>, node: Node) -> Result<Node, ConversionError> {
    match children_of(children, node) {
        [child] => Ok(*child),
        other => Err(ConversionError::WrongNumberOfChildren {
            node,
            expected: 1,
            found: other.len(),
        }),
    }
}

fn take_lineage(lineages: &mut NodeMap<Lineage>, node: Node) -> Result<Lineage, ConversionError> {
    lineages
        .remove(&node)
        .ok_or(ConversionError::MissingLineage(node))
}

struct Converter<'t> {
    input: &'t TableCollection,
    output: TableCollection,
    // parent -> children, from the input edges
    children: NodeMap<Vec<Node>>,
    // The active lineages, keyed by their node.
    lineages: NodeMap<Lineage>,
    num_samples: usize,
}

impl<'t> Converter<'t> {
    fn new(input: &'t TableCollection) -> Self {
        let mut output = input.clone();
        output.clear_edges();
        let mut children = NodeMap::<Vec<Node>>::default();
        for edge in input.edges().iter() {
            children.entry(edge.parent).or_default().push(edge.child);
        }
        Self {
            input,
            output,
            children,
            lineages: NodeMap::default(),
            num_samples: 0,
        }
    }

    fn add_sample(&mut self, row: &NodeRow) -> Result<(), ConversionError> {
        if row.time != 0.0 {
            return Err(ConversionError::MisplacedSample(row.id));
        }
        let sequence_length = self.input.sequence_length();
        let lineage = Lineage::sample(row.id, sequence_length)
            .ok_or(TableError::InvalidSequenceLength(sequence_length))?;
        self.lineages.insert(row.id, lineage);
        self.num_samples += 1;
        Ok(())
    }

    fn recombination(&mut self, left: &NodeRow, right: &NodeRow) -> Result<(), ConversionError> {
        if !right.flags.is_recombination() {
            return Err(ConversionError::UnpairedRecombination(left.id));
        }
        let child = only_child(&self.children, left.id)?;
        if only_child(&self.children, right.id)? != child {
            return Err(ConversionError::RecombinationChildMismatch {
                left: left.id,
                right: right.id,
            });
        }
        let breakpoint = left
            .metadata
            .breakpoint
            .ok_or(ConversionError::MissingBreakpoint(left.id))?;
        if right.metadata.breakpoint != Some(breakpoint) {
            return Err(ConversionError::BreakpointMismatch {
                left: left.id,
                right: right.id,
            });
        }
        let mut left_lineage = take_lineage(&mut self.lineages, child)?;
        let mut right_lineage = left_lineage.split(breakpoint)?;
        left_lineage.set_node(left.id);
        right_lineage.set_node(right.id);
        record_lineage_edges(&mut self.output, left.id, child, left_lineage.ancestry());
        record_lineage_edges(&mut self.output, right.id, child, right_lineage.ancestry());
        self.lineages.insert(left.id, left_lineage);
        self.lineages.insert(right.id, right_lineage);
        Ok(())
    }

    fn common_ancestor(&mut self, row: &NodeRow) -> Result<(), ConversionError> {
        let (a, b) = match children_of(&self.children, row.id) {
            &[a, b] => (a, b),
            other => {
                return Err(ConversionError::WrongNumberOfChildren {
                    node: row.id,
                    expected: 2,
                    found: other.len(),
                })
            }
        };
        let a = take_lineage(&mut self.lineages, a)?;
        let b = take_lineage(&mut self.lineages, b)?;
        let merged = merge_ancestry(&[&a, &b]).collect::<Vec<_>>();
        let computed = common_ancestor_flags(&merged);
        if computed != row.flags {
            return Err(ConversionError::FlagMismatch {
                node: row.id,
                recorded: row.flags,
                computed,
            });
        }
        record_merged_edges(&mut self.output, row.id, &[&a, &b], &merged);
        if let Some(lineage) =
            Lineage::from_merged(row.id, retained_ancestry(&merged, self.num_samples))
        {
            self.lineages.insert(row.id, lineage);
        }
        Ok(())
    }

    fn run(mut self) -> Result<TableCollection, ConversionError> {
        let mut rows = self.input.nodes().iter().collect::<Vec<_>>();
        // Stable: the two parents of a recombination
        // have equal times and stay in order.
        rows.sort_by(|a, b| a.time.total_cmp(&b.time));
        let mut rows = rows.into_iter().peekable();

        while let Some(row) = rows.next_if(|row| row.flags.is_sample()) {
            self.add_sample(&row)?;
        }
        if self.num_samples == 0 {
            return Err(ConversionError::NoSamples);
        }
        while let Some(row) = rows.next() {
            if row.flags.is_sample() {
                return Err(ConversionError::MisplacedSample(row.id));
            } else if row.flags.is_recombination() {
                let right = rows
                    .next()
                    .ok_or(ConversionError::UnpairedRecombination(row.id))?;
                self.recombination(&row, &right)?;
            } else {
                self.common_ancestor(&row)?;
            }
        }
        if !self.lineages.is_empty() {
            let mut remaining = self.lineages.into_keys().collect::<Vec<_>>();
            remaining.sort_unstable();
            return Err(ConversionError::UnresolvedLineages(remaining));
        }
        self.output.sort();
        Ok(self.output)
    }
}

/// Reconstruct the resolved ARG from an unresolved one.
///
/// Nodes are visited in order of increasing time, replaying
/// each recombination and common ancestor event to recover
/// the ancestry of every lineage.
/// The output has the same nodes as the input and
/// sorted, interval-resolved edges.
pub fn convert_unresolved(tables: &TableCollection) -> Result<TableCollection, ConversionError> {
    Converter::new(tables).run()
}
