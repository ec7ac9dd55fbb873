use serde::Deserialize;
use serde::Serialize;

use crate::Node;
use crate::NodeFlags;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("sequence length must be positive, got {0}")]
    InvalidSequenceLength(i64),
    #[error("edge {edge} refers to node {node}, which does not exist")]
    NodeOutOfRange { edge: usize, node: Node },
    #[error("edge {edge} has left >= right: [{left}, {right})")]
    InvalidInterval { edge: usize, left: i64, right: i64 },
    #[error("edge {edge} spans [{left}, {right}), outside of [0, {sequence_length})")]
    IntervalOutOfBounds {
        edge: usize,
        left: i64,
        right: i64,
        sequence_length: i64,
    },
    #[error("edge {edge}: parent {parent} is not older than child {child}")]
    ParentNotOlder {
        edge: usize,
        parent: Node,
        child: Node,
    },
    #[error("node {node} has invalid time {time}")]
    InvalidTime { node: Node, time: f64 },
}

/// Per-node metadata.
///
/// Recombination nodes record their breakpoint, so that
/// unresolved ARGs can be converted later.
/// Serializes as `{"breakpoint": 5}` or `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoint: Option<i64>,
}

impl NodeMetadata {
    pub fn with_breakpoint(breakpoint: i64) -> Self {
        Self {
            breakpoint: Some(breakpoint),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRow {
    pub id: Node,
    pub time: f64,
    pub flags: NodeFlags,
    pub metadata: NodeMetadata,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeTable {
    time: Vec<f64>,
    flags: Vec<NodeFlags>,
    metadata: Vec<NodeMetadata>,
}

impl NodeTable {
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.time.len(), self.flags.len());
        debug_assert_eq!(self.time.len(), self.metadata.len());
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_row(&mut self, time: f64, flags: NodeFlags, metadata: NodeMetadata) -> Node {
        self.time.push(time);
        self.flags.push(flags);
        self.metadata.push(metadata);
        Node(self.time.len() - 1)
    }

    pub fn time(&self, node: Node) -> Option<f64> {
        self.time.get(node.as_index()).copied()
    }

    pub fn flags(&self, node: Node) -> Option<NodeFlags> {
        self.flags.get(node.as_index()).copied()
    }

    pub fn metadata(&self, node: Node) -> Option<&NodeMetadata> {
        self.metadata.get(node.as_index())
    }

    pub fn row(&self, node: Node) -> Option<NodeRow> {
        let i = node.as_index();
        Some(NodeRow {
            id: node,
            time: *self.time.get(i)?,
            flags: *self.flags.get(i)?,
            metadata: *self.metadata.get(i)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeRow> + '_ {
        (0..self.len()).filter_map(|i| self.row(Node(i)))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Edge {
    pub left: i64,
    pub right: i64,
    pub parent: Node,
    pub child: Node,
}

impl Edge {
    /// Left coordinate of an edge reaching the
    /// start of the genome in an unresolved ARG.
    pub const UNBOUNDED_LEFT: i64 = i64::MIN;
    /// Right coordinate of an edge reaching the
    /// end of the genome in an unresolved ARG.
    pub const UNBOUNDED_RIGHT: i64 = i64::MAX;

    pub fn is_unbounded(&self) -> bool {
        self.left == Self::UNBOUNDED_LEFT || self.right == Self::UNBOUNDED_RIGHT
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdgeTable {
    left: Vec<i64>,
    right: Vec<i64>,
    parent: Vec<Node>,
    child: Vec<Node>,
}

impl EdgeTable {
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.left.len(), self.right.len());
        debug_assert_eq!(self.left.len(), self.parent.len());
        debug_assert_eq!(self.left.len(), self.child.len());
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
        self.parent.clear();
        self.child.clear();
    }

    pub fn add_row(&mut self, left: i64, right: i64, parent: Node, child: Node) {
        self.left.push(left);
        self.right.push(right);
        self.parent.push(parent);
        self.child.push(child);
    }

    pub fn get(&self, row: usize) -> Option<Edge> {
        Some(Edge {
            left: *self.left.get(row)?,
            right: *self.right.get(row)?,
            parent: *self.parent.get(row)?,
            child: *self.child.get(row)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// A node table and an edge table describing an ARG
/// over a genome of length `sequence_length`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCollection {
    sequence_length: i64,
    nodes: NodeTable,
    edges: EdgeTable,
}

impl TableCollection {
    pub fn new(sequence_length: i64) -> Result<Self, TableError> {
        if sequence_length < 1 {
            return Err(TableError::InvalidSequenceLength(sequence_length));
        }
        Ok(Self {
            sequence_length,
            nodes: NodeTable::default(),
            edges: EdgeTable::default(),
        })
    }

    pub fn sequence_length(&self) -> i64 {
        self.sequence_length
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    pub fn add_node(&mut self, time: f64, flags: NodeFlags, metadata: NodeMetadata) -> Node {
        self.nodes.add_row(time, flags, metadata)
    }

    // NOTE: no validation happens here.
    // See freeze.
    pub fn add_edge(&mut self, left: i64, right: i64, parent: Node, child: Node) {
        self.edges.add_row(left, right, parent, child)
    }

    pub(crate) fn clear_edges(&mut self) {
        self.edges.clear()
    }

    /// Sort edges by parent time, then parent id,
    /// then child id, then left coordinate.
    ///
    /// Edges referring to missing nodes sort last.
    pub fn sort(&mut self) {
        let time = |node: Node| self.nodes.time(node).unwrap_or(f64::INFINITY);
        let edges = &self.edges;
        let mut order = (0..edges.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            time(edges.parent[a])
                .total_cmp(&time(edges.parent[b]))
                .then(edges.parent[a].cmp(&edges.parent[b]))
                .then(edges.child[a].cmp(&edges.child[b]))
                .then(edges.left[a].cmp(&edges.left[b]))
        });
        let mut sorted = EdgeTable::default();
        for e in order.into_iter().filter_map(|i| edges.get(i)) {
            sorted.add_row(e.left, e.right, e.parent, e.child);
        }
        self.edges = sorted;
    }

    /// Sort and validate the tables, and index
    /// the edges by parent and by child.
    pub fn freeze(mut self) -> Result<FrozenArg, TableError> {
        self.sort();
        for row in self.nodes.iter() {
            if !(row.time.is_finite() && row.time >= 0.0) {
                return Err(TableError::InvalidTime {
                    node: row.id,
                    time: row.time,
                });
            }
        }
        let num_nodes = self.nodes.len();
        let mut child_edges = vec![vec![]; num_nodes];
        let mut parent_edges = vec![vec![]; num_nodes];
        for (i, e) in self.edges.iter().enumerate() {
            for node in [e.parent, e.child] {
                if node.as_index() >= num_nodes {
                    return Err(TableError::NodeOutOfRange { edge: i, node });
                }
            }
            if e.left >= e.right {
                return Err(TableError::InvalidInterval {
                    edge: i,
                    left: e.left,
                    right: e.right,
                });
            }
            if e.left < 0 || e.right > self.sequence_length {
                return Err(TableError::IntervalOutOfBounds {
                    edge: i,
                    left: e.left,
                    right: e.right,
                    sequence_length: self.sequence_length,
                });
            }
            if self.nodes.time[e.parent.as_index()] <= self.nodes.time[e.child.as_index()] {
                return Err(TableError::ParentNotOlder {
                    edge: i,
                    parent: e.parent,
                    child: e.child,
                });
            }
            child_edges[e.parent.as_index()].push(i);
            parent_edges[e.child.as_index()].push(i);
        }
        Ok(FrozenArg {
            tables: self,
            child_edges,
            parent_edges,
        })
    }
}

fn format_position(x: i64) -> String {
    match x {
        Edge::UNBOUNDED_LEFT => "-inf".to_owned(),
        Edge::UNBOUNDED_RIGHT => "inf".to_owned(),
        x => x.to_string(),
    }
}

impl std::fmt::Display for TableCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "sequence_length = {}", self.sequence_length)?;
        writeln!(f, "label\ttime\tflags\tbreakpoint")?;
        for row in self.nodes.iter() {
            let label = if row.flags.is_recombination() {
                format!("R{}", row.id)
            } else if row.flags.is_non_coalescing() {
                format!("N{}", row.id)
            } else {
                row.id.to_string()
            };
            let breakpoint = row
                .metadata
                .breakpoint
                .map_or_else(|| "-".to_owned(), |b| b.to_string());
            writeln!(
                f,
                "{label}\t{:.6}\t{}\t{breakpoint}",
                row.time,
                row.flags.bits()
            )?;
        }
        writeln!(f, "left\tright\tparent\tchild")?;
        for e in self.edges.iter() {
            writeln!(
                f,
                "{}\t{}\t{}\t{}",
                format_position(e.left),
                format_position(e.right),
                e.parent,
                e.child
            )?;
        }
        Ok(())
    }
}

/// A validated, read-only ARG.
///
/// Obtained from [`TableCollection::freeze`].
#[derive(Debug)]
pub struct FrozenArg {
    tables: TableCollection,
    // Row indexes into the edge table,
    // indexed by parent and child, respectively.
    child_edges: Vec<Vec<usize>>,
    parent_edges: Vec<Vec<usize>>,
}

impl FrozenArg {
    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    pub fn into_tables(self) -> TableCollection {
        self.tables
    }

    pub fn num_nodes(&self) -> usize {
        self.tables.nodes.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = Node> + '_ {
        self.tables
            .nodes
            .iter()
            .filter(|row| row.flags.is_sample())
            .map(|row| row.id)
    }

    /// Nodes that are not the child of any edge.
    pub fn roots(&self) -> impl Iterator<Item = Node> + '_ {
        self.parent_edges
            .iter()
            .enumerate()
            .filter_map(|(i, p)| if p.is_empty() { Some(Node(i)) } else { None })
    }

    /// Edges in which `node` is the parent.
    ///
    /// # Panics
    ///
    /// If `node` is out of range.
    pub fn child_edges(&self, node: Node) -> impl Iterator<Item = Edge> + '_ {
        self.child_edges[node.as_index()]
            .iter()
            .filter_map(|&i| self.tables.edges.get(i))
    }

    /// Edges in which `node` is the child.
    ///
    /// # Panics
    ///
    /// If `node` is out of range.
    pub fn parent_edges(&self, node: Node) -> impl Iterator<Item = Edge> + '_ {
        self.parent_edges[node.as_index()]
            .iter()
            .filter_map(|&i| self.tables.edges.get(i))
    }
}
