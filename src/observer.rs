use crate::scheduler::Event;
use crate::simulation::ValidatedParameters;
use crate::tables::TableCollection;
use crate::Lineage;
use crate::Node;
use crate::NodeFlags;

/// Hooks called by the simulation at event boundaries.
///
/// All methods default to doing nothing.
pub trait SimulationObserver {
    fn on_start(&mut self, _params: &ValidatedParameters) {}

    /// `child` recombined at `breakpoint`, giving the
    /// (left, right) parents.
    fn on_recombination(
        &mut self,
        _time: f64,
        _breakpoint: i64,
        _child: Node,
        _parents: (Node, Node),
    ) {
    }

    fn on_common_ancestor(
        &mut self,
        _time: f64,
        _parent: Node,
        _children: [Node; 2],
        _flags: NodeFlags,
    ) {
    }

    /// All of the ancestry of the lineage created at
    /// `node` has reached its most recent common ancestor.
    fn on_lineage_lost(&mut self, _time: f64, _node: Node) {}

    /// Called after every event with the
    /// updated set of active lineages.
    fn on_step(&mut self, _time: f64, _event: &Event, _lineages: &[Lineage]) {}

    fn on_finish(&mut self, _time: f64, _tables: &TableCollection) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {}

/// Reports progress through the [`log`] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SimulationObserver for LoggingObserver {
    fn on_start(&mut self, params: &ValidatedParameters) {
        log::info!(
            "simulating ARG: n = {}, rho = {}, L = {}, seed = {:?}",
            params.num_samples(),
            params.recombination_rate(),
            params.sequence_length(),
            params.seed()
        );
    }

    fn on_recombination(&mut self, time: f64, breakpoint: i64, child: Node, parents: (Node, Node)) {
        log::debug!(
            "t = {time:.6}: recombination of {child} at {breakpoint} -> ({}, {})",
            parents.0,
            parents.1
        );
    }

    fn on_common_ancestor(
        &mut self,
        time: f64,
        parent: Node,
        children: [Node; 2],
        flags: NodeFlags,
    ) {
        log::debug!(
            "t = {time:.6}: common ancestor {parent} of ({}, {}), flags = {}",
            children[0],
            children[1],
            flags.bits()
        );
    }

    fn on_lineage_lost(&mut self, time: f64, node: Node) {
        log::debug!("t = {time:.6}: lineage {node} has no remaining ancestry");
    }

    fn on_step(&mut self, time: f64, _event: &Event, lineages: &[Lineage]) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("t = {time:.6}, k = {}", lineages.len());
            for lineage in lineages {
                log::trace!("\t{lineage}");
            }
        }
    }

    fn on_finish(&mut self, time: f64, tables: &TableCollection) {
        log::info!(
            "simulation finished at t = {time:.6} with {} nodes and {} edges",
            tables.nodes().len(),
            tables.edges().len()
        );
    }
}

/// Counts events by kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventCounter {
    pub recombinations: usize,
    pub coalescences: usize,
    pub non_coalescing_ancestors: usize,
    pub lineages_lost: usize,
}

impl SimulationObserver for EventCounter {
    fn on_recombination(
        &mut self,
        _time: f64,
        _breakpoint: i64,
        _child: Node,
        _parents: (Node, Node),
    ) {
        self.recombinations += 1;
    }

    fn on_common_ancestor(
        &mut self,
        _time: f64,
        _parent: Node,
        _children: [Node; 2],
        flags: NodeFlags,
    ) {
        if flags.is_coalescence() {
            self.coalescences += 1;
        } else {
            self.non_coalescing_ancestors += 1;
        }
    }

    fn on_lineage_lost(&mut self, _time: f64, _node: Node) {
        self.lineages_lost += 1;
    }
}
