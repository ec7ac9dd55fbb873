use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde::Serialize;

use crate::builder::ArgBuilder;
use crate::builder::Encoding;
use crate::lineage::Lineage;
use crate::lineage::LineageError;
use crate::observer::LoggingObserver;
use crate::observer::SimulationObserver;
use crate::scheduler;
use crate::scheduler::Event;
use crate::scheduler::EventScheduler;
use crate::segments::common_ancestor_flags;
use crate::segments::merge_ancestry;
use crate::segments::retained_ancestry;
use crate::tables::TableCollection;
use crate::tables::TableError;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("at least two samples are required, got {0}")]
    TooFewSamples(usize),
    #[error("recombination rate must be finite and non-negative, got {0}")]
    InvalidRecombinationRate(f64),
    #[error("sequence length must be positive, got {0}")]
    InvalidSequenceLength(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    #[error(transparent)]
    Tables(#[from] TableError),
    #[error(transparent)]
    Lineage(#[from] LineageError),
    #[error("a lineage without recombination links was chosen to recombine")]
    NoRecombinationLinks,
    #[error("{num_lineages} lineage(s) remain but no event can happen")]
    Stalled { num_lineages: usize },
}

/// Input parameters of a simulation.
///
/// Can be deserialized, e.g. from JSON:
/// `{"num_samples": 5, "recombination_rate": 0.3, "sequence_length": 10}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgParameters {
    pub num_samples: usize,
    /// Per unit of genome length, per unit of time.
    pub recombination_rate: f64,
    pub sequence_length: i64,
    /// Random number seed. If `None`, the
    /// generator is seeded from system entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ArgParameters {
    pub fn new(num_samples: usize, recombination_rate: f64, sequence_length: i64) -> Self {
        Self {
            num_samples,
            recombination_rate,
            sequence_length,
            seed: None,
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    pub fn validate(&self) -> Result<ValidatedParameters, ParameterError> {
        if self.num_samples < 2 {
            return Err(ParameterError::TooFewSamples(self.num_samples));
        }
        if !(self.recombination_rate.is_finite() && self.recombination_rate >= 0.0) {
            return Err(ParameterError::InvalidRecombinationRate(
                self.recombination_rate,
            ));
        }
        if self.sequence_length < 1 {
            return Err(ParameterError::InvalidSequenceLength(self.sequence_length));
        }
        Ok(ValidatedParameters(*self))
    }
}

/// [`ArgParameters`] that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedParameters(ArgParameters);

impl ValidatedParameters {
    pub fn num_samples(&self) -> usize {
        self.0.num_samples
    }

    pub fn recombination_rate(&self) -> f64 {
        self.0.recombination_rate
    }

    pub fn sequence_length(&self) -> i64 {
        self.0.sequence_length
    }

    pub fn seed(&self) -> Option<u64> {
        self.0.seed
    }
}

/// All of the state of one realization of the process.
#[derive(Debug)]
pub struct SimulationContext {
    params: ValidatedParameters,
    rng: StdRng,
    time: f64,
    lineages: Vec<Lineage>,
    scheduler: EventScheduler,
    builder: ArgBuilder,
}

impl SimulationContext {
    /// Add one sample node per sample, each
    /// ancestral to itself over the whole genome.
    pub fn new(params: ValidatedParameters, encoding: Encoding) -> Result<Self, SimulationError> {
        let rng = match params.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let sequence_length = params.sequence_length();
        let mut builder = ArgBuilder::new(sequence_length, encoding)?;
        let mut lineages = Vec::with_capacity(params.num_samples());
        for _ in 0..params.num_samples() {
            let node = builder.add_sample();
            let lineage = Lineage::sample(node, sequence_length)
                .ok_or(ParameterError::InvalidSequenceLength(sequence_length))?;
            lineages.push(lineage);
        }
        Ok(Self {
            params,
            rng,
            time: 0.0,
            lineages,
            scheduler: EventScheduler::default(),
            builder,
        })
    }

    pub fn params(&self) -> &ValidatedParameters {
        &self.params
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn lineages(&self) -> &[Lineage] {
        &self.lineages
    }

    pub fn tables(&self) -> &TableCollection {
        self.builder.tables()
    }

    pub fn is_done(&self) -> bool {
        self.lineages.is_empty()
    }

    /// Simulate the next event.
    ///
    /// Returns `Ok(None)` once no lineages remain.
    pub fn step<O: SimulationObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> Result<Option<Event>, SimulationError> {
        if self.is_done() {
            return Ok(None);
        }
        let recombination_rate = self.params.recombination_rate();
        let event = self
            .scheduler
            .next_event(&self.lineages, recombination_rate, &mut self.rng)
            .ok_or(SimulationError::Stalled {
                num_lineages: self.lineages.len(),
            })?;
        self.time += event.waiting_time();
        match event {
            Event::Recombination { .. } => self.recombine(observer)?,
            Event::CommonAncestor { .. } => self.common_ancestor(observer)?,
        }
        observer.on_step(self.time, &event, &self.lineages);
        Ok(Some(event))
    }

    fn recombine<O: SimulationObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> Result<(), SimulationError> {
        let index = self
            .scheduler
            .choose_recombining_lineage(&mut self.rng)
            .ok_or(SimulationError::NoRecombinationLinks)?;
        let breakpoint = scheduler::choose_breakpoint(&self.lineages[index], &mut self.rng)
            .ok_or(SimulationError::NoRecombinationLinks)?;
        let child = self.lineages[index].node();
        let mut right = self.lineages[index].split(breakpoint)?;
        let (left_parent, right_parent) = self.builder.record_recombination(
            self.time,
            breakpoint,
            &self.lineages[index],
            &right,
        );
        self.lineages[index].set_node(left_parent);
        right.set_node(right_parent);
        self.lineages.push(right);
        observer.on_recombination(self.time, breakpoint, child, (left_parent, right_parent));
        Ok(())
    }

    fn common_ancestor<O: SimulationObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> Result<(), SimulationError> {
        let num_lineages = self.lineages.len();
        let (a, b) = scheduler::remove_pair(&mut self.lineages, &mut self.rng)
            .ok_or(SimulationError::Stalled { num_lineages })?;
        let merged = merge_ancestry(&[&a, &b]).collect::<Vec<_>>();
        let flags = common_ancestor_flags(&merged);
        let ancestry = retained_ancestry(&merged, self.params.num_samples());
        let parent = self
            .builder
            .record_common_ancestor(self.time, flags, [&a, &b], &merged);
        observer.on_common_ancestor(self.time, parent, [a.node(), b.node()], flags);
        match Lineage::from_merged(parent, ancestry) {
            Some(lineage) => self.lineages.push(lineage),
            None => observer.on_lineage_lost(self.time, parent),
        }
        Ok(())
    }

    /// Simulate until no lineages remain and
    /// return the sorted tables.
    pub fn run<O: SimulationObserver + ?Sized>(
        mut self,
        observer: &mut O,
    ) -> Result<TableCollection, SimulationError> {
        observer.on_start(&self.params);
        while self.step(observer)?.is_some() {}
        let time = self.time;
        let tables = self.builder.finish();
        observer.on_finish(time, &tables);
        Ok(tables)
    }
}

/// Simulate an ARG, logging progress via [`LoggingObserver`].
pub fn simulate(
    params: &ArgParameters,
    encoding: Encoding,
) -> Result<TableCollection, SimulationError> {
    simulate_with_observer(params, encoding, &mut LoggingObserver)
}

pub fn simulate_with_observer<O: SimulationObserver + ?Sized>(
    params: &ArgParameters,
    encoding: Encoding,
    observer: &mut O,
) -> Result<TableCollection, SimulationError> {
    let params = params.validate()?;
    SimulationContext::new(params, encoding)?.run(observer)
}

/// Simulate an ARG in which every edge
/// records the interval it transmits.
///
/// NOTE: the distribution of the output has not
/// been checked against coalescent theory.
pub fn simulate_resolved(params: &ArgParameters) -> Result<TableCollection, SimulationError> {
    simulate(params, Encoding::Resolved)
}

/// Simulate an ARG recording only topology and
/// recombination breakpoints.
///
/// For a given seed, [`crate::convert_unresolved`] maps the
/// output to that of [`simulate_resolved`].
pub fn simulate_unresolved(params: &ArgParameters) -> Result<TableCollection, SimulationError> {
    simulate(params, Encoding::Unresolved)
}

#[cfg(test)]
mod test_parameters {
    use super::*;

    #[test]
    fn test_validation() {
        assert_eq!(
            ArgParameters::new(1, 0.0, 10).validate(),
            Err(ParameterError::TooFewSamples(1))
        );
        assert!(matches!(
            ArgParameters::new(2, -0.1, 10).validate(),
            Err(ParameterError::InvalidRecombinationRate(_))
        ));
        assert!(matches!(
            ArgParameters::new(2, f64::NAN, 10).validate(),
            Err(ParameterError::InvalidRecombinationRate(_))
        ));
        assert_eq!(
            ArgParameters::new(2, 0.0, 0).validate(),
            Err(ParameterError::InvalidSequenceLength(0))
        );
        let params = ArgParameters::new(2, 0.0, 1).with_seed(5);
        assert_eq!(params.validate().unwrap().seed(), Some(5));
    }

    #[test]
    fn test_invalid_parameters_fail_before_simulating() {
        let mut counter = crate::EventCounter::default();
        let rv = simulate_with_observer(
            &ArgParameters::new(0, 1.0, 10),
            Encoding::Resolved,
            &mut counter,
        );
        assert!(matches!(
            rv.unwrap_err(),
            SimulationError::Parameters(ParameterError::TooFewSamples(0))
        ));
        assert_eq!(counter, crate::EventCounter::default());
    }

    #[test]
    fn test_from_json() {
        let params: ArgParameters = serde_json::from_str(
            r#"{"num_samples": 5, "recombination_rate": 0.3, "sequence_length": 10}"#,
        )
        .unwrap();
        assert_eq!(params, ArgParameters::new(5, 0.3, 10));
        let params: ArgParameters = serde_json::from_str(
            r#"{"num_samples": 5, "recombination_rate": 0.3, "sequence_length": 10, "seed": 3}"#,
        )
        .unwrap();
        assert_eq!(params.seed, Some(3));
        let unknown =
            r#"{"num_samples": 5, "recombination_rate": 0.3, "sequence_length": 10, "theta": 1}"#;
        assert!(serde_json::from_str::<ArgParameters>(unknown).is_err());
    }
}

#[cfg(test)]
mod test_simulation {
    use super::*;
    use crate::EventCounter;
    use crate::GenomicInterval;

    // Checks the lineage invariants after every event.
    #[derive(Default)]
    struct InvariantChecker {
        num_samples: usize,
        steps: usize,
        last_time: f64,
    }

    impl SimulationObserver for InvariantChecker {
        fn on_step(&mut self, time: f64, _event: &Event, lineages: &[Lineage]) {
            self.steps += 1;
            assert!(time >= self.last_time);
            self.last_time = time;
            for lineage in lineages {
                assert!(lineage.is_sorted_and_disjoint(), "{lineage}");
                assert!(!lineage.ancestry().is_empty());
                for interval in lineage.ancestry() {
                    assert!(interval.ancestral_to() < self.num_samples, "{lineage}");
                }
            }
            // Ancestral material is conserved: any position still
            // carried by some lineage is ancestral to all samples
            // when summed over the active lineages.
            let active = lineages.iter().collect::<Vec<_>>();
            for m in merge_ancestry(&active) {
                assert_eq!(m.interval().ancestral_to(), self.num_samples);
            }
        }
    }

    #[test]
    fn test_two_samples_without_recombination() {
        let params = ArgParameters::new(2, 0.0, 10).with_seed(1);
        let mut counter = EventCounter::default();
        let tables = simulate_with_observer(&params, Encoding::Resolved, &mut counter).unwrap();
        assert_eq!(counter.coalescences, 1);
        assert_eq!(counter.recombinations, 0);
        assert_eq!(counter.lineages_lost, 1);
        assert_eq!(tables.nodes().len(), 3);
        assert_eq!(tables.edges().len(), 2);
        for e in tables.edges().iter() {
            assert_eq!((e.left, e.right), (0, 10));
        }
    }

    #[test]
    fn test_invariants_hold_at_every_step() {
        for seed in 1..50 {
            let params = ArgParameters::new(5, 0.3, 10).with_seed(seed);
            let mut checker = InvariantChecker {
                num_samples: 5,
                ..Default::default()
            };
            let tables = simulate_with_observer(&params, Encoding::Resolved, &mut checker).unwrap();
            assert_eq!(
                tables.nodes().len() - 5,
                checker.steps + num_recombination_events(&tables)
            );
        }
    }

    // Each recombination event adds two nodes.
    fn num_recombination_events(tables: &TableCollection) -> usize {
        tables
            .nodes()
            .iter()
            .filter(|row| row.flags.is_recombination())
            .count()
            / 2
    }

    #[test]
    fn test_step_by_step() {
        let params = ArgParameters::new(3, 0.5, 20).with_seed(11);
        let validated = params.validate().unwrap();
        let mut context = SimulationContext::new(validated, Encoding::Resolved).unwrap();
        assert_eq!(context.params().num_samples(), 3);
        assert_eq!(context.params().sequence_length(), 20);
        assert_eq!(context.time(), 0.0);
        assert_eq!(context.lineages().len(), 3);
        assert_eq!(context.tables().nodes().len(), 3);
        for l in context.lineages() {
            assert_eq!(l.ancestry()[0].range(), (0, 20));
        }
        let mut observer = crate::NoopObserver;
        let mut num_events = 0;
        let mut last_time = context.time();
        while let Some(event) = context.step(&mut observer).unwrap() {
            assert!(event.waiting_time() >= 0.0);
            assert_eq!(context.time(), last_time + event.waiting_time());
            last_time = context.time();
            num_events += 1;
        }
        assert!(context.is_done());
        assert!(num_events >= 2);
        assert!(context.step(&mut observer).unwrap().is_none());
    }

    #[test]
    fn test_resolved_and_unresolved_share_nodes() {
        let params = ArgParameters::new(4, 0.5, 15).with_seed(8);
        let resolved = simulate_resolved(&params).unwrap();
        let unresolved = simulate_unresolved(&params).unwrap();
        assert_eq!(resolved.nodes(), unresolved.nodes());
        assert!(unresolved.edges().iter().all(|e| e.is_unbounded()));
        assert!(resolved.edges().iter().all(|e| !e.is_unbounded()));
    }
}
