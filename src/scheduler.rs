use rand::distributions::Distribution;
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::Exp1;

use crate::Lineage;

/// The event chosen by one step of the simulation,
/// along with the waiting time until it happens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Recombination { waiting_time: f64 },
    CommonAncestor { waiting_time: f64 },
}

impl Event {
    pub fn waiting_time(&self) -> f64 {
        match self {
            Event::Recombination { waiting_time } | Event::CommonAncestor { waiting_time } => {
                *waiting_time
            }
        }
    }
}

/// Draw an exponential waiting time.
///
/// `None` means that the event never happens,
/// which is the case iff `rate` is not positive.
fn draw_waiting_time<R: Rng>(rate: f64, rng: &mut R) -> Option<f64> {
    if rate > 0.0 {
        let exp1: f64 = Exp1.sample(rng);
        Some(exp1 / rate)
    } else {
        None
    }
}

fn coalescence_rate(num_lineages: usize) -> f64 {
    if num_lineages < 2 {
        0.0
    } else {
        (num_lineages * (num_lineages - 1)) as f64 / 2.0
    }
}

/// Recombination wins ties.
fn choose_event(t_re: Option<f64>, t_ca: Option<f64>) -> Option<Event> {
    match (t_re, t_ca) {
        (None, None) => None,
        (Some(waiting_time), None) => Some(Event::Recombination { waiting_time }),
        (None, Some(waiting_time)) => Some(Event::CommonAncestor { waiting_time }),
        (Some(re), Some(ca)) => {
            if re <= ca {
                Some(Event::Recombination { waiting_time: re })
            } else {
                Some(Event::CommonAncestor { waiting_time: ca })
            }
        }
    }
}

/// Competing exponential clocks for recombination
/// and common ancestor events.
#[derive(Debug, Default)]
pub(crate) struct EventScheduler {
    // Recombination links per lineage,
    // as of the last call to next_event.
    // Stored as f64: the sum over lineages
    // can exceed u64::MAX for long genomes.
    links: Vec<f64>,
}

impl EventScheduler {
    /// Returns `None` if neither kind of event can happen.
    pub(crate) fn next_event<R: Rng>(
        &mut self,
        lineages: &[Lineage],
        recombination_rate: f64,
        rng: &mut R,
    ) -> Option<Event> {
        self.links.clear();
        self.links
            .extend(lineages.iter().map(|l| l.num_recombination_links() as f64));
        let total_links: f64 = self.links.iter().sum();
        let t_re = draw_waiting_time(total_links * recombination_rate, rng);
        let t_ca = draw_waiting_time(coalescence_rate(lineages.len()), rng);
        choose_event(t_re, t_ca)
    }

    /// Pick a lineage with probability proportional
    /// to its number of links.
    ///
    /// Returns `None` if no lineage has any links.
    pub(crate) fn choose_recombining_lineage<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        let weights = WeightedIndex::new(&self.links).ok()?;
        Some(weights.sample(rng))
    }
}

/// Uniform over the positions strictly inside
/// the lineage's span.
///
/// Returns `None` for a lineage without links.
pub(crate) fn choose_breakpoint<R: Rng>(lineage: &Lineage, rng: &mut R) -> Option<i64> {
    if lineage.num_recombination_links() == 0 {
        None
    } else {
        Some(rng.gen_range(lineage.left() + 1..lineage.right()))
    }
}

/// Remove two distinct lineages, chosen uniformly.
pub(crate) fn remove_pair<R: Rng>(
    lineages: &mut Vec<Lineage>,
    rng: &mut R,
) -> Option<(Lineage, Lineage)> {
    if lineages.len() < 2 {
        return None;
    }
    let a = lineages.swap_remove(rng.gen_range(0..lineages.len()));
    let b = lineages.swap_remove(rng.gen_range(0..lineages.len()));
    Some((a, b))
}
