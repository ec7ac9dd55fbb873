use crate::lineage::Lineage;
use crate::NodeFlags;

pub trait GenomicInterval {
    fn left(&self) -> i64;
    fn right(&self) -> i64;

    fn range(&self) -> (i64, i64) {
        (self.left(), self.right())
    }

    fn overlaps<T: GenomicInterval>(&self, other: &T) -> bool {
        self.right() > other.left() && other.right() > self.left()
    }
}

/// A half-open interval `[left, right)` of genome that is
/// ancestral to `ancestral_to` of the original samples.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AncestryInterval {
    left: i64,
    right: i64,
    ancestral_to: usize,
}

impl AncestryInterval {
    /// Returns `None` unless `left < right` and `ancestral_to > 0`.
    pub fn new(left: i64, right: i64, ancestral_to: usize) -> Option<Self> {
        if right > left && ancestral_to > 0 {
            Some(Self {
                left,
                right,
                ancestral_to,
            })
        } else {
            None
        }
    }

    pub fn ancestral_to(&self) -> usize {
        self.ancestral_to
    }

    // NOTE: callers guarantee that the result
    // is non-empty.
    pub(crate) fn with_right(self, right: i64) -> Self {
        debug_assert!(right > self.left);
        Self { right, ..self }
    }

    pub(crate) fn with_left(self, left: i64) -> Self {
        debug_assert!(left < self.right);
        Self { left, ..self }
    }
}

impl GenomicInterval for AncestryInterval {
    fn left(&self) -> i64 {
        self.left
    }
    fn right(&self) -> i64 {
        self.right
    }
}

/// Sweeps over a set of intervals from left to right,
/// reporting each maximal sub-interval over which the
/// set of overlapping inputs is constant.
///
/// Gaps not covered by any input are skipped.
/// Once exhausted, an `Overlapper` keeps returning `None`.
#[derive(Debug)]
pub struct Overlapper<T> {
    segments: Vec<T>,
    // Index of the first segment not yet
    // moved into `overlaps`.
    next_segment: usize,
    overlaps: Vec<T>,
    left: i64,
    right: i64,
}

impl<T: GenomicInterval + Clone> Overlapper<T> {
    pub fn new(mut segments: Vec<T>) -> Self {
        // Stable, so that ties enter the overlaps
        // in input order.
        segments.sort_by_key(|s| s.left());
        let right = segments.first().map_or(0, |s| s.left());
        Self {
            segments,
            next_segment: 0,
            overlaps: vec![],
            left: right,
            right,
        }
    }

    /// # Complexity
    ///
    /// `O(k)` per call, where `k` is the number of
    /// currently overlapping segments.
    pub fn calculate_next_overlap_set(&mut self) -> Option<(i64, i64, &[T])> {
        self.left = self.right;
        let left = self.left;
        self.overlaps.retain(|o| o.right() > left);
        if self.overlaps.is_empty() {
            // Nothing spans the current position:
            // jump to the next unvisited segment, if any.
            self.left = self.segments.get(self.next_segment)?.left();
        }
        while let Some(segment) = self.segments.get(self.next_segment) {
            if segment.left() != self.left {
                break;
            }
            self.overlaps.push(segment.clone());
            self.next_segment += 1;
        }
        // Cannot fail: we either retained something
        // or just pushed at least one segment.
        self.right = self.overlaps.iter().map(|o| o.right()).min()?;
        if let Some(segment) = self.segments.get(self.next_segment) {
            self.right = std::cmp::min(self.right, segment.left());
        }
        debug_assert!(self.left < self.right);
        Some((self.left, self.right, &self.overlaps))
    }
}

/// Partition the union of `segments` into maximal
/// sub-intervals with a constant set of overlapping inputs.
pub fn overlapping_segments<T, I>(segments: I) -> Overlapper<T>
where
    T: GenomicInterval + Clone,
    I: IntoIterator<Item = T>,
{
    Overlapper::new(segments.into_iter().collect())
}

#[derive(Debug, Copy, Clone)]
struct TaggedInterval {
    interval: AncestryInterval,
    lineage: usize,
}

impl GenomicInterval for TaggedInterval {
    fn left(&self) -> i64 {
        self.interval.left
    }
    fn right(&self) -> i64 {
        self.interval.right
    }
}

/// One output interval of [`merge_ancestry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedInterval {
    interval: AncestryInterval,
    contributors: Vec<usize>,
}

impl MergedInterval {
    pub fn interval(&self) -> AncestryInterval {
        self.interval
    }

    /// Indexes, into the input of [`merge_ancestry`],
    /// of the lineages carrying ancestry over this interval,
    /// in increasing order.
    pub fn contributors(&self) -> &[usize] {
        &self.contributors
    }

    /// `true` if more than one lineage contributed.
    pub fn is_coalescence(&self) -> bool {
        self.contributors.len() > 1
    }
}

impl GenomicInterval for MergedInterval {
    fn left(&self) -> i64 {
        self.interval.left
    }
    fn right(&self) -> i64 {
        self.interval.right
    }
}

/// Iterator returned by [`merge_ancestry`].
#[derive(Debug)]
pub struct MergeAncestry {
    overlapper: Overlapper<TaggedInterval>,
}

impl Iterator for MergeAncestry {
    type Item = MergedInterval;

    fn next(&mut self) -> Option<Self::Item> {
        let (left, right, overlaps) = self.overlapper.calculate_next_overlap_set()?;
        let ancestral_to = overlaps.iter().map(|o| o.interval.ancestral_to).sum();
        let mut contributors = overlaps.iter().map(|o| o.lineage).collect::<Vec<_>>();
        // Overlaps are in order of entry, not of lineage.
        contributors.sort_unstable();
        contributors.dedup();
        Some(MergedInterval {
            interval: AncestryInterval {
                left,
                right,
                ancestral_to,
            },
            contributors,
        })
    }
}

/// Overlay the ancestry of `lineages`.
///
/// For each maximal interval of the union of their ancestry,
/// the output sums `ancestral_to` over the contributing
/// intervals and lists the contributing lineages.
pub fn merge_ancestry(lineages: &[&Lineage]) -> MergeAncestry {
    let segments = lineages
        .iter()
        .enumerate()
        .flat_map(|(lineage, l)| {
            l.ancestry()
                .iter()
                .map(move |&interval| TaggedInterval { interval, lineage })
        });
    MergeAncestry {
        overlapper: overlapping_segments(segments),
    }
}

/// Flags of a common ancestor with merged ancestry `merged`:
/// a coalescence if any interval had two contributors.
pub(crate) fn common_ancestor_flags(merged: &[MergedInterval]) -> NodeFlags {
    if merged.iter().any(|m| m.is_coalescence()) {
        NodeFlags::coalescence()
    } else {
        NodeFlags::non_coalescing()
    }
}

/// Drop intervals that are ancestral to all `num_samples`.
///
/// Such intervals have found their most recent common
/// ancestor and are no longer tracked.
pub(crate) fn retained_ancestry(
    merged: &[MergedInterval],
    num_samples: usize,
) -> Vec<AncestryInterval> {
    merged
        .iter()
        .map(|m| m.interval)
        .filter(|i| i.ancestral_to < num_samples)
        .collect()
}


#[cfg(test)]
mod test_merge_ancestry {
    use super::*;
    use crate::Node;

    fn lineage(node: usize, intervals: &[(i64, i64, usize)]) -> Lineage {
        Lineage::new(
            Node::from(node),
            intervals
                .iter()
                .map(|&(l, r, a)| AncestryInterval::new(l, r, a).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_intervals() {
        assert!(AncestryInterval::new(1, 1, 1).is_none());
        assert!(AncestryInterval::new(2, 1, 1).is_none());
        assert!(AncestryInterval::new(0, 1, 0).is_none());
    }

    #[test]
    fn test_full_overlap_sums_coverage() {
        let a = lineage(0, &[(0, 10, 1)]);
        let b = lineage(1, &[(0, 10, 1)]);
        let merged = merge_ancestry(&[&a, &b]).collect::<Vec<_>>();
        assert_eq!(merged.len(), 1);
        let covered_twice = AncestryInterval::new(0, 10, 2).unwrap();
        assert_eq!(merged[0].interval(), covered_twice);
        assert_eq!(merged[0].contributors(), &[0, 1]);
        assert!(merged[0].is_coalescence());
    }

    // a: [0, 4)x1       [6, 10)x2
    // b:       [4, 8)x1
    #[test]
    fn test_partial_overlap() {
        let a = lineage(0, &[(0, 4, 1), (6, 10, 2)]);
        let b = lineage(1, &[(4, 8, 1)]);
        let merged = merge_ancestry(&[&a, &b]).collect::<Vec<_>>();
        let summary = merged
            .iter()
            .map(|m| {
                (
                    m.interval().left(),
                    m.interval().right(),
                    m.interval().ancestral_to(),
                    m.contributors().to_vec(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                (0, 4, 1, vec![0]),
                (4, 6, 1, vec![1]),
                (6, 8, 3, vec![0, 1]),
                (8, 10, 2, vec![0]),
            ]
        );
    }

    // a:        [6, 10)
    // b:   [2,      9)
    // c: [0,          12)
    #[test]
    fn test_contributors_follow_input_order() {
        let a = lineage(0, &[(6, 10, 1)]);
        let b = lineage(1, &[(2, 9, 1)]);
        let c = lineage(2, &[(0, 12, 1)]);
        let contributors = merge_ancestry(&[&a, &b, &c])
            .map(|m| m.contributors().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(
            contributors,
            vec![
                vec![2],
                vec![1, 2],
                vec![0, 1, 2],
                vec![0, 2],
                vec![2]
            ]
        );
    }

    #[test]
    fn test_disjoint_lineages_do_not_coalesce() {
        let a = lineage(0, &[(0, 3, 1)]);
        let b = lineage(1, &[(5, 7, 1)]);
        assert!(merge_ancestry(&[&a, &b]).all(|m| !m.is_coalescence()));
    }

    #[test]
    fn test_flags_and_trimming() {
        let a = lineage(0, &[(0, 4, 1), (6, 10, 2)]);
        let b = lineage(1, &[(4, 8, 1)]);
        let merged = merge_ancestry(&[&a, &b]).collect::<Vec<_>>();
        assert_eq!(common_ancestor_flags(&merged), NodeFlags::coalescence());
        let retained = retained_ancestry(&merged, 3)
            .iter()
            .map(|i| i.range())
            .collect::<Vec<_>>();
        // [6, 8) is now ancestral to all three samples
        assert_eq!(retained, vec![(0, 4), (4, 6), (8, 10)]);

        let c = lineage(2, &[(0, 2, 1)]);
        let d = lineage(3, &[(2, 5, 1)]);
        let merged = merge_ancestry(&[&c, &d]).collect::<Vec<_>>();
        assert_eq!(common_ancestor_flags(&merged), NodeFlags::non_coalescing());
        assert_eq!(retained_ancestry(&merged, 3).len(), 2);
    }

    #[test]
    fn test_single_lineage_reproduces_its_ancestry() {
        let a = lineage(3, &[(0, 3, 2), (3, 5, 1), (8, 9, 4)]);
        let merged = merge_ancestry(&[&a])
            .map(|m| m.interval())
            .collect::<Vec<_>>();
        assert_eq!(merged, a.ancestry());
    }
}

#[cfg(test)]
mod test_overlapper_properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Copy, Clone)]
    struct Indexed {
        left: i64,
        right: i64,
        index: usize,
    }

    impl GenomicInterval for Indexed {
        fn left(&self) -> i64 {
            self.left
        }
        fn right(&self) -> i64 {
            self.right
        }
    }

    fn arb_segments() -> impl Strategy<Value = Vec<(i64, i64)>> {
        proptest::collection::vec((0_i64..50, 1_i64..20), 0..12)
            .prop_map(|v| v.into_iter().map(|(l, len)| (l, l + len)).collect())
    }

    proptest! {
        // Every covered position is reported exactly once,
        // together with exactly the inputs that cover it.
        #[test]
        fn test_output_matches_pointwise_coverage(raw in arb_segments()) {
            let segments = raw
                .iter()
                .enumerate()
                .map(|(index, &(left, right))| Indexed { left, right, index })
                .collect::<Vec<_>>();
            let mut overlapper = Overlapper::new(segments.clone());
            let mut last_right = i64::MIN;
            let mut reported = vec![];
            while let Some((left, right, overlaps)) = overlapper.calculate_next_overlap_set() {
                prop_assert!(left < right);
                prop_assert!(left >= last_right);
                last_right = right;
                let mut indexes = overlaps.iter().map(|o| o.index).collect::<Vec<_>>();
                indexes.sort_unstable();
                reported.push((left, right, indexes));
            }
            for x in 0..80_i64 {
                let mut covering = segments
                    .iter()
                    .filter(|s| s.left <= x && x < s.right)
                    .map(|s| s.index)
                    .collect::<Vec<_>>();
                covering.sort_unstable();
                let found = reported.iter().find(|(l, r, _)| *l <= x && x < *r);
                match found {
                    Some((_, _, indexes)) => prop_assert_eq!(indexes, &covering),
                    None => prop_assert!(covering.is_empty()),
                }
            }
        }
    }
}
