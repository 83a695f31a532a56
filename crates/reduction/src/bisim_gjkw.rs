use std::fmt;
use std::ops::Range;

use itertools::Itertools;
use log::debug;
use log::trace;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use bisim_lts::LabelIndex;
use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;

use crate::partitioned_states::BlockIndex;
use crate::partitioned_states::ConstellationIndex;
use crate::partitioned_states::PartitionedStates;
use crate::partitioned_states::StateInfo;
use crate::partitioned_transitions::PartitionedTransitions;
use crate::partitioned_transitions::SliceIndex;
use crate::refine::refine;
use crate::refine::RefineResult;
use crate::refine::Splitter;
use crate::IndexedPartition;

/// Counters of a partition refinement run.
///
/// The number of states that are moved into a new block is at most n log2 n
/// and the number of transitions that are relocated at most 2 m log2 n + m,
/// where n and m are the number of states and transitions of the Kripke
/// structure. The states visited while refining and the transitions and
/// slices inspected while stabilising new bottom states are bounded in the
/// same way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefinementStatistics {
    pub kripke_states: usize,
    pub kripke_transitions: usize,
    pub blocks: usize,
    pub constellations: usize,
    pub refine_calls: usize,
    pub states_split_off: usize,
    pub transitions_relocated: usize,
    pub new_bottom_states: usize,
    pub states_visited: usize,
    pub postprocessing_work: usize,
}

impl RefinementStatistics {
    /// Returns true iff the counters respect the complexity bounds.
    pub fn within_bounds(&self) -> bool {
        let log_n = (self.kripke_states.max(1) as f64).log2();
        let n = self.kripke_states as f64;
        let m = self.kripke_transitions as f64;

        self.states_split_off as f64 <= n * log_n
            && self.transitions_relocated as f64 <= 2.0 * m * log_n + m
            && self.states_visited as f64 <= 2.0 * (n + m) * (log_n + 1.0)
            && self.postprocessing_work as f64 <= 2.0 * m * (log_n + 1.0)
    }
}

impl fmt::Display for RefinementStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Kripke structure: {} states, {} transitions",
            self.kripke_states, self.kripke_transitions
        )?;
        writeln!(f, "Blocks: {}, constellations: {}", self.blocks, self.constellations)?;
        writeln!(f, "Refinements: {}", self.refine_calls)?;
        writeln!(f, "States split off: {}", self.states_split_off)?;
        writeln!(f, "Transitions relocated: {}", self.transitions_relocated)?;
        writeln!(f, "New bottom states: {}", self.new_bottom_states)?;
        writeln!(f, "States visited: {}", self.states_visited)?;
        write!(f, "Postprocessing work: {}", self.postprocessing_work)
    }
}

/// The O(m log n) partition refinement algorithm of Groote, Jansen, Keiren
/// and Wijs for strong and (divergence-preserving) branching bisimulation.
///
/// The labelled transition system is first turned into a Kripke structure in
/// which only the tau transitions of branching bisimulation remain direct
/// transitions. For branching bisimulation the system must not contain tau
/// cycles, other than tau self-loops.
pub(crate) struct GjkwRefinement {
    partition: PartitionedStates,
    transitions: PartitionedTransitions,
    statistics: RefinementStatistics,
    num_of_states: usize,
}

impl GjkwRefinement {
    /// Builds the Kripke structure and its initial partition.
    ///
    /// Every transition s -a-> t, other than the inert tau transitions, is
    /// replaced by s -> x -> t for an extra state x that is shared by all
    /// a-transitions into t. The original states form the first block and the
    /// extra states are grouped into one block per label.
    pub fn new(lts: &LabelledTransitionSystem, branching: bool, preserve_divergence: bool) -> Self {
        let num_of_states = lts.num_of_states();

        let mut extra_states: FxHashMap<(LabelIndex, StateIndex), StateIndex> = FxHashMap::default();
        let mut extra_labels: Vec<LabelIndex> = Vec::new();
        let mut edges: Vec<(StateIndex, StateIndex, bool)> = Vec::new();

        for (from, label, to) in lts.iter_transitions() {
            if branching && lts.is_hidden_label(label) {
                if from != to {
                    edges.push((from, to, true));
                    continue;
                }

                if !preserve_divergence {
                    // A tau self-loop is invisible for branching bisimulation.
                    continue;
                }
            }

            let extra = *extra_states.entry((label, to)).or_insert_with(|| {
                let extra = num_of_states + extra_labels.len();
                extra_labels.push(label);
                edges.push((extra, to, false));
                extra
            });
            edges.push((from, extra, false));
        }

        let total_states = num_of_states + extra_labels.len();
        let mut nonbottom = vec![false; total_states];
        for (from, _, inert) in &edges {
            if *inert {
                nonbottom[*from] = true;
            }
        }

        let mut permutation: Vec<StateIndex> = Vec::with_capacity(total_states);
        permutation.extend((0..num_of_states).filter(|state_index| nonbottom[*state_index]));
        let bottom_begin = permutation.len();
        permutation.extend((0..num_of_states).filter(|state_index| !nonbottom[*state_index]));

        let mut block_ranges = vec![(0, bottom_begin, num_of_states)];
        for (label, states) in &(num_of_states..total_states)
            .sorted_by_key(|state_index| extra_labels[*state_index - num_of_states])
            .chunk_by(|state_index| extra_labels[*state_index - num_of_states])
        {
            let begin = permutation.len();
            permutation.extend(states);
            trace!("Block {} contains the {} extra states for label {label}", block_ranges.len(), permutation.len() - begin);
            block_ranges.push((begin, begin, permutation.len()));
        }

        let mut partition = PartitionedStates::new(vec![StateInfo::default(); total_states], permutation, &block_ranges);
        let transitions = PartitionedTransitions::new(&edges, &mut partition);

        debug!(
            "Kripke structure has {} states, {} transitions and {} initial blocks",
            total_states,
            edges.len(),
            block_ranges.len()
        );

        Self {
            partition,
            transitions,
            statistics: RefinementStatistics {
                kripke_states: total_states,
                kripke_transitions: edges.len(),
                ..Default::default()
            },
            num_of_states,
        }
    }

    /// Refines the partition until every constellation consists of a single block.
    pub fn run(&mut self) {
        while let Some(constellation) = self.partition.some_nontrivial() {
            trace!("{:?}", self.partition);
            let (splitter_block, new_constellation) = self.partition.split_off_small_block(constellation);
            trace!(
                "Splitter block {splitter_block} of {} states forms constellation {new_constellation}",
                self.partition.blocks[splitter_block].size()
            );

            // Mark the sources of transitions into the splitter block.
            let mut refinable = Vec::new();
            for pos in self.partition.blocks[splitter_block].range() {
                let state_index = self.partition.permutation[pos];

                for pred_pos in self.partition.states[state_index].noninert_pred() {
                    let transition = self.transitions.pred[pred_pos];
                    let source = self.transitions.transitions[transition].source;
                    let block = self.partition.block_of(source);

                    self.transitions
                        .move_to_slice(&mut self.partition.blocks, transition, block, new_constellation);
                    self.partition.mark(source);

                    if !self.partition.blocks[block].refinable {
                        self.partition.blocks[block].refinable = true;
                        refinable.push(block);
                    }
                }
            }

            // The splitter block itself must become stable with respect to the rest of its old constellation.
            if self.partition.blocks[splitter_block].size() > 1 {
                if let Some(slice) = self.transitions.find_slice(splitter_block, constellation) {
                    let result = self.refine(splitter_block, slice, constellation);
                    self.finish_refinement(result.red);
                }
            }

            for block in refinable {
                self.partition.blocks[block].refinable = false;
                if self.partition.blocks[block].size() == 1 {
                    self.partition.clear_marks(block);
                    continue;
                }

                let result = self.refine_marked(block);
                let Some(red) = result.red else {
                    continue;
                };

                let red = if self.partition.blocks[red].unmarked_bottom_size() > 0 {
                    match self.postprocess_new_bottom(red) {
                        Some(red) => red,
                        None => continue,
                    }
                } else {
                    self.partition.clear_marks(red);
                    red
                };

                // Stability with respect to the remainder of the old constellation.
                if self.partition.blocks[red].constellation == constellation || self.partition.blocks[red].size() == 1
                {
                    continue;
                }

                if let Some(slice) = self.transitions.find_slice(red, constellation) {
                    let result = self.refine(red, slice, constellation);
                    self.finish_refinement(result.red);
                }
            }
        }

        self.statistics.blocks = self.partition.blocks.len();
        self.statistics.constellations = self.partition.constellations.len();
        self.statistics.transitions_relocated = self.transitions.relocated;

        #[cfg(debug_assertions)]
        {
            self.partition.check_consistency();
            self.transitions.check_consistency(&self.partition);
        }

        debug!(
            "Partition refinement finished with {} blocks after {} refinements",
            self.statistics.blocks, self.statistics.refine_calls
        );
    }

    /// Returns the partition of the original states into the equivalence
    /// classes, numbered in the order of their first state.
    pub fn partition(&self) -> IndexedPartition {
        let mut class_of_block: Vec<Option<usize>> = vec![None; self.partition.blocks.len()];
        let mut next_class = 0;
        let mut partition = IndexedPartition::new(self.num_of_states);

        for state_index in 0..self.num_of_states {
            let block = self.partition.block_of(state_index);
            let class = *class_of_block[block].get_or_insert_with(|| {
                next_class += 1;
                next_class - 1
            });
            partition.set_block(state_index, class);
        }

        partition
    }

    pub fn statistics(&self) -> &RefinementStatistics {
        &self.statistics
    }

    fn refine(&mut self, block: BlockIndex, slice: SliceIndex, constellation: ConstellationIndex) -> RefineResult {
        refine(
            &mut self.partition,
            &mut self.transitions,
            &mut self.statistics,
            block,
            Splitter::Transitions { slice, constellation },
        )
    }

    fn refine_marked(&mut self, block: BlockIndex) -> RefineResult {
        refine(
            &mut self.partition,
            &mut self.transitions,
            &mut self.statistics,
            block,
            Splitter::Marked,
        )
    }

    /// Handles the new bottom states of the red block of a refinement, or clears its marks.
    fn finish_refinement(&mut self, red: Option<BlockIndex>) {
        if let Some(red) = red {
            if self.partition.blocks[red].unmarked_bottom_size() > 0 {
                self.postprocess_new_bottom(red);
            } else {
                self.partition.clear_marks(red);
            }
        }
    }

    /// The unmarked bottom states of the block became bottom states during the
    /// last split, and the marked bottom states are the old ones. Splits off the
    /// states that can inertly reach an old bottom state, which is returned,
    /// and stabilises the remainder with respect to all constellations.
    fn postprocess_new_bottom(&mut self, block: BlockIndex) -> Option<BlockIndex> {
        if self.partition.blocks[block].marked_bottom_size() == 0 {
            self.partition.clear_marks(block);
            self.stabilise_new_bottom(block);
            return None;
        }

        let result = self.refine_marked(block);
        if let Some(red) = result.red {
            self.partition.clear_marks(red);
        }

        if let Some(blue) = result.blue {
            self.stabilise_new_bottom(blue);
        }

        result.red
    }

    /// Splits the block until every part is stable with respect to every
    /// constellation other than its own.
    ///
    /// For every pending part the number of its bottom states with a
    /// transition into each constellation is kept. After a split only the
    /// bottom states of the new, smaller, part and the bottom states that
    /// appeared during the split are counted again.
    fn stabilise_new_bottom(&mut self, block: BlockIndex) {
        let mut counts = FxHashMap::default();
        let bottom = self.states_at(self.partition.blocks[block].bottom());
        self.count_reached(&bottom, &mut counts, true);

        let candidates = self.slice_constellations(block);
        let mut pending = vec![PendingBlock {
            block,
            counts,
            candidates,
        }];

        while let Some(PendingBlock {
            block,
            mut counts,
            mut candidates,
        }) = pending.pop()
        {
            if self.partition.blocks[block].size() <= 1 {
                continue;
            }

            let Some((slice, constellation)) = self.unstable_slice(block, &counts, &mut candidates) else {
                continue;
            };

            trace!("Block {block} is unstable with respect to constellation {constellation}");
            let result = self.refine(block, slice, constellation);
            debug_assert!(
                result.red.is_some() && result.blue.is_some(),
                "An unstable block must be split"
            );
            let (Some(red), Some(blue)) = (result.red, result.blue) else {
                if let Some(red) = result.red {
                    self.partition.clear_marks(red);
                }
                continue;
            };

            // The unmarked bottom states of the red part became bottom states during the split.
            let new_bottom = self.states_at(self.partition.blocks[red].unmarked_bottom());
            let (small, large) = if red > blue { (red, blue) } else { (blue, red) };
            let small_old_bottom = if small == red {
                self.states_at(self.partition.blocks[red].marked_bottom())
            } else {
                self.states_at(self.partition.blocks[blue].bottom())
            };
            self.partition.clear_marks(red);

            let mut small_counts = FxHashMap::default();
            self.count_reached(&small_old_bottom, &mut small_counts, true);
            self.count_reached(&small_old_bottom, &mut counts, false);
            if small == red {
                self.count_reached(&new_bottom, &mut small_counts, true);
            } else {
                self.count_reached(&new_bottom, &mut counts, true);
            }

            // The large part keeps its unchecked constellations, unless it gained bottom states.
            let large_candidates = if large == red && !new_bottom.is_empty() {
                self.slice_constellations(large)
            } else {
                candidates
            };
            let small_candidates = self.slice_constellations(small);

            pending.push(PendingBlock {
                block: large,
                counts,
                candidates: large_candidates,
            });
            pending.push(PendingBlock {
                block: small,
                counts: small_counts,
                candidates: small_candidates,
            });
        }
    }

    /// Returns a slice of the block into one of the candidate constellations
    /// that is not reached directly by all bottom states of the block. The
    /// constellations that are checked are removed from the candidates.
    fn unstable_slice(
        &self,
        block: BlockIndex,
        counts: &FxHashMap<ConstellationIndex, usize>,
        candidates: &mut Vec<ConstellationIndex>,
    ) -> Option<(SliceIndex, ConstellationIndex)> {
        let own_constellation = self.partition.blocks[block].constellation;
        let bottom_size = self.partition.blocks[block].bottom().len();

        while let Some(constellation) = candidates.pop() {
            if constellation == own_constellation {
                continue;
            }

            if let Some(slice) = self.transitions.find_slice(block, constellation) {
                if counts.get(&constellation).copied().unwrap_or_default() < bottom_size {
                    return Some((slice, constellation));
                }
            }
        }

        None
    }

    /// Adds, or removes, the given states to the number of states with a
    /// transition into each constellation.
    fn count_reached(
        &mut self,
        states: &[StateIndex],
        counts: &mut FxHashMap<ConstellationIndex, usize>,
        add: bool,
    ) {
        let mut reached: FxHashSet<ConstellationIndex> = FxHashSet::default();
        for state_index in states {
            reached.clear();
            for succ_pos in self.partition.states[*state_index].noninert_succ() {
                self.statistics.postprocessing_work += 1;
                let target = self.transitions.transitions[self.transitions.succ[succ_pos]].target;
                let constellation = self.partition.constellation_of(target);
                if !reached.insert(constellation) {
                    continue;
                }

                let count = counts.entry(constellation).or_default();
                if add {
                    *count += 1;
                } else {
                    debug_assert!(*count > 0, "Removing a state that was never counted");
                    *count -= 1;
                }
            }
        }
    }

    /// Returns the constellations reached by the slices of the block.
    fn slice_constellations(&mut self, block: BlockIndex) -> Vec<ConstellationIndex> {
        let result: Vec<ConstellationIndex> = self.partition.blocks[block]
            .slices
            .iter(&self.transitions.slices)
            .map(|slice| self.transitions.slices[slice].constellation)
            .collect();
        self.statistics.postprocessing_work += result.len();
        result
    }

    fn states_at(&self, positions: Range<usize>) -> Vec<StateIndex> {
        self.partition.permutation[positions].to_vec()
    }
}

/// A part of a block with new bottom states that still has to be stabilised.
struct PendingBlock {
    block: BlockIndex,

    /// The number of bottom states with a transition into each constellation.
    counts: FxHashMap<ConstellationIndex, usize>,

    /// The constellations for which stability has not been checked.
    candidates: Vec<ConstellationIndex>,
}

/// Computes the strong or (divergence-preserving) branching bisimulation
/// partition of a system without tau cycles, other than tau self-loops.
pub fn bisim_gjkw(
    lts: &LabelledTransitionSystem,
    branching: bool,
    preserve_divergence: bool,
) -> (IndexedPartition, RefinementStatistics) {
    let mut refinement = GjkwRefinement::new(lts, branching, preserve_divergence);
    refinement.run();
    (refinement.partition(), refinement.statistics().clone())
}
