//! Splitting a block into the states that can reach the splitter, the red
//! states, and the states that can not, the blue states.
//!
//! Both sets are computed in lock-step, one transition at a time, and the
//! computation that finishes first determines the split. A computation that
//! has found more than half of the states of the block is aborted, which
//! bounds the work by the size of the smaller part.

use log::trace;

use bisim_lts::StateIndex;

use crate::bisim_gjkw::RefinementStatistics;
use crate::partitioned_states::Block;
use crate::partitioned_states::BlockIndex;
use crate::partitioned_states::ConstellationIndex;
use crate::partitioned_states::PartitionedStates;
use crate::partitioned_states::NOTBLUE_UNDEFINED;
use crate::partitioned_transitions::PartitionedTransitions;
use crate::partitioned_transitions::SliceIndex;
use crate::partitioned_transitions::TransitionIndex;
use crate::LinkedList;

/// Determines the initial red states of a refinement.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Splitter {
    /// The states that are marked in the block.
    Marked,

    /// The sources of the transitions in the slice, which is the slice from
    /// the block into the constellation.
    Transitions {
        slice: SliceIndex,
        constellation: ConstellationIndex,
    },
}

/// The blocks resulting from a refinement, the red block keeps its marked
/// bottom states. When no split happened only one of them is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RefineResult {
    pub red: Option<BlockIndex>,
    pub blue: Option<BlockIndex>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Progress {
    Continue,
    Finished,
    Aborted,
}

/// Refines the block into its red and blue states with respect to the splitter.
pub(crate) fn refine(
    partition: &mut PartitionedStates,
    transitions: &mut PartitionedTransitions,
    statistics: &mut RefinementStatistics,
    block: BlockIndex,
    splitter: Splitter,
) -> RefineResult {
    statistics.refine_calls += 1;

    let Block {
        begin,
        bottom_begin,
        marked_bottom_begin,
        end,
        ..
    } = partition.blocks[block];

    let mut refinement = Refinement {
        partition,
        transitions,
        block,
        half: (end - begin) / 2,
        splitter_constellation: None,
        blue_nonbottom_begin: bottom_begin,
        blue_bottom_end: bottom_begin,
        blue_count: 0,
        blue_bottom_done: false,
        blue_scan: None,
        blue_visit_pos: bottom_begin,
        blue_current: None,
        touched: Vec::new(),
        visited: 0,
        red_transition: None,
        red_bottom_next: end,
        red_nonbottom_next: begin,
        red_current: None,
    };

    match splitter {
        Splitter::Marked => {
            debug_assert!(
                refinement.partition.blocks[block].marked_size() > 0,
                "Refining on marked states without marked states"
            );

            // Every unmarked bottom state is blue, it has no transition into the splitter.
            refinement.blue_bottom_end = marked_bottom_begin;
            refinement.blue_count = marked_bottom_begin - bottom_begin;
            refinement.blue_bottom_done = true;
            refinement.blue_visit_pos = marked_bottom_begin;
        }
        Splitter::Transitions { slice, constellation } => {
            debug_assert_eq!(
                refinement.partition.blocks[block].marked_size(),
                0,
                "Refining on transitions with marked states"
            );
            debug_assert_eq!(refinement.transitions.slices[slice].block, block);

            refinement.splitter_constellation = Some(constellation);
            refinement.red_transition = refinement.transitions.slices[slice].transitions.front();
        }
    }

    refinement.run(statistics)
}

struct Refinement<'a> {
    partition: &'a mut PartitionedStates,
    transitions: &'a mut PartitionedTransitions,
    block: BlockIndex,
    half: usize,

    /// Set when the states with a transition into this constellation are red.
    splitter_constellation: Option<ConstellationIndex>,

    /// The blue non-bottom states are `[blue_nonbottom_begin, bottom_begin)`.
    blue_nonbottom_begin: usize,

    /// The blue bottom states are `[bottom_begin, blue_bottom_end)`.
    blue_bottom_end: usize,
    blue_count: usize,
    blue_bottom_done: bool,

    /// A state that is being checked for a transition into the splitter, and the next outgoing position.
    blue_scan: Option<(StateIndex, usize)>,

    /// Blue states at positions `[blue_visit_pos, blue_bottom_end)` have been visited.
    blue_visit_pos: usize,
    blue_current: Option<(StateIndex, usize)>,

    /// States with a defined `notblue` counter.
    touched: Vec<StateIndex>,

    /// The number of states visited by both computations.
    visited: usize,

    /// The next transition of the splitter slice.
    red_transition: Option<TransitionIndex>,

    /// Marked bottom states at positions `[red_bottom_next, end)` have been visited.
    red_bottom_next: usize,

    /// Marked non-bottom states at positions `[begin, red_nonbottom_next)` have been visited.
    red_nonbottom_next: usize,
    red_current: Option<(StateIndex, usize)>,
}

impl Refinement<'_> {
    fn run(mut self, statistics: &mut RefinementStatistics) -> RefineResult {
        let mut blue = if self.blue_count > self.half {
            Progress::Aborted
        } else {
            Progress::Continue
        };
        let mut red = Progress::Continue;

        let blue_finished = loop {
            debug_assert!(
                blue == Progress::Continue || red == Progress::Continue,
                "Both coroutines aborted"
            );

            if blue == Progress::Continue {
                blue = self.blue_step();
                if blue == Progress::Finished {
                    break true;
                }
            }

            if red == Progress::Continue {
                red = self.red_step();
                if red == Progress::Finished {
                    break false;
                }
            }
        };

        for state_index in self.touched.drain(..) {
            self.partition.states[state_index].notblue = NOTBLUE_UNDEFINED;
        }
        statistics.states_visited += self.visited;

        let (red_nonbottom_end, blue_bottom_end) = if blue_finished {
            trace!("Blue finished with {} states", self.blue_count);
            if self.blue_count == 0 {
                // Nothing to split, only the bottom states stay marked.
                let block = &mut self.partition.blocks[self.block];
                block.unmarked_nonbottom_begin = block.begin;
                return RefineResult {
                    red: Some(self.block),
                    blue: None,
                };
            }

            (self.blue_nonbottom_begin, self.blue_bottom_end)
        } else {
            let block = &self.partition.blocks[self.block];
            trace!("Red finished with {} states", block.marked_size());
            if block.marked_size() == 0 {
                return RefineResult {
                    red: None,
                    blue: Some(self.block),
                };
            }

            (block.unmarked_nonbottom_begin, block.marked_bottom_begin)
        };

        self.split(red_nonbottom_end, blue_bottom_end, blue_finished, statistics)
    }

    /// One step of the computation of the blue states.
    fn blue_step(&mut self) -> Progress {
        if let Some((state_index, pos)) = self.blue_scan {
            // The red coroutine may have found the state in the meantime.
            if self.partition.is_marked(state_index) {
                self.blue_scan = None;
                return Progress::Continue;
            }

            if pos < self.partition.states[state_index].inert_succ_begin {
                let target = self.transitions.transitions[self.transitions.succ[pos]].target;
                if Some(self.partition.constellation_of(target)) == self.splitter_constellation {
                    self.blue_scan = None;
                    self.partition.mark(state_index);
                } else {
                    self.blue_scan = Some((state_index, pos + 1));
                }

                return Progress::Continue;
            }

            self.blue_scan = None;
            return self.make_blue(state_index);
        }

        if !self.blue_bottom_done {
            if self.blue_bottom_end < self.partition.blocks[self.block].marked_bottom_begin {
                let state_index = self.partition.permutation[self.blue_bottom_end];
                self.blue_scan = Some((state_index, self.partition.states[state_index].succ_begin));
                self.visited += 1;
                return Progress::Continue;
            }

            self.blue_bottom_done = true;
            self.blue_visit_pos = self.blue_bottom_end;
            return Progress::Continue;
        }

        if let Some((state_index, pos)) = self.blue_current {
            if pos < self.partition.states[state_index].pred_end {
                self.blue_current = Some((state_index, pos + 1));
                let source = self.transitions.transitions[self.transitions.pred[pos]].source;
                return self.visit_blue_predecessor(source);
            }

            self.blue_current = None;
            return Progress::Continue;
        }

        if self.blue_visit_pos > self.blue_nonbottom_begin {
            self.blue_visit_pos -= 1;
            let state_index = self.partition.permutation[self.blue_visit_pos];
            self.blue_current = Some((state_index, self.partition.states[state_index].inert_pred_begin));
            self.visited += 1;
            return Progress::Continue;
        }

        Progress::Finished
    }

    /// The inert predecessor of a blue state is blue when all its inert
    /// successors are blue, and it has no transition into the splitter.
    fn visit_blue_predecessor(&mut self, state_index: StateIndex) -> Progress {
        if self.partition.is_marked(state_index) {
            return Progress::Continue;
        }

        let pos = self.partition.states[state_index].pos;
        if pos >= self.blue_nonbottom_begin {
            // Already blue, it can not be a bottom state.
            return Progress::Continue;
        }

        self.visited += 1;
        let state = &mut self.partition.states[state_index];
        if state.notblue == NOTBLUE_UNDEFINED {
            state.notblue = state.succ_end - state.inert_succ_begin;
            self.touched.push(state_index);
        }

        state.notblue -= 1;
        if state.notblue > 0 {
            return Progress::Continue;
        }

        if self.splitter_constellation.is_some() {
            self.blue_scan = Some((state_index, state.succ_begin));
            Progress::Continue
        } else {
            self.make_blue(state_index)
        }
    }

    fn make_blue(&mut self, state_index: StateIndex) -> Progress {
        let pos = self.partition.states[state_index].pos;
        debug_assert!(
            self.splitter_constellation.map_or(true, |constellation| {
                !self.transitions.has_transition_into(self.partition, state_index, constellation)
            }),
            "Blue state {state_index} has a transition into the splitter"
        );

        if self.partition.states[state_index].is_bottom() {
            debug_assert_eq!(pos, self.blue_bottom_end, "Blue bottom states are confirmed in order");
            self.blue_bottom_end += 1;
        } else {
            self.partition.swap_permutation(pos, self.blue_nonbottom_begin - 1);
            self.blue_nonbottom_begin -= 1;
        }

        self.blue_count += 1;
        if self.blue_count > self.half {
            trace!("Blue aborted");
            Progress::Aborted
        } else {
            Progress::Continue
        }
    }

    /// One step of the computation of the red states.
    fn red_step(&mut self) -> Progress {
        // States are also marked by the blue computation and initially.
        if self.red_check() == Progress::Aborted {
            return Progress::Aborted;
        }

        if let Some(transition) = self.red_transition {
            self.red_transition = LinkedList::next(&self.transitions.transitions, transition);
            let source = self.transitions.transitions[transition].source;
            self.partition.mark(source);
            return self.red_check();
        }

        if let Some((state_index, pos)) = self.red_current {
            if pos < self.partition.states[state_index].pred_end {
                self.red_current = Some((state_index, pos + 1));
                let source = self.transitions.transitions[self.transitions.pred[pos]].source;
                self.partition.mark(source);
                return self.red_check();
            }

            self.red_current = None;
            return Progress::Continue;
        }

        let block = &self.partition.blocks[self.block];
        let state_index = if self.red_bottom_next > block.marked_bottom_begin {
            self.red_bottom_next -= 1;
            self.partition.permutation[self.red_bottom_next]
        } else if self.red_nonbottom_next < block.unmarked_nonbottom_begin {
            self.red_nonbottom_next += 1;
            self.partition.permutation[self.red_nonbottom_next - 1]
        } else {
            return Progress::Finished;
        };

        self.red_current = Some((state_index, self.partition.states[state_index].inert_pred_begin));
        self.visited += 1;
        Progress::Continue
    }

    fn red_check(&self) -> Progress {
        if self.partition.blocks[self.block].marked_size() > self.half {
            trace!("Red aborted");
            Progress::Aborted
        } else {
            Progress::Continue
        }
    }

    /// Splits the block, which is laid out as red non-bottom states up to
    /// `red_nonbottom_end`, then blue non-bottom, blue bottom states up to
    /// `blue_bottom_end` and finally red bottom states. The red bottom states
    /// stay marked.
    fn split(
        self,
        red_nonbottom_end: usize,
        blue_bottom_end: usize,
        blue_is_new: bool,
        statistics: &mut RefinementStatistics,
    ) -> RefineResult {
        let partition = self.partition;
        let transitions = self.transitions;
        let block = self.block;

        let Block {
            begin,
            bottom_begin,
            end,
            constellation,
            ..
        } = partition.blocks[block];
        let blue_nonbottom = bottom_begin - red_nonbottom_end;
        let blue_bottom = blue_bottom_end - bottom_begin;

        // Rotate the red non-bottom states behind the blue states.
        partition.swap_ranges(begin, red_nonbottom_end, bottom_begin);
        partition.swap_ranges(begin + blue_nonbottom, bottom_begin, blue_bottom_end);
        let blue_end = begin + blue_nonbottom + blue_bottom;

        let new_block = partition.blocks.len();
        if blue_is_new {
            partition
                .blocks
                .push(Block::new(begin, begin + blue_nonbottom, blue_end, constellation));

            let red = &mut partition.blocks[block];
            red.begin = blue_end;
            red.unmarked_nonbottom_begin = blue_end;
            red.bottom_begin = blue_bottom_end;
            red.marked_bottom_begin = blue_bottom_end;
        } else {
            let mut red = Block::new(blue_end, blue_bottom_end, end, constellation);
            red.marked_bottom_begin = blue_bottom_end;
            partition.blocks.push(red);

            let blue = &mut partition.blocks[block];
            blue.end = blue_end;
            blue.unmarked_nonbottom_begin = begin;
            blue.bottom_begin = begin + blue_nonbottom;
            blue.marked_bottom_begin = blue_end;
        }

        for pos in partition.blocks[new_block].range() {
            let state_index = partition.permutation[pos];
            partition.states[state_index].block = new_block;
        }

        let (red_block, blue_block) = if blue_is_new {
            (block, new_block)
        } else {
            (new_block, block)
        };

        statistics.states_split_off += partition.blocks[new_block].size();
        trace!(
            "Split block {block} into red block {red_block} and blue block {blue_block} of {} states",
            partition.blocks[blue_block].size()
        );

        transitions.new_block_created(partition, new_block);

        // Inert transitions from red to blue states are no longer inert.
        let mut crossing = Vec::new();
        if blue_is_new {
            for pos in partition.blocks[blue_block].range() {
                let state_index = partition.permutation[pos];
                for pred_pos in partition.states[state_index].inert_pred() {
                    let transition = transitions.pred[pred_pos];
                    if partition.block_of(transitions.transitions[transition].source) == red_block {
                        crossing.push(transition);
                    }
                }
            }
        } else {
            for pos in partition.blocks[red_block].range() {
                let state_index = partition.permutation[pos];
                for succ_pos in partition.states[state_index].inert_succ() {
                    let transition = transitions.succ[succ_pos];
                    if partition.block_of(transitions.transitions[transition].target) == blue_block {
                        crossing.push(transition);
                    }
                }
            }
        }

        for transition in crossing {
            let source = transitions.transitions[transition].source;
            if transitions.make_noninert(partition, transition) {
                trace!("State {source} became a bottom state");
                partition.make_bottom(source);
                statistics.new_bottom_states += 1;
            }
        }

        partition.make_nontrivial(constellation);

        RefineResult {
            red: Some(red_block),
            blue: Some(blue_block),
        }
    }
}
