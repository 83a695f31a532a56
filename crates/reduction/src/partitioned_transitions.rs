use rustc_hash::FxHashMap;

use bisim_lts::StateIndex;

use crate::partitioned_states::Block;
use crate::partitioned_states::BlockIndex;
use crate::partitioned_states::ConstellationIndex;
use crate::partitioned_states::PartitionedStates;
use crate::Link;
use crate::LinkStorage;
use crate::LinkedList;
use crate::Pool;

pub(crate) type TransitionIndex = usize;
pub(crate) type SliceIndex = usize;

/// A transition of the Kripke structure.
#[derive(Clone, Debug)]
pub(crate) struct Transition {
    pub source: StateIndex,
    pub target: StateIndex,

    /// Position of this transition in the `pred` array.
    pub pred_pos: usize,

    /// Position of this transition in the `succ` array.
    pub succ_pos: usize,

    /// The slice containing this transition, none for inert transitions.
    pub slice: Option<SliceIndex>,

    link: Link,
}

/// The non-inert transitions from one block into one constellation.
#[derive(Clone, Debug)]
pub(crate) struct Slice {
    pub block: BlockIndex,
    pub constellation: ConstellationIndex,
    pub transitions: LinkedList,

    /// Link in the list of slices of the source block.
    link: Link,
}

impl LinkStorage for Vec<Transition> {
    fn link(&self, index: usize) -> &Link {
        &self[index].link
    }

    fn link_mut(&mut self, index: usize) -> &mut Link {
        &mut self[index].link
    }
}

impl LinkStorage for Pool<Slice> {
    fn link(&self, index: usize) -> &Link {
        &self[index].link
    }

    fn link_mut(&mut self, index: usize) -> &mut Link {
        &mut self[index].link
    }
}

/// The transitions of the Kripke structure, grouped per state in the `pred`
/// and `succ` arrays and per (block, constellation) pair in slices.
pub(crate) struct PartitionedTransitions {
    pub transitions: Vec<Transition>,
    pub pred: Vec<TransitionIndex>,
    pub succ: Vec<TransitionIndex>,
    pub slices: Pool<Slice>,

    slice_map: FxHashMap<(BlockIndex, ConstellationIndex), SliceIndex>,

    /// The number of times that a transition was moved between slices or became non-inert.
    pub relocated: usize,
}

impl PartitionedTransitions {
    /// Creates the transition storage for the given (source, target, inert)
    /// edges. Fills in the transition ranges of the states, every state must
    /// have its range fields set to zero.
    pub fn new(edges: &[(StateIndex, StateIndex, bool)], partition: &mut PartitionedStates) -> Self {
        let num_of_states = partition.states.len();

        // Count the non-inert and inert transitions per state.
        let mut noninert_out = vec![0usize; num_of_states];
        let mut inert_out = vec![0usize; num_of_states];
        let mut noninert_in = vec![0usize; num_of_states];
        let mut inert_in = vec![0usize; num_of_states];

        for (source, target, inert) in edges {
            if *inert {
                inert_out[*source] += 1;
                inert_in[*target] += 1;
            } else {
                noninert_out[*source] += 1;
                noninert_in[*target] += 1;
            }
        }

        // Compute the ranges, using the begin positions as insertion cursors.
        let mut noninert_pred_cursor = vec![0usize; num_of_states];
        let mut inert_pred_cursor = vec![0usize; num_of_states];
        let mut noninert_succ_cursor = vec![0usize; num_of_states];
        let mut inert_succ_cursor = vec![0usize; num_of_states];

        let mut pred_offset = 0;
        let mut succ_offset = 0;
        for (state_index, state) in partition.states.iter_mut().enumerate() {
            state.pred_begin = pred_offset;
            state.inert_pred_begin = pred_offset + noninert_in[state_index];
            state.pred_end = state.inert_pred_begin + inert_in[state_index];
            pred_offset = state.pred_end;

            state.succ_begin = succ_offset;
            state.inert_succ_begin = succ_offset + noninert_out[state_index];
            state.succ_end = state.inert_succ_begin + inert_out[state_index];
            succ_offset = state.succ_end;

            noninert_pred_cursor[state_index] = state.pred_begin;
            inert_pred_cursor[state_index] = state.inert_pred_begin;
            noninert_succ_cursor[state_index] = state.succ_begin;
            inert_succ_cursor[state_index] = state.inert_succ_begin;
        }

        let mut result = Self {
            transitions: Vec::with_capacity(edges.len()),
            pred: vec![0; edges.len()],
            succ: vec![0; edges.len()],
            slices: Pool::new(),
            slice_map: FxHashMap::default(),
            relocated: 0,
        };

        for (transition_index, (source, target, inert)) in edges.iter().enumerate() {
            let (pred_pos, succ_pos) = if *inert {
                (&mut inert_pred_cursor[*target], &mut inert_succ_cursor[*source])
            } else {
                (&mut noninert_pred_cursor[*target], &mut noninert_succ_cursor[*source])
            };

            result.pred[*pred_pos] = transition_index;
            result.succ[*succ_pos] = transition_index;
            result.transitions.push(Transition {
                source: *source,
                target: *target,
                pred_pos: *pred_pos,
                succ_pos: *succ_pos,
                slice: None,
                link: Link::default(),
            });

            *pred_pos += 1;
            *succ_pos += 1;
        }

        for (transition_index, (source, target, inert)) in edges.iter().enumerate() {
            if !*inert {
                let block = partition.block_of(*source);
                let constellation = partition.constellation_of(*target);
                result.insert_into_slice(&mut partition.blocks, transition_index, block, constellation);
            }
        }

        result
    }

    /// Returns the slice of transitions from the block into the constellation.
    pub fn find_slice(&self, block: BlockIndex, constellation: ConstellationIndex) -> Option<SliceIndex> {
        self.slice_map.get(&(block, constellation)).copied()
    }

    /// Returns the number of transitions in the slice.
    #[cfg(test)]
    pub fn slice_len(&self, slice: SliceIndex) -> usize {
        self.slices[slice].transitions.len()
    }

    /// Adds the non-inert transition to the slice for (block, constellation),
    /// creating the slice when needed.
    fn insert_into_slice(
        &mut self,
        blocks: &mut [Block],
        transition: TransitionIndex,
        block: BlockIndex,
        constellation: ConstellationIndex,
    ) {
        let slice = match self.slice_map.get(&(block, constellation)) {
            Some(slice) => *slice,
            None => {
                let slice = self.slices.allocate(Slice {
                    block,
                    constellation,
                    transitions: LinkedList::new(),
                    link: Link::default(),
                });
                blocks[block].slices.push_back(&mut self.slices, slice);
                self.slice_map.insert((block, constellation), slice);
                slice
            }
        };

        self.slices[slice].transitions.push_back(&mut self.transitions, transition);
        self.transitions[transition].slice = Some(slice);
    }

    /// Removes the transition from its slice, deleting the slice when it becomes empty.
    fn remove_from_slice(&mut self, blocks: &mut [Block], transition: TransitionIndex) {
        let Some(slice) = self.transitions[transition].slice.take() else {
            return;
        };

        self.slices[slice].transitions.remove(&mut self.transitions, transition);
        if self.slices[slice].transitions.is_empty() {
            let Slice {
                block, constellation, ..
            } = self.slices[slice];
            blocks[block].slices.remove(&mut self.slices, slice);
            self.slice_map.remove(&(block, constellation));
            self.slices.deallocate(slice);
        }
    }

    /// Moves the non-inert transition into the slice for (block, constellation).
    pub fn move_to_slice(
        &mut self,
        blocks: &mut [Block],
        transition: TransitionIndex,
        block: BlockIndex,
        constellation: ConstellationIndex,
    ) {
        debug_assert!(self.transitions[transition].slice.is_some(), "Only non-inert transitions are in slices");

        if let Some(slice) = self.transitions[transition].slice {
            if self.slices[slice].block == block && self.slices[slice].constellation == constellation {
                return;
            }
        }

        self.remove_from_slice(blocks, transition);
        self.insert_into_slice(blocks, transition, block, constellation);
        self.relocated += 1;
    }

    /// Turns an inert transition whose source and target ended up in
    /// different blocks into a non-inert one. Returns true iff the source
    /// has no inert outgoing transitions left.
    pub fn make_noninert(&mut self, partition: &mut PartitionedStates, transition: TransitionIndex) -> bool {
        let Transition { source, target, .. } = self.transitions[transition];
        debug_assert!(self.transitions[transition].slice.is_none(), "The transition is already non-inert");

        // The first inert successor of the source becomes the last non-inert one.
        let boundary = partition.states[source].inert_succ_begin;
        let pos = self.transitions[transition].succ_pos;
        self.succ.swap(pos, boundary);
        self.transitions[self.succ[pos]].succ_pos = pos;
        self.transitions[self.succ[boundary]].succ_pos = boundary;
        partition.states[source].inert_succ_begin += 1;

        // Same for the predecessors of the target.
        let boundary = partition.states[target].inert_pred_begin;
        let pos = self.transitions[transition].pred_pos;
        self.pred.swap(pos, boundary);
        self.transitions[self.pred[pos]].pred_pos = pos;
        self.transitions[self.pred[boundary]].pred_pos = boundary;
        partition.states[target].inert_pred_begin += 1;

        let block = partition.block_of(source);
        let constellation = partition.constellation_of(target);
        self.insert_into_slice(&mut partition.blocks, transition, block, constellation);
        self.relocated += 1;

        partition.states[source].is_bottom()
    }

    /// Moves the non-inert outgoing transitions of the states in the newly
    /// created block into slices of that block.
    pub fn new_block_created(&mut self, partition: &mut PartitionedStates, new_block: BlockIndex) {
        for pos in partition.blocks[new_block].range() {
            let state_index = partition.permutation[pos];

            for succ_pos in partition.states[state_index].noninert_succ() {
                let transition = self.succ[succ_pos];
                let constellation = partition.constellation_of(self.transitions[transition].target);
                self.move_to_slice(&mut partition.blocks, transition, new_block, constellation);
            }
        }
    }

    /// Returns true iff the state has a non-inert transition into the constellation.
    pub fn has_transition_into(
        &self,
        partition: &PartitionedStates,
        state_index: StateIndex,
        constellation: ConstellationIndex,
    ) -> bool {
        partition.states[state_index]
            .noninert_succ()
            .any(|pos| partition.constellation_of(self.transitions[self.succ[pos]].target) == constellation)
    }

    /// Checks that the transition arrays and slices agree with the partition.
    #[cfg(any(debug_assertions, test))]
    pub fn check_consistency(&self, partition: &PartitionedStates) {
        for (index, transition) in self.transitions.iter().enumerate() {
            assert_eq!(self.pred[transition.pred_pos], index, "Predecessor position of {index} is wrong");
            assert_eq!(self.succ[transition.succ_pos], index, "Successor position of {index} is wrong");

            let inert = partition.block_of(transition.source) == partition.block_of(transition.target);
            assert_eq!(
                transition.succ_pos >= partition.states[transition.source].inert_succ_begin,
                inert,
                "Transition {index} is in the wrong successor range"
            );
            assert_eq!(
                transition.pred_pos >= partition.states[transition.target].inert_pred_begin,
                inert,
                "Transition {index} is in the wrong predecessor range"
            );

            match transition.slice {
                Some(slice) => {
                    assert!(!inert, "Inert transition {index} is in a slice");
                    assert_eq!(self.slices[slice].block, partition.block_of(transition.source));
                    assert_eq!(self.slices[slice].constellation, partition.constellation_of(transition.target));
                }
                None => assert!(inert, "Non-inert transition {index} is not in a slice"),
            }
        }

        for (block_index, block) in partition.blocks.iter().enumerate() {
            for slice in block.slices.iter(&self.slices) {
                assert_eq!(self.slices[slice].block, block_index);
                assert!(!self.slices[slice].transitions.is_empty(), "Slice {slice} is empty");
            }
        }
    }
}
