use std::fmt;
use std::ops::Range;

use bisim_lts::StateIndex;

use crate::LinkedList;

pub(crate) type BlockIndex = usize;
pub(crate) type ConstellationIndex = usize;

/// Value of [StateInfo::notblue] outside of a refinement step.
pub(crate) const NOTBLUE_UNDEFINED: usize = usize::MAX;

/// Per-state information of a (Kripke) state.
///
/// The incoming transitions of a state are `pred[pred_begin..pred_end]`, with
/// the inert ones last, starting at `inert_pred_begin`. The outgoing
/// transitions are laid out the same way in `succ`.
#[derive(Clone, Debug)]
pub(crate) struct StateInfo {
    pub block: BlockIndex,
    pub pos: usize,

    pub pred_begin: usize,
    pub inert_pred_begin: usize,
    pub pred_end: usize,

    pub succ_begin: usize,
    pub inert_succ_begin: usize,
    pub succ_end: usize,

    /// The number of inert successors that are not yet known to be blue.
    pub notblue: usize,
}

impl Default for StateInfo {
    fn default() -> Self {
        Self {
            block: 0,
            pos: 0,
            pred_begin: 0,
            inert_pred_begin: 0,
            pred_end: 0,
            succ_begin: 0,
            inert_succ_begin: 0,
            succ_end: 0,
            notblue: NOTBLUE_UNDEFINED,
        }
    }
}

impl StateInfo {
    pub fn noninert_pred(&self) -> Range<usize> {
        self.pred_begin..self.inert_pred_begin
    }

    pub fn inert_pred(&self) -> Range<usize> {
        self.inert_pred_begin..self.pred_end
    }

    pub fn noninert_succ(&self) -> Range<usize> {
        self.succ_begin..self.inert_succ_begin
    }

    pub fn inert_succ(&self) -> Range<usize> {
        self.inert_succ_begin..self.succ_end
    }

    pub fn is_bottom(&self) -> bool {
        self.inert_succ_begin == self.succ_end
    }
}

/// A block is the range `[begin, end)` of the permutation, subdivided into
/// marked non-bottom, unmarked non-bottom, unmarked bottom and marked bottom
/// states, in that order.
#[derive(Clone, Debug)]
pub(crate) struct Block {
    pub begin: usize,
    pub unmarked_nonbottom_begin: usize,
    pub bottom_begin: usize,
    pub marked_bottom_begin: usize,
    pub end: usize,

    pub constellation: ConstellationIndex,

    /// The slices of non-inert transitions leaving this block.
    pub slices: LinkedList,

    /// Set while the block is on the list of blocks to refine.
    pub refinable: bool,
}

impl Block {
    pub fn new(begin: usize, bottom_begin: usize, end: usize, constellation: ConstellationIndex) -> Self {
        debug_assert!(begin <= bottom_begin && bottom_begin <= end, "Invalid block range");
        Self {
            begin,
            unmarked_nonbottom_begin: begin,
            bottom_begin,
            marked_bottom_begin: end,
            end,
            constellation,
            slices: LinkedList::new(),
            refinable: false,
        }
    }

    pub fn size(&self) -> usize {
        self.end - self.begin
    }

    pub fn range(&self) -> Range<usize> {
        self.begin..self.end
    }

    pub fn bottom(&self) -> Range<usize> {
        self.bottom_begin..self.end
    }

    pub fn marked_nonbottom(&self) -> Range<usize> {
        self.begin..self.unmarked_nonbottom_begin
    }

    pub fn unmarked_nonbottom(&self) -> Range<usize> {
        self.unmarked_nonbottom_begin..self.bottom_begin
    }

    pub fn unmarked_bottom(&self) -> Range<usize> {
        self.bottom_begin..self.marked_bottom_begin
    }

    pub fn marked_bottom(&self) -> Range<usize> {
        self.marked_bottom_begin..self.end
    }

    pub fn unmarked_bottom_size(&self) -> usize {
        self.marked_bottom_begin - self.bottom_begin
    }

    pub fn marked_bottom_size(&self) -> usize {
        self.end - self.marked_bottom_begin
    }

    pub fn marked_size(&self) -> usize {
        (self.unmarked_nonbottom_begin - self.begin) + self.marked_bottom_size()
    }
}

/// A constellation is a range of the permutation consisting of whole blocks.
#[derive(Clone, Debug)]
pub(crate) struct Constellation {
    pub begin: usize,
    pub end: usize,

    /// Set while the constellation is on the stack of non-trivial constellations.
    pub nontrivial: bool,
}

/// The partition of the states into blocks and constellations.
pub(crate) struct PartitionedStates {
    pub states: Vec<StateInfo>,
    pub permutation: Vec<StateIndex>,
    pub blocks: Vec<Block>,
    pub constellations: Vec<Constellation>,

    nontrivial: Vec<ConstellationIndex>,
}

impl PartitionedStates {
    /// Creates the partition with the given blocks in one constellation. The
    /// `permutation` must list the states of every block contiguously, with
    /// the non-bottom states first.
    pub fn new(mut states: Vec<StateInfo>, permutation: Vec<StateIndex>, block_ranges: &[(usize, usize, usize)]) -> Self {
        for (pos, state_index) in permutation.iter().enumerate() {
            states[*state_index].pos = pos;
        }

        let mut blocks = Vec::with_capacity(block_ranges.len());
        for (block_index, (begin, bottom_begin, end)) in block_ranges.iter().enumerate() {
            blocks.push(Block::new(*begin, *bottom_begin, *end, 0));
            for state_index in &permutation[*begin..*end] {
                states[*state_index].block = block_index;
            }
        }

        let mut result = Self {
            constellations: vec![Constellation {
                begin: 0,
                end: permutation.len(),
                nontrivial: false,
            }],
            states,
            permutation,
            blocks,
            nontrivial: Vec::new(),
        };

        if !result.is_trivial(0) {
            result.make_nontrivial(0);
        }

        result
    }

    /// Exchanges the states at the two positions of the permutation.
    pub fn swap_permutation(&mut self, pos1: usize, pos2: usize) {
        if pos1 != pos2 {
            self.permutation.swap(pos1, pos2);
            self.states[self.permutation[pos1]].pos = pos1;
            self.states[self.permutation[pos2]].pos = pos2;
        }
    }

    /// Exchanges the adjacent ranges `[begin, middle)` and `[middle, end)`,
    /// not preserving the order within them, using as many swaps as the
    /// smaller range has states.
    pub fn swap_ranges(&mut self, begin: usize, middle: usize, end: usize) {
        let first = middle - begin;
        let second = end - middle;

        if first <= second {
            for i in 0..first {
                self.swap_permutation(begin + i, end - first + i);
            }
        } else {
            for i in 0..second {
                self.swap_permutation(begin + i, middle + i);
            }
        }
    }

    pub fn block_of(&self, state_index: StateIndex) -> BlockIndex {
        self.states[state_index].block
    }

    pub fn constellation_of(&self, state_index: StateIndex) -> ConstellationIndex {
        self.blocks[self.states[state_index].block].constellation
    }

    pub fn is_marked(&self, state_index: StateIndex) -> bool {
        let block = &self.blocks[self.states[state_index].block];
        let pos = self.states[state_index].pos;
        pos < block.unmarked_nonbottom_begin || pos >= block.marked_bottom_begin
    }

    /// Marks the state, returns true iff it was not marked before.
    pub fn mark(&mut self, state_index: StateIndex) -> bool {
        let block_index = self.states[state_index].block;
        let pos = self.states[state_index].pos;
        let block = &self.blocks[block_index];

        if pos < block.unmarked_nonbottom_begin || pos >= block.marked_bottom_begin {
            return false;
        }

        if pos < block.bottom_begin {
            let target = block.unmarked_nonbottom_begin;
            self.swap_permutation(pos, target);
            self.blocks[block_index].unmarked_nonbottom_begin += 1;
        } else {
            let target = block.marked_bottom_begin - 1;
            self.swap_permutation(pos, target);
            self.blocks[block_index].marked_bottom_begin -= 1;
        }

        true
    }

    /// Unmarks all states of the block.
    pub fn clear_marks(&mut self, block_index: BlockIndex) {
        let block = &mut self.blocks[block_index];
        block.unmarked_nonbottom_begin = block.begin;
        block.marked_bottom_begin = block.end;
    }

    /// Turns an unmarked non-bottom state, that lost its last inert outgoing
    /// transition, into an unmarked bottom state.
    pub fn make_bottom(&mut self, state_index: StateIndex) {
        let block_index = self.states[state_index].block;
        let pos = self.states[state_index].pos;
        let block = &self.blocks[block_index];

        debug_assert!(
            pos >= block.unmarked_nonbottom_begin && pos < block.bottom_begin,
            "Only unmarked non-bottom states can become bottom states"
        );

        let target = block.bottom_begin - 1;
        self.swap_permutation(pos, target);
        self.blocks[block_index].bottom_begin -= 1;
    }

    /// Returns true iff the constellation consists of a single block.
    pub fn is_trivial(&self, constellation: ConstellationIndex) -> bool {
        let constellation = &self.constellations[constellation];
        constellation.begin == constellation.end
            || self.blocks[self.states[self.permutation[constellation.begin]].block].end == constellation.end
    }

    /// Registers the constellation as non-trivial, if it is not already.
    pub fn make_nontrivial(&mut self, constellation: ConstellationIndex) {
        if !self.constellations[constellation].nontrivial {
            self.constellations[constellation].nontrivial = true;
            self.nontrivial.push(constellation);
        }
    }

    /// Returns some non-trivial constellation.
    pub fn some_nontrivial(&self) -> Option<ConstellationIndex> {
        self.nontrivial.last().copied()
    }

    /// Carves the smaller of the first and last block out of the non-trivial
    /// constellation into a new constellation. Returns the block and its new
    /// constellation. The block has at most half the states of the
    /// constellation.
    pub fn split_off_small_block(&mut self, constellation: ConstellationIndex) -> (BlockIndex, ConstellationIndex) {
        let Constellation { begin, end, .. } = self.constellations[constellation];
        let first = self.states[self.permutation[begin]].block;
        let last = self.states[self.permutation[end - 1]].block;
        debug_assert_ne!(first, last, "A non-trivial constellation has at least two blocks");

        let small_block = if self.blocks[first].size() <= self.blocks[last].size() {
            self.constellations[constellation].begin = self.blocks[first].end;
            first
        } else {
            self.constellations[constellation].end = self.blocks[last].begin;
            last
        };

        let new_constellation = self.constellations.len();
        self.constellations.push(Constellation {
            begin: self.blocks[small_block].begin,
            end: self.blocks[small_block].end,
            nontrivial: false,
        });
        self.blocks[small_block].constellation = new_constellation;

        if self.is_trivial(constellation) {
            debug_assert_eq!(self.nontrivial.last(), Some(&constellation), "Only the top constellation is split");
            self.nontrivial.pop();
            self.constellations[constellation].nontrivial = false;
        }

        (small_block, new_constellation)
    }

    /// Checks the layout invariants of all blocks and constellations.
    #[cfg(any(debug_assertions, test))]
    pub fn check_consistency(&self) {
        for (pos, state_index) in self.permutation.iter().enumerate() {
            assert_eq!(self.states[*state_index].pos, pos, "Position of state {state_index} is inconsistent");
        }

        for (block_index, block) in self.blocks.iter().enumerate() {
            assert!(
                block.begin <= block.unmarked_nonbottom_begin
                    && block.unmarked_nonbottom_begin <= block.bottom_begin
                    && block.bottom_begin <= block.marked_bottom_begin
                    && block.marked_bottom_begin <= block.end,
                "The sub-ranges of block {block_index} are not ordered"
            );

            let constellation = &self.constellations[block.constellation];
            assert!(
                constellation.begin <= block.begin && block.end <= constellation.end,
                "Block {block_index} is not contained in its constellation"
            );

            for pos in block.range() {
                let state = &self.states[self.permutation[pos]];
                assert_eq!(state.block, block_index, "State at position {pos} is in the wrong block");
                assert_eq!(
                    state.is_bottom(),
                    pos >= block.bottom_begin,
                    "State at position {pos} is in the wrong bottom range"
                );
            }
        }
    }
}

impl fmt::Debug for PartitionedStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (constellation_index, constellation) in self.constellations.iter().enumerate() {
            if constellation.begin == constellation.end {
                continue;
            }

            write!(f, "C{constellation_index}: ")?;
            let mut pos = constellation.begin;
            while pos < constellation.end {
                let block_index = self.states[self.permutation[pos]].block;
                let block = &self.blocks[block_index];
                write!(
                    f,
                    "B{block_index} {:?} {:?} | {:?} {:?} ",
                    &self.permutation[block.marked_nonbottom()],
                    &self.permutation[block.unmarked_nonbottom()],
                    &self.permutation[block.unmarked_bottom()],
                    &self.permutation[block.marked_bottom()]
                )?;
                pos = block.end;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn bottom_state() -> StateInfo {
        StateInfo::default()
    }

    fn nonbottom_state() -> StateInfo {
        StateInfo {
            succ_end: 1,
            ..bottom_state()
        }
    }

    #[test]
    fn test_marking_keeps_ranges_contiguous() {
        // States 0, 1 are non-bottom, 2, 3, 4 are bottom.
        let states = vec![
            nonbottom_state(),
            nonbottom_state(),
            bottom_state(),
            bottom_state(),
            bottom_state(),
        ];
        let mut partition = PartitionedStates::new(states, vec![0, 1, 2, 3, 4], &[(0, 2, 5)]);

        assert!(partition.mark(1));
        assert!(!partition.mark(1));
        assert!(partition.mark(2));
        assert!(partition.mark(4));

        let block = &partition.blocks[0];
        assert_eq!(block.marked_size(), 3);
        assert_eq!(block.unmarked_bottom_size(), 1);
        assert_eq!(&partition.permutation[block.marked_nonbottom()], &[1]);
        assert!(partition.is_marked(2) && partition.is_marked(4) && !partition.is_marked(3));
        partition.check_consistency();

        partition.clear_marks(0);
        assert_eq!(partition.blocks[0].marked_size(), 0);
        assert!(!partition.is_marked(1));
    }

    #[test]
    fn test_swap_ranges() {
        let states = vec![bottom_state(); 7];
        let mut partition = PartitionedStates::new(states, (0..7).collect(), &[(0, 0, 7)]);

        partition.swap_ranges(0, 2, 7);
        let mut moved: Vec<StateIndex> = partition.permutation[5..7].to_vec();
        moved.sort_unstable();
        assert_eq!(moved, vec![0, 1]);

        partition.swap_ranges(0, 5, 7);
        let mut front: Vec<StateIndex> = partition.permutation[0..2].to_vec();
        front.sort_unstable();
        assert_eq!(front, vec![0, 1]);
        partition.check_consistency();
    }

    #[test]
    fn test_split_off_small_block() {
        let states = vec![bottom_state(); 5];
        let mut partition = PartitionedStates::new(states, (0..5).collect(), &[(0, 0, 3), (3, 3, 5)]);

        assert_eq!(partition.some_nontrivial(), Some(0));
        let (block, constellation) = partition.split_off_small_block(0);

        assert_eq!(block, 1);
        assert_eq!(partition.constellations[constellation].begin, 3);
        assert_eq!(partition.constellations[0].end, 3);
        assert_eq!(partition.some_nontrivial(), None);
        assert_eq!(partition.constellation_of(4), constellation);
    }
}
