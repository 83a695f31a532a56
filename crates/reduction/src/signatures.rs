use std::fmt::Debug;

use rustc_hash::FxHashSet;

use bisim_lts::LabelIndex;
use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;
use bisim_lts::TAU_LABEL;

use crate::Partition;

/// A (label, block) pair of a signature packed into a single u64.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct CompactSignaturePair(u64);

impl Debug for CompactSignaturePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.label(), self.block())
    }
}

impl CompactSignaturePair {
    #[inline]
    pub fn new(label: LabelIndex, block: usize) -> Self {
        Self(((label as u64) << 48) | (block as u64 & 0xFFFF_FFFF_FFFF))
    }

    #[inline]
    pub fn label(&self) -> LabelIndex {
        (self.0 >> 48) as LabelIndex
    }

    #[inline]
    pub fn block(&self) -> usize {
        (self.0 & 0xFFFF_FFFF_FFFF) as usize
    }
}

/// The builder used to construct the signature. Signatures are sorted vectors
/// without duplicates, which avoids the overhead of hash sets.
pub type SignatureBuilder = Vec<CompactSignaturePair>;

/// Returns the signature for strong bisimulation sig(s, pi) = { (a, pi(t)) | s -a-> t in T }
pub fn strong_bisim_signature(
    state_index: StateIndex,
    lts: &LabelledTransitionSystem,
    partition: &impl Partition,
    builder: &mut SignatureBuilder,
) {
    builder.clear();

    for transition in lts.outgoing_transitions_compact(state_index) {
        builder.push(CompactSignaturePair::new(
            transition.label(),
            partition.block_number(transition.state()),
        ));
    }

    builder.sort_unstable();
    builder.dedup();
}

/// Returns the branching bisimulation signature
/// sig(s, pi) = { (a, pi(t)) | s -[tau]-> s1 -> ... s_n -[a]-> t in T && pi(s) = pi(s_i) && ((a != tau) || pi(s) != pi(t)) }
///
/// With `preserve_divergence` a tau self-loop on one of the s_i adds the pair
/// (tau, pi(s)), which can not occur otherwise. This requires that every
/// divergence is represented by a self-loop, as is the case after
/// [crate::scc_reduce].
pub fn branching_bisim_signature(
    state_index: StateIndex,
    lts: &LabelledTransitionSystem,
    partition: &impl Partition,
    preserve_divergence: bool,
    builder: &mut SignatureBuilder,
    visited: &mut FxHashSet<StateIndex>,
    stack: &mut Vec<StateIndex>,
) {
    // Clear the builders and the list of visited states.
    builder.clear();
    visited.clear();

    let block = partition.block_number(state_index);

    // A stack used for depth first search of tau paths.
    debug_assert!(stack.is_empty(), "The stack should be empty");
    stack.push(state_index);
    visited.insert(state_index);

    while let Some(inner_state_index) = stack.pop() {
        for transition in lts.outgoing_transitions_compact(inner_state_index) {
            let to_block = partition.block_number(transition.state());

            if lts.is_hidden_label(transition.label()) && block == to_block {
                if transition.state() == inner_state_index {
                    if preserve_divergence {
                        builder.push(CompactSignaturePair::new(TAU_LABEL, block));
                    }
                } else if visited.insert(transition.state()) {
                    // Explore the outgoing state as well, still tau path in same block
                    stack.push(transition.state());
                }
            } else {
                // Either a visible action or a tau transition that leaves the block.
                builder.push(CompactSignaturePair::new(transition.label(), to_block));
            }
        }
    }

    builder.sort_unstable();
    builder.dedup();
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::IndexedPartition;

    use super::*;

    #[test]
    fn test_branching_signature() {
        // 0 -tau-> 1 -a-> 2, 1 -tau-> 1, 0 -tau-> 3
        let lts = LabelledTransitionSystem::new(
            0,
            4,
            vec![(0, 0, 1), (1, 1, 2), (1, 0, 1), (0, 0, 3)],
            vec!["tau".into(), "a".into()],
            vec![],
        )
        .unwrap();

        let partition = IndexedPartition::from_blocks(vec![0, 0, 1, 2]);
        let mut builder = SignatureBuilder::default();
        let mut visited = FxHashSet::default();
        let mut stack = Vec::new();

        branching_bisim_signature(0, &lts, &partition, false, &mut builder, &mut visited, &mut stack);
        assert_eq!(
            builder,
            vec![CompactSignaturePair::new(0, 2), CompactSignaturePair::new(1, 1)]
        );

        branching_bisim_signature(0, &lts, &partition, true, &mut builder, &mut visited, &mut stack);
        assert_eq!(
            builder,
            vec![
                CompactSignaturePair::new(0, 0),
                CompactSignaturePair::new(0, 2),
                CompactSignaturePair::new(1, 1)
            ]
        );

        strong_bisim_signature(0, &lts, &partition, &mut builder);
        assert_eq!(
            builder,
            vec![CompactSignaturePair::new(0, 0), CompactSignaturePair::new(0, 2)]
        );
    }
}
