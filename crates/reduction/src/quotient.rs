use log::debug;

use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;

/// A trait for partition refinment algorithms that expose the block number for
/// every state. Can be used to compute the quotient labelled transition system.
///
/// The invariants are that the union of all blocks is the original set, and
/// that each block contains distinct elements
pub trait Partition {
    /// Returns the block number for the given state.
    fn block_number(&self, state_index: StateIndex) -> usize;

    /// Returns the number of blocks in the partition.
    fn num_of_blocks(&self) -> usize;
}

/// Returns a new LTS based on the given partition.
///
/// All states in a single block are replaced by a single representative state.
/// When `eliminate_tau_loops` is set, tau transitions between states of the
/// same block are removed; otherwise they become tau self-loops.
pub fn quotient_lts(
    lts: &LabelledTransitionSystem,
    partition: &impl Partition,
    eliminate_tau_loops: bool,
) -> LabelledTransitionSystem {
    let start = std::time::Instant::now();

    // Introduce the transitions based on the block numbers
    let transitions = lts.iter_transitions().filter_map(|(from, label, to)| {
        let from_block = partition.block_number(from);
        let to_block = partition.block_number(to);

        debug_assert!(
            from_block < partition.num_of_blocks() && to_block < partition.num_of_blocks(),
            "Quotienting assumes that the block numbers do not exceed the number of blocks"
        );

        // If we eliminate tau loops then check if the to and from end up in the same block
        if eliminate_tau_loops && lts.is_hidden_label(label) && from_block == to_block {
            None
        } else {
            Some((from_block, label, to_block))
        }
    });

    let result = LabelledTransitionSystem::new(
        partition.block_number(lts.initial_state_index()),
        partition.num_of_blocks(),
        transitions,
        lts.labels().into(),
        lts.hidden_labels().into(),
    )
    .expect("The quotient only refers to existing blocks and labels");

    debug!("Time quotient_lts: {:.3}s", start.elapsed().as_secs_f64());
    result
}
