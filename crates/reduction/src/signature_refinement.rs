use bumpalo::Bump;
use log::debug;
use log::trace;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;
use bisim_utilities::Timing;

use crate::branching_bisim_signature;
use crate::scc_reduce;
use crate::strong_bisim_signature;
use crate::CompactSignaturePair;
use crate::Equivalence;
use crate::IndexedPartition;
use crate::Partition;
use crate::SignatureBuilder;

/// Computes a strong bisimulation partitioning using signature refinement
pub fn strong_bisim_sigref(lts: &LabelledTransitionSystem, timing: &mut Timing) -> IndexedPartition {
    let mut time = timing.start("strong_bisim_sigref");
    let partition = signature_refinement(
        lts,
        |state_index, partition, builder| {
            strong_bisim_signature(state_index, lts, partition, builder);
        },
        |_| {},
    );

    debug_assert!(
        is_valid_refinement(lts, &partition, |state_index, partition, builder| {
            strong_bisim_signature(state_index, lts, partition, builder);
        }),
        "The resulting partition is not a strong bisimulation partition for LTS {:?}",
        lts
    );

    time.finish();
    partition
}

/// Computes a (divergence-preserving) branching bisimulation partitioning
/// using signature refinement
pub fn branching_bisim_sigref(
    lts: &LabelledTransitionSystem,
    preserve_divergence: bool,
    timing: &mut Timing,
) -> IndexedPartition {
    let mut time = timing.start("branching_bisim_sigref");

    // Remove tau-loops since that is a prerequisite for the branching bisimulation signature.
    let (tau_loop_free_lts, scc_partition) = scc_reduce(lts, preserve_divergence);

    let mut stack: Vec<StateIndex> = Vec::new();
    let mut visited = FxHashSet::default();

    let partition = signature_refinement(
        &tau_loop_free_lts,
        |state_index, partition, builder| {
            branching_bisim_signature(
                state_index,
                &tau_loop_free_lts,
                partition,
                preserve_divergence,
                builder,
                &mut visited,
                &mut stack,
            );
        },
        |_| {},
    );

    debug_assert!(
        is_valid_refinement(&tau_loop_free_lts, &partition, |state_index, partition, builder| {
            branching_bisim_signature(
                state_index,
                &tau_loop_free_lts,
                partition,
                preserve_divergence,
                builder,
                &mut visited,
                &mut stack,
            );
        }),
        "The resulting partition is not a branching bisimulation partition for LTS: \n {:?}",
        lts
    );

    time.finish();
    combine_partitions(&scc_partition, &partition)
}

/// Computes the partition for the given equivalence using signature refinement.
pub fn bisim_sigref(lts: &LabelledTransitionSystem, equivalence: Equivalence, timing: &mut Timing) -> IndexedPartition {
    match equivalence {
        Equivalence::StrongBisim => strong_bisim_sigref(lts, timing),
        Equivalence::BranchingBisim => branching_bisim_sigref(lts, false, timing),
        Equivalence::DivergencePreservingBranchingBisim => branching_bisim_sigref(lts, true, timing),
    }
}

/// Returns the partition of the original states given the partition of the
/// states of the SCC-reduced system.
pub fn combine_partitions(scc_partition: &IndexedPartition, reduced_partition: &impl Partition) -> IndexedPartition {
    let mut combined_partition = IndexedPartition::new(scc_partition.len());

    for state_index in 0..scc_partition.len() {
        let scc_block = scc_partition.block_number(state_index);
        combined_partition.set_block(state_index, reduced_partition.block_number(scc_block));
    }

    combined_partition
}

/// General signature refinement algorithm that accepts an arbitrary signature.
///
/// Starting from the partition with a single block it repeatedly assigns a
/// block to every distinct signature until the number of blocks is stable.
/// The `on_iteration` callback observes every intermediate partition, starting
/// with the initial one.
pub fn signature_refinement<F, G>(lts: &LabelledTransitionSystem, mut signature: F, mut on_iteration: G) -> IndexedPartition
where
    F: FnMut(StateIndex, &IndexedPartition, &mut SignatureBuilder),
    G: FnMut(&IndexedPartition),
{
    trace!("{:?}", lts);

    // Avoids reallocations when computing the signature.
    let mut arena = Bump::new();
    let mut builder = SignatureBuilder::default();

    // Put all the states in the initial partition { S }.
    let mut partition = IndexedPartition::new(lts.num_of_states());
    let mut old_count = 1;
    let mut iteration = 0;

    loop {
        on_iteration(&partition);

        // Remove the signatures of the previous iteration.
        arena.reset();
        let mut id: FxHashMap<&[CompactSignaturePair], usize> = FxHashMap::default();
        let mut next_partition = IndexedPartition::new(lts.num_of_states());

        for state_index in lts.iter_states() {
            // Compute the signature of a single state
            signature(state_index, &partition, &mut builder);
            trace!("State {state_index} signature {:?}", builder);

            // Keep track of the index for every state, the arena provides the storage of new signatures.
            let new_id = match id.get(builder.as_slice()) {
                Some(index) => *index,
                None => {
                    let new_id = id.len();
                    id.insert(arena.alloc_slice_copy(&builder), new_id);
                    new_id
                }
            };

            next_partition.set_block(state_index, new_id);
        }

        let new_count = id.len();
        iteration += 1;
        debug!("Iteration {iteration}, found {new_count} blocks");

        debug_assert!(
            iteration <= lts.num_of_states().max(2),
            "There can never be more splits than number of states, but at least two iterations for stability"
        );

        partition = next_partition;
        if new_count == old_count {
            break;
        }

        old_count = new_count;
    }

    trace!("Final partition {partition}");
    partition
}

/// Returns true iff every block of the partition only contains states with the
/// same signature, i.e. the partition is stable for the given signature.
pub fn is_valid_refinement<F, P>(lts: &LabelledTransitionSystem, partition: &P, mut compute_signature: F) -> bool
where
    F: FnMut(StateIndex, &P, &mut SignatureBuilder),
    P: Partition,
{
    let mut representative: Vec<Option<StateIndex>> = vec![None; partition.num_of_blocks()];

    // Avoids reallocations when computing the signature.
    let mut builder = SignatureBuilder::default();

    for state_index in lts.iter_states() {
        let block = partition.block_number(state_index);

        let representative_index = match representative[block] {
            Some(index) => index,
            None => {
                representative[block] = Some(state_index);
                continue;
            }
        };

        // Check that this block only contains states that are bisimilar to the representative state.
        compute_signature(state_index, partition, &mut builder);
        let signature = builder.clone();

        compute_signature(representative_index, partition, &mut builder);

        if signature != builder {
            trace!("State {state_index} has a different signature then representative state {representative_index}, but are in the same block {block}");
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use bisim_lts::random_lts;
    use bisim_utilities::random_test;

    use super::*;

    #[test]
    fn test_random_strong_bisim_sigref() {
        random_test(20, |rng| {
            let lts = random_lts(10, 3, 3, rng);
            let partition = strong_bisim_sigref(&lts, &mut Timing::new());

            assert!(is_valid_refinement(&lts, &partition, |state_index, partition, builder| {
                strong_bisim_signature(state_index, &lts, partition, builder)
            }));
        });
    }

    #[test]
    fn test_random_branching_bisim_sigref() {
        random_test(20, |rng| {
            let lts = random_lts(10, 3, 3, rng);
            let mut timing = Timing::new();

            let strong_partition = strong_bisim_sigref(&lts, &mut timing);
            let branching_partition = branching_bisim_sigref(&lts, false, &mut timing);
            let divergence_partition = branching_bisim_sigref(&lts, true, &mut timing);

            for state_index in lts.iter_states() {
                for other_state_index in lts.iter_states() {
                    if strong_partition.block_number(state_index) == strong_partition.block_number(other_state_index) {
                        // If the states are together according to strong bisimilarity, then they should also be together according to branching bisimilarity.
                        assert_eq!(
                            divergence_partition.block_number(state_index),
                            divergence_partition.block_number(other_state_index),
                            "The divergence-preserving partition should be coarser than the strong partition, but states {state_index} and {other_state_index} are in different blocks"
                        );
                    }

                    if divergence_partition.block_number(state_index) == divergence_partition.block_number(other_state_index) {
                        assert_eq!(
                            branching_partition.block_number(state_index),
                            branching_partition.block_number(other_state_index),
                            "The branching partition should be coarser than the divergence-preserving partition, but states {state_index} and {other_state_index} are in different blocks"
                        );
                    }
                }
            }
        });
    }

    #[test]
    fn test_sigref_iterations() {
        // A chain a.a.a.0 needs one iteration per distinguishable depth.
        let lts = LabelledTransitionSystem::new(
            0,
            4,
            vec![(0, 1, 1), (1, 1, 2), (2, 1, 3)],
            vec!["tau".into(), "a".into()],
            vec![],
        )
        .unwrap();

        let mut history = Vec::new();
        let partition = signature_refinement(
            &lts,
            |state_index, partition, builder| strong_bisim_signature(state_index, &lts, partition, builder),
            |partition| history.push(partition.num_of_blocks()),
        );

        assert_eq!(partition.num_of_blocks(), 4);
        assert_eq!(history, vec![1, 2, 3, 4]);
    }
}
