use log::debug;
use log::trace;

use bisim_lts::LabelIndex;
use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;

use crate::quotient_lts;
use crate::IndexedPartition;
use crate::Partition;

/// Computes the strongly connected tau component partitioning of the given LTS.
pub fn tau_scc_decomposition(lts: &LabelledTransitionSystem) -> IndexedPartition {
    scc_decomposition(lts, &|_, label_index, _| lts.is_hidden_label(label_index))
}

/// Collapses every strongly connected tau component into a single state.
///
/// Tau transitions inside a component are removed, unless `preserve_divergence`
/// is set, in which case a component with an internal tau transition keeps a
/// single tau self-loop. Returns the reduced LTS and the partition that maps
/// every state to its component, which is the state index in the reduced LTS.
pub fn scc_reduce(lts: &LabelledTransitionSystem, preserve_divergence: bool) -> (LabelledTransitionSystem, IndexedPartition) {
    let partition = tau_scc_decomposition(lts);
    let reduced = quotient_lts(lts, &partition, !preserve_divergence);

    debug_assert!(
        !has_tau_cycle(&reduced, preserve_divergence),
        "The SCC reduction still contains tau-cycles"
    );

    (reduced, partition)
}

/// Computes the strongly connected component partitioning of the given LTS.
///
/// The `filter` determines which (from, label, to) edges are followed. Blocks
/// are numbered in the order in which the components are completed, which is
/// a reverse topological order of the component graph.
pub fn scc_decomposition<F>(lts: &LabelledTransitionSystem, filter: &F) -> IndexedPartition
where
    F: Fn(StateIndex, LabelIndex, StateIndex) -> bool,
{
    let start = std::time::Instant::now();
    trace!("{:?}", lts);

    let mut partition = IndexedPartition::new(lts.num_of_states());

    // The stack of states that are not yet assigned to a component.
    let mut stack = Vec::new();

    // The explicit depth first search stack, storing the next outgoing transition to consider.
    let mut call_stack: Vec<(StateIndex, usize)> = Vec::new();

    // Keep track of already visited states.
    let mut indices: Vec<Option<StateInfo>> = vec![None; lts.num_of_states()];

    let mut smallest_index = 0;
    let mut next_block_number = 0;

    for root in lts.iter_states() {
        if indices[root].is_some() {
            continue;
        }

        visit(root, &mut indices, &mut smallest_index, &mut stack, &mut call_stack);

        while let Some(&(state_index, position)) = call_stack.last() {
            let outgoing = lts.outgoing_transitions_compact(state_index);

            if let Some(transition) = outgoing.get(position) {
                if let Some(top) = call_stack.last_mut() {
                    top.1 += 1;
                }

                let to_index = transition.state();
                if !filter(state_index, transition.label(), to_index) {
                    continue;
                }

                match &indices[to_index] {
                    None => {
                        // Successor w has not yet been visited; descend into it.
                        visit(to_index, &mut indices, &mut smallest_index, &mut stack, &mut call_stack);
                    }
                    Some(info) if info.on_stack => {
                        // Successor w is on the stack and hence in the current SCC.
                        let w_index = info.index;
                        update_lowlink(&mut indices, state_index, w_index);
                    }
                    Some(_) => {
                        // Edge to an SCC that has already been found.
                    }
                }
            } else {
                call_stack.pop();

                let info = indices[state_index]
                    .clone()
                    .expect("States on the call stack have been visited");
                if let Some(&(parent, _)) = call_stack.last() {
                    update_lowlink(&mut indices, parent, info.lowlink);
                }

                if info.lowlink == info.index {
                    // The state is the root of a strongly connected component.
                    while let Some(index) = stack.pop() {
                        if let Some(info) = &mut indices[index] {
                            info.on_stack = false;
                        }

                        trace!("Added state {index} to block {}", next_block_number);
                        partition.set_block(index, next_block_number);

                        if index == state_index {
                            break;
                        }
                    }

                    next_block_number += 1;
                }
            }
        }
    }

    trace!("Final partition {partition}");
    debug!("Found {} strongly connected components", partition.num_of_blocks());
    debug!("Time scc_decomposition: {:.3}s", start.elapsed().as_secs_f64());
    partition
}

#[derive(Clone, Debug)]
struct StateInfo {
    /// A unique index for every state.
    index: usize,

    /// Keeps track of the lowest state that can be reached on the stack.
    lowlink: usize,

    /// Keeps track of whether this state is on the stack.
    on_stack: bool,
}

/// Assigns the next index to the state and pushes it on both stacks.
fn visit(
    state_index: StateIndex,
    indices: &mut [Option<StateInfo>],
    smallest_index: &mut usize,
    stack: &mut Vec<StateIndex>,
    call_stack: &mut Vec<(StateIndex, usize)>,
) {
    trace!("Visiting state {state_index}");

    indices[state_index] = Some(StateInfo {
        index: *smallest_index,
        lowlink: *smallest_index,
        on_stack: true,
    });
    *smallest_index += 1;

    stack.push(state_index);
    call_stack.push((state_index, 0));
}

/// v.lowlink := min(v.lowlink, value)
fn update_lowlink(indices: &mut [Option<StateInfo>], state_index: StateIndex, value: usize) {
    if let Some(info) = &mut indices[state_index] {
        info.lowlink = info.lowlink.min(value);
    }
}

/// Returns true iff the tau transitions of the labelled transition system form
/// a cycle. Tau self-loops are ignored when `ignore_self_loops` is set.
pub fn has_tau_cycle(lts: &LabelledTransitionSystem, ignore_self_loops: bool) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    let mut colour = vec![Colour::White; lts.num_of_states()];
    let mut stack: Vec<(StateIndex, usize)> = Vec::new();

    for root in lts.iter_states() {
        if colour[root] != Colour::White {
            continue;
        }

        colour[root] = Colour::Grey;
        stack.push((root, 0));

        while let Some(&(state_index, position)) = stack.last() {
            let outgoing = lts.outgoing_transitions_compact(state_index);

            if let Some(transition) = outgoing.get(position) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let to_index = transition.state();
                if !lts.is_hidden_label(transition.label()) || (ignore_self_loops && to_index == state_index) {
                    continue;
                }

                match colour[to_index] {
                    Colour::Grey => {
                        trace!("tau-cycle through {state_index} and {to_index}");
                        return true;
                    }
                    Colour::White => {
                        colour[to_index] = Colour::Grey;
                        stack.push((to_index, 0));
                    }
                    Colour::Black => {}
                }
            } else {
                colour[state_index] = Colour::Black;
                stack.pop();
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use bisim_lts::random_lts;
    use bisim_utilities::random_test;

    use super::*;

    /// Returns the reachable states from the given state index.
    fn reachable_states(
        lts: &LabelledTransitionSystem,
        state_index: StateIndex,
        filter: &impl Fn(StateIndex, LabelIndex, StateIndex) -> bool,
    ) -> Vec<StateIndex> {
        let mut stack = vec![state_index];
        let mut visited = vec![false; lts.num_of_states()];

        // Depth first search to find all reachable states.
        while let Some(inner_state_index) = stack.pop() {
            for (label_index, to_index) in lts.outgoing_transitions(inner_state_index) {
                if filter(inner_state_index, label_index, to_index) && !visited[to_index] {
                    visited[to_index] = true;
                    stack.push(to_index);
                }
            }
        }

        // All the states that were visited are reachable.
        visited
            .into_iter()
            .enumerate()
            .filter_map(|(index, visited)| if visited { Some(index) } else { None })
            .collect()
    }

    #[test]
    fn test_random_tau_scc_decomposition() {
        random_test(50, |rng| {
            let lts = random_lts(10, 3, 3, rng);
            let partitioning = tau_scc_decomposition(&lts);
            let reduction = quotient_lts(&lts, &partitioning, true);
            trace!("{:?}", reduction);

            assert!(
                !has_tau_cycle(&reduction, false),
                "The tau-SCC decomposition still contains tau loops"
            );

            // Check that states in a strongly connected component are reachable from each other.
            for state_index in lts.iter_states() {
                let reachable = reachable_states(&lts, state_index, &|_, label, _| lts.is_hidden_label(label));

                // All other states in the same block should be reachable.
                let block = partitioning.block_number(state_index);

                for other_state_index in lts
                    .iter_states()
                    .filter(|index| state_index != *index && partitioning.block_number(*index) == block)
                {
                    assert!(
                        reachable.contains(&other_state_index),
                        "State {state_index} and {other_state_index} should be reachable"
                    );
                }
            }

            assert_eq!(
                reduction.num_of_states(),
                tau_scc_decomposition(&reduction).num_of_blocks(),
                "Applying SCC decomposition again should yield the same number of SCC after second application"
            );
        });
    }

    #[test]
    fn test_cycles() {
        let lts = LabelledTransitionSystem::new(
            0,
            5,
            vec![(0, 0, 2), (0, 0, 4), (1, 0, 0), (2, 0, 1), (2, 1, 0)],
            vec!["tau".into(), "a".into()],
            vec![],
        )
        .unwrap();

        let partition = tau_scc_decomposition(&lts);
        assert_eq!(partition.num_of_blocks(), 3);
        assert_eq!(partition.block_number(0), partition.block_number(1));
        assert_eq!(partition.block_number(0), partition.block_number(2));
        assert_ne!(partition.block_number(0), partition.block_number(4));

        assert!(has_tau_cycle(&lts, false));
    }

    #[test]
    fn test_scc_reduce_divergence() {
        // 0 and 1 form a tau-cycle, 2 has a tau self-loop and 3 is a deadlock.
        let lts = LabelledTransitionSystem::new(
            0,
            4,
            vec![(0, 0, 1), (1, 0, 0), (1, 1, 2), (2, 0, 2), (2, 1, 3)],
            vec!["tau".into(), "a".into()],
            vec![],
        )
        .unwrap();

        let (reduced, partition) = scc_reduce(&lts, false);
        assert_eq!(reduced.num_of_states(), 3);
        assert!(reduced.iter_transitions().all(|(_, label, _)| label != 0));

        let (divergent, divergent_partition) = scc_reduce(&lts, true);
        assert_eq!(partition, divergent_partition);

        let self_loops: Vec<StateIndex> = divergent
            .iter_transitions()
            .filter(|(from, label, to)| *label == 0 && from == to)
            .map(|(from, _, _)| from)
            .collect();
        assert_eq!(
            self_loops,
            {
                let mut expected = vec![partition.block_number(0), partition.block_number(2)];
                expected.sort_unstable();
                expected
            }
        );
        assert!(!has_tau_cycle(&divergent, true));
    }
}
