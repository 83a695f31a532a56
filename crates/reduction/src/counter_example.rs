use std::collections::BTreeSet;

use itertools::Itertools;
use log::debug;
use log::trace;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use bisim_lts::LabelIndex;
use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;
use bisim_lts::TAU_LABEL;

use crate::branching_bisim_signature;
use crate::signature_refinement;
use crate::strong_bisim_signature;
use crate::Equivalence;
use crate::IndexedPartition;
use crate::Partition;
use crate::ReductionError;
use crate::SignatureBuilder;

/// A sequence of labels.
pub type Trace = Vec<LabelIndex>;

/// Computes the traces that distinguish two states.
///
/// Signature refinement is used to record the sequence of partitions, where
/// the partition at level k distinguishes exactly the states that can be told
/// apart by k steps. Two states that are first separated at level k differ in
/// a step `a` into a block of level k - 1, and the successors reached by that
/// step are separated at a lower level.
///
/// For the branching equivalences the system must be free of tau cycles,
/// other than tau self-loops, as is the case after [crate::scc_reduce].
pub struct CounterExampleGenerator<'a> {
    lts: &'a LabelledTransitionSystem,
    equivalence: Equivalence,
    history: Vec<IndexedPartition>,
    cache: FxHashMap<(StateIndex, StateIndex), BTreeSet<Trace>>,

    builder: SignatureBuilder,
    visited: FxHashSet<StateIndex>,
    stack: Vec<StateIndex>,
}

impl<'a> CounterExampleGenerator<'a> {
    pub fn new(lts: &'a LabelledTransitionSystem, equivalence: Equivalence) -> Self {
        let mut history = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack = Vec::new();
        signature_refinement(
            lts,
            |state_index, partition, builder| {
                compute_signature(lts, equivalence, state_index, partition, builder, &mut visited, &mut stack)
            },
            |partition| history.push(partition.clone()),
        );
        debug!("Recorded {} levels of partitions", history.len());

        Self {
            lts,
            equivalence,
            history,
            cache: FxHashMap::default(),
            builder: SignatureBuilder::default(),
            visited,
            stack,
        }
    }

    /// Returns the distinguishing traces of the two states.
    pub fn traces(&mut self, state: StateIndex, other_state: StateIndex) -> Result<BTreeSet<Trace>, ReductionError> {
        for state_index in [state, other_state] {
            if state_index >= self.lts.num_of_states() {
                return Err(ReductionError::InvalidState(state_index, self.lts.num_of_states()));
            }
        }

        if self.separation_level(state, other_state).is_none() {
            return Err(ReductionError::BisimilarStates(state, other_state));
        }

        Ok(self.distinguishing_traces(state, other_state))
    }

    /// Returns the first level at which the states are in different blocks.
    fn separation_level(&self, state: StateIndex, other_state: StateIndex) -> Option<usize> {
        self.history
            .iter()
            .position(|partition| partition.block_number(state) != partition.block_number(other_state))
    }

    fn distinguishing_traces(&mut self, state: StateIndex, other_state: StateIndex) -> BTreeSet<Trace> {
        if let Some(traces) = self.cache.get(&(state, other_state)) {
            return traces.clone();
        }

        let level = self
            .separation_level(state, other_state)
            .expect("Only separated states have distinguishing traces");
        debug_assert!(level > 0, "All states are related at the first level");
        let previous = level - 1;

        // Find a step of one state that the other can not mimic.
        let signature = self.signature(state, previous);
        let other_signature = self.signature(other_state, previous);
        let (left, right, pair) = match signature.iter().find(|pair| !other_signature.contains(pair)) {
            Some(pair) => (state, other_state, *pair),
            None => {
                let pair = other_signature
                    .iter()
                    .find(|pair| !signature.contains(pair))
                    .expect("Separated states have different signatures");
                (other_state, state, *pair)
            }
        };

        let label = pair.label();
        let block = pair.block();
        trace!("States {left} and {right} are separated at level {level} by ({label}, {block})");

        let mut result = BTreeSet::new();
        if self.equivalence.preserve_divergence()
            && label == TAU_LABEL
            && block == self.history[previous].block_number(left)
        {
            // Only one of the states can diverge.
            result.insert(vec![TAU_LABEL]);
        } else {
            let left_successors: Vec<StateIndex> = self
                .successors(left, label, previous)
                .into_iter()
                .filter(|successor| self.history[previous].block_number(*successor) == block)
                .collect();
            let right_successors = self.successors(right, label, previous);

            if right_successors.is_empty() {
                result.insert(vec![label]);
            }

            for (left_successor, right_successor) in left_successors.iter().cartesian_product(right_successors.iter()) {
                for trace in self.distinguishing_traces(*left_successor, *right_successor) {
                    let mut extended = Vec::with_capacity(trace.len() + 1);
                    extended.push(label);
                    extended.extend(trace);
                    result.insert(extended);
                }
            }
        }

        self.cache.insert((state, other_state), result.clone());
        result
    }

    /// Returns the signature of the state with respect to the partition at the given level.
    fn signature(&mut self, state_index: StateIndex, level: usize) -> SignatureBuilder {
        compute_signature(
            self.lts,
            self.equivalence,
            state_index,
            &self.history[level],
            &mut self.builder,
            &mut self.visited,
            &mut self.stack,
        );
        self.builder.clone()
    }

    /// Returns the states reached by a step with the given label, for the
    /// branching equivalences possibly preceded by inert tau steps with respect
    /// to the partition at the given level.
    fn successors(&self, state_index: StateIndex, label: LabelIndex, level: usize) -> Vec<StateIndex> {
        let partition = &self.history[level];
        let mut result = Vec::new();

        if !self.equivalence.is_branching() {
            result.extend(
                self.lts
                    .outgoing_transitions(state_index)
                    .filter(|(transition_label, _)| *transition_label == label)
                    .map(|(_, to)| to),
            );
            return result;
        }

        let block = partition.block_number(state_index);
        let mut visited = FxHashSet::default();
        let mut stack = vec![state_index];
        visited.insert(state_index);

        while let Some(inner_state_index) = stack.pop() {
            for (transition_label, to) in self.lts.outgoing_transitions(inner_state_index) {
                let inert = self.lts.is_hidden_label(transition_label) && partition.block_number(to) == block;

                if inert {
                    if visited.insert(to) {
                        stack.push(to);
                    }
                } else if transition_label == label {
                    result.push(to);
                }
            }
        }

        result.sort_unstable();
        result.dedup();
        result
    }
}

fn compute_signature(
    lts: &LabelledTransitionSystem,
    equivalence: Equivalence,
    state_index: StateIndex,
    partition: &IndexedPartition,
    builder: &mut SignatureBuilder,
    visited: &mut FxHashSet<StateIndex>,
    stack: &mut Vec<StateIndex>,
) {
    if equivalence.is_branching() {
        branching_bisim_signature(
            state_index,
            lts,
            partition,
            equivalence.preserve_divergence(),
            builder,
            visited,
            stack,
        );
    } else {
        strong_bisim_signature(state_index, lts, partition, builder);
    }
}

/// Formats the trace using the label names of the system.
pub fn format_trace(lts: &LabelledTransitionSystem, trace: &[LabelIndex]) -> String {
    trace.iter().map(|label| &lts.labels()[*label]).join(" ")
}
