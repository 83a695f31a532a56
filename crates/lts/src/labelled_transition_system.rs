use std::fmt;

use log::trace;
use thiserror::Error;

/// The index type for a label.
pub type LabelIndex = usize;

/// The index for a state.
pub type StateIndex = usize;

/// The label index that is reserved for the internal action.
pub const TAU_LABEL: LabelIndex = 0;

/// The largest number of labels that fits in a [CompactTransition].
pub const MAX_LABELS: usize = 1 << 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LtsError {
    #[error("The initial state {0} is not one of the {1} states")]
    InvalidInitialState(StateIndex, usize),

    #[error("Transition ({0}, {1}, {2}) refers to a state outside of the {3} states")]
    InvalidState(StateIndex, LabelIndex, StateIndex, usize),

    #[error("Transition ({0}, {1}, {2}) refers to a label outside of the {3} labels")]
    InvalidLabel(StateIndex, LabelIndex, StateIndex, usize),

    #[error("At most {MAX_LABELS} labels are supported, but {0} were given")]
    TooManyLabels(usize),
}

/// A compact representation of a transition using a single u64.
/// The high 16 bits store the label index, the low 48 bits store the target state index.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct CompactTransition(u64);

impl CompactTransition {
    #[inline]
    pub fn new(label: LabelIndex, state: StateIndex) -> Self {
        debug_assert!(label < MAX_LABELS, "Label index too large for compact representation");
        debug_assert!(state < (1 << 48), "State index too large for compact representation");
        Self(((label as u64) << 48) | (state as u64 & 0xFFFF_FFFF_FFFF))
    }

    #[inline]
    pub fn label(&self) -> LabelIndex {
        (self.0 >> 48) as LabelIndex
    }

    #[inline]
    pub fn state(&self) -> StateIndex {
        (self.0 & 0xFFFF_FFFF_FFFF) as StateIndex
    }

    #[inline]
    pub fn to_tuple(&self) -> (LabelIndex, StateIndex) {
        (self.label(), self.state())
    }
}

impl fmt::Debug for CompactTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.label(), self.state())
    }
}

/// Represents a labelled transition system consisting of states with directed
/// labelled edges.
///
/// The outgoing transitions of all states are stored in one array, sorted per
/// state and without duplicates. The label with index [TAU_LABEL] is always the
/// internal action, and every hidden label is renamed to it.
#[derive(Clone, PartialEq, Eq)]
pub struct LabelledTransitionSystem {
    states: Vec<State>,
    transitions: Vec<CompactTransition>,

    labels: Vec<String>,
    hidden_labels: Vec<String>,

    initial_state: StateIndex,
}

impl LabelledTransitionSystem {
    /// Creates a new labelled transition system with `num_of_states` states
    /// and the given (from, label, to) transitions.
    ///
    /// The label indices of the transitions refer to `labels`. When the first
    /// label is neither "tau" nor hidden a "tau" label is inserted in front, so
    /// the indices of the resulting system may be shifted by one. Transitions
    /// labelled with one of the `hidden_labels` become tau transitions.
    pub fn new<I>(
        initial_state: StateIndex,
        num_of_states: usize,
        transitions: I,
        mut labels: Vec<String>,
        hidden_labels: Vec<String>,
    ) -> Result<LabelledTransitionSystem, LtsError>
    where
        I: IntoIterator<Item = (StateIndex, LabelIndex, StateIndex)>,
    {
        if initial_state >= num_of_states {
            return Err(LtsError::InvalidInitialState(initial_state, num_of_states));
        }

        // Keep track of which label indexes are hidden labels.
        let mut hidden_indices: Vec<LabelIndex> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| hidden_labels.contains(label))
            .map(|(index, _)| index)
            .collect();
        hidden_indices.sort_unstable();

        // Make an implicit tau label the first label.
        let introduced_tau = if labels.first().is_some_and(|label| label == "tau") || hidden_indices.contains(&0) {
            if let Some(first) = labels.first_mut() {
                *first = "tau".to_string();
            }
            false
        } else {
            labels.insert(0, "tau".to_string());
            true
        };

        let num_of_input_labels = labels.len() - usize::from(introduced_tau);
        if labels.len() > MAX_LABELS {
            return Err(LtsError::TooManyLabels(labels.len()));
        }

        // Validate and relabel all transitions.
        let mut edges: Vec<(StateIndex, CompactTransition)> = Vec::new();
        for (from, label, to) in transitions {
            if from >= num_of_states || to >= num_of_states {
                return Err(LtsError::InvalidState(from, label, to, num_of_states));
            }

            if label >= num_of_input_labels {
                return Err(LtsError::InvalidLabel(from, label, to, num_of_input_labels));
            }

            let label = if hidden_indices.binary_search(&label).is_ok() {
                TAU_LABEL
            } else if introduced_tau {
                label + 1
            } else {
                label
            };

            edges.push((from, CompactTransition::new(label, to)));
        }

        // Count the number of transitions for every state, and place them.
        let mut states = vec![State::default(); num_of_states];
        for (from, _) in &edges {
            states[*from].outgoing_end += 1;
        }

        states.iter_mut().fold(0, |count, state| {
            let result = count + state.outgoing_end;
            state.outgoing_start = count;
            state.outgoing_end = count;
            result
        });

        let mut placed = vec![CompactTransition::default(); edges.len()];
        for (from, transition) in edges {
            placed[states[from].outgoing_end] = transition;
            states[from].outgoing_end += 1;
        }

        // Sort and deduplicate the outgoing transitions of every state, compacting the array.
        let mut transitions = Vec::with_capacity(placed.len());
        for state in &mut states {
            let outgoing = &mut placed[state.outgoing_start..state.outgoing_end];
            outgoing.sort_unstable();

            state.outgoing_start = transitions.len();
            for transition in outgoing.iter() {
                if transitions.len() == state.outgoing_start || transitions.last() != Some(transition) {
                    transitions.push(*transition);
                }
            }
            state.outgoing_end = transitions.len();
        }

        trace!("Created LTS with {} states and {} transitions", num_of_states, transitions.len());

        Ok(LabelledTransitionSystem {
            initial_state,
            labels,
            hidden_labels,
            states,
            transitions,
        })
    }

    /// Returns the index of the initial state
    pub fn initial_state_index(&self) -> StateIndex {
        self.initial_state
    }

    /// Returns the set of outgoing transitions for the given state.
    pub fn outgoing_transitions(&self, state_index: StateIndex) -> impl Iterator<Item = (LabelIndex, StateIndex)> + '_ {
        self.outgoing_transitions_compact(state_index)
            .iter()
            .map(CompactTransition::to_tuple)
    }

    pub fn outgoing_transitions_compact(&self, state_index: StateIndex) -> &[CompactTransition] {
        let state = &self.states[state_index];
        &self.transitions[state.outgoing_start..state.outgoing_end]
    }

    /// Iterates over all (from, label, to) transitions, ordered by source state.
    pub fn iter_transitions(&self) -> impl Iterator<Item = (StateIndex, LabelIndex, StateIndex)> + '_ {
        self.iter_states().flat_map(move |state_index| {
            self.outgoing_transitions(state_index)
                .map(move |(label, to)| (state_index, label, to))
        })
    }

    /// Iterate over all state_index in the labelled transition system
    pub fn iter_states(&self) -> impl Iterator<Item = StateIndex> {
        0..self.states.len()
    }

    /// Returns the number of states.
    pub fn num_of_states(&self) -> usize {
        self.states.len()
    }

    /// Returns the number of labels.
    pub fn num_of_labels(&self) -> usize {
        self.labels.len()
    }

    /// Returns the number of transitions.
    pub fn num_of_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Returns the list of labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the list of hidden labels.
    pub fn hidden_labels(&self) -> &[String] {
        &self.hidden_labels
    }

    /// Returns the index of the label with the given name.
    pub fn label_index(&self, name: &str) -> Option<LabelIndex> {
        self.labels.iter().position(|label| label == name)
    }

    /// Returns true iff the given label index is a hidden label.
    pub fn is_hidden_label(&self, label_index: LabelIndex) -> bool {
        label_index == TAU_LABEL
    }
}

/// A single state in the LTS, delimiting its outgoing transitions.
#[derive(Clone, Default, PartialEq, Eq)]
struct State {
    outgoing_start: usize,
    outgoing_end: usize,
}

impl fmt::Display for LabelledTransitionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print some information about the LTS.
        writeln!(f, "Number of states: {}", self.states.len())?;
        writeln!(f, "Number of action labels: {}", self.labels.len())?;
        write!(f, "Number of transitions: {}", self.transitions.len())
    }
}

impl fmt::Debug for LabelledTransitionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self)?;
        writeln!(f, "Initial state: {}", self.initial_state)?;
        writeln!(f, "Hidden labels: {:?}", self.hidden_labels)?;

        for (from, label, to) in self.iter_transitions() {
            let label_name = &self.labels[label];
            writeln!(f, "{from} --[{label_name}]-> {to}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_tau_is_introduced() {
        let lts = LabelledTransitionSystem::new(
            0,
            3,
            vec![(0, 0, 1), (1, 1, 2), (0, 0, 1)],
            vec!["a".into(), "b".into()],
            vec![],
        )
        .unwrap();

        assert_eq!(lts.labels(), &["tau".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(lts.num_of_transitions(), 2, "Duplicate transitions are removed");
        assert_eq!(lts.outgoing_transitions(0).collect::<Vec<_>>(), vec![(1, 1)]);
        assert_eq!(lts.outgoing_transitions(1).collect::<Vec<_>>(), vec![(2, 2)]);
    }

    #[test]
    fn test_hidden_labels_become_tau() {
        let lts = LabelledTransitionSystem::new(
            0,
            2,
            vec![(0, 1, 1), (1, 2, 0)],
            vec!["tau".into(), "hide".into(), "keep".into()],
            vec!["hide".into()],
        )
        .unwrap();

        assert_eq!(
            lts.iter_transitions().collect::<Vec<_>>(),
            vec![(0, TAU_LABEL, 1), (1, 2, 0)]
        );
        assert!(lts.is_hidden_label(TAU_LABEL));
        assert_eq!(lts.label_index("keep"), Some(2));
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(
            LabelledTransitionSystem::new(0, 2, vec![(0, 0, 2)], vec!["tau".into()], vec![]),
            Err(LtsError::InvalidState(0, 0, 2, 2))
        );

        assert_eq!(
            LabelledTransitionSystem::new(0, 2, vec![(0, 1, 1)], vec!["tau".into()], vec![]),
            Err(LtsError::InvalidLabel(0, 1, 1, 1))
        );

        assert_eq!(
            LabelledTransitionSystem::new(3, 2, Vec::new(), vec!["tau".into()], vec![]),
            Err(LtsError::InvalidInitialState(3, 2))
        );
    }
}
