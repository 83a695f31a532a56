use rustc_hash::FxHashMap;

use crate::LabelIndex;
use crate::LabelledTransitionSystem;
use crate::LtsError;
use crate::StateIndex;

/// Places the two labelled transition systems side by side in a single system.
///
/// The states of `left` keep their indices and the states of `right` are
/// shifted by the number of states of `left`. Labels are identified by name.
/// Returns the merged system, which has the initial state of `left`, together
/// with the index of the initial state of `right` in it.
///
/// Hidden labels were already renamed to tau in both systems, so the merged
/// system hides nothing. A label that is hidden in one system stays visible
/// in the other.
pub fn merge(
    left: &LabelledTransitionSystem,
    right: &LabelledTransitionSystem,
) -> Result<(LabelledTransitionSystem, StateIndex), LtsError> {
    let mut labels: Vec<String> = left.labels().to_vec();
    let mut label_index: FxHashMap<String, LabelIndex> =
        labels.iter().enumerate().map(|(index, label)| (label.clone(), index)).collect();

    let right_labels: Vec<LabelIndex> = right
        .labels()
        .iter()
        .map(|label| {
            *label_index.entry(label.clone()).or_insert_with(|| {
                labels.push(label.clone());
                labels.len() - 1
            })
        })
        .collect();

    let offset = left.num_of_states();
    let transitions = left.iter_transitions().chain(
        right
            .iter_transitions()
            .map(|(from, label, to)| (from + offset, right_labels[label], to + offset)),
    );

    let merged = LabelledTransitionSystem::new(
        left.initial_state_index(),
        offset + right.num_of_states(),
        transitions,
        labels,
        Vec::new(),
    )?;

    Ok((merged, right.initial_state_index() + offset))
}
