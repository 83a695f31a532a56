use rand::Rng;

use crate::LabelledTransitionSystem;

/// Generates a monolithic LTS with the desired number of states and labels,
/// where every state has at most `outdegree` outgoing transitions.
///
/// The first label is "tau", so roughly one in `num_of_labels` transitions is
/// internal.
pub fn random_lts(
    num_of_states: usize,
    num_of_labels: u32,
    outdegree: usize,
    rng: &mut impl Rng,
) -> LabelledTransitionSystem {
    assert!(num_of_states > 0, "A labelled transition system has at least one state");
    assert!(num_of_labels > 0, "At least the tau label must be used");

    // Introduce lower case letters for the labels.
    let mut labels: Vec<String> = vec!["tau".to_string()];
    for i in 1..num_of_labels {
        labels.push(
            char::from_digit(9 + i, 36)
                .map(|c| c.to_string())
                .unwrap_or_else(|| format!("a{i}")),
        );
    }

    let mut transitions = Vec::new();
    for from in 0..num_of_states {
        // Introduce outgoing transitions for this state based on the desired out degree.
        for _ in 0..rng.random_range(0..=outdegree) {
            // Pick a random label and state.
            let label = rng.random_range(0..num_of_labels) as usize;
            let to = rng.random_range(0..num_of_states);

            transitions.push((from, label, to));
        }
    }

    LabelledTransitionSystem::new(0, num_of_states, transitions, labels, Vec::new())
        .expect("The generated transitions only use existing states and labels")
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use bisim_utilities::random_test;

    use super::*;

    #[test]
    fn test_random_lts() {
        random_test(10, |rng| {
            let lts = random_lts(10, 3, 3, rng);

            assert_eq!(lts.num_of_states(), 10);
            assert_eq!(lts.labels(), &["tau".to_string(), "a".to_string(), "b".to_string()]);
            assert!(lts.num_of_transitions() <= 30);
        });
    }
}
