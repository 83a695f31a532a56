use std::collections::BTreeSet;

use test_case::test_case;

use bisim_lts::random_lts;
use bisim_lts::LabelledTransitionSystem;
use bisim_reduction::bisim_sigref;
use bisim_reduction::bisimulation_compare;
use bisim_reduction::bisimulation_reduce;
use bisim_reduction::BisimulationPartitioner;
use bisim_reduction::Equivalence;
use bisim_reduction::Partition;
use bisim_reduction::ReductionError;
use bisim_utilities::random_test;
use bisim_utilities::Timing;

#[test_case(Equivalence::StrongBisim ; "strong")]
#[test_case(Equivalence::BranchingBisim ; "branching")]
#[test_case(Equivalence::DivergencePreservingBranchingBisim ; "divergence preserving branching")]
fn test_random_same_as_sigref(equivalence: Equivalence) {
    let _ = env_logger::builder().is_test(true).try_init();

    random_test(100, |rng| {
        let lts = random_lts(20, 3, 3, rng);
        let mut timing = Timing::new();

        let partitioner = BisimulationPartitioner::new(&lts, equivalence, &mut timing);
        let expected = bisim_sigref(&lts, equivalence, &mut timing);

        assert!(
            partitioner.partition().same_relation(&expected),
            "The partition for {equivalence} differs from signature refinement on {lts:?}: {} and {expected}",
            partitioner.partition()
        );
        assert_eq!(partitioner.num_eq_classes(), expected.num_of_blocks());
    });
}

#[test_case(Equivalence::StrongBisim ; "strong")]
#[test_case(Equivalence::BranchingBisim ; "branching")]
#[test_case(Equivalence::DivergencePreservingBranchingBisim ; "divergence preserving branching")]
fn test_random_quotient_is_minimal(equivalence: Equivalence) {
    let _ = env_logger::builder().is_test(true).try_init();

    random_test(50, |rng| {
        let lts = random_lts(20, 3, 2, rng);
        let mut timing = Timing::new();

        let partitioner = BisimulationPartitioner::new(&lts, equivalence, &mut timing);
        let quotient = partitioner.quotient();
        assert_eq!(quotient.num_of_states(), partitioner.num_eq_classes());
        assert_eq!(
            quotient.initial_state_index(),
            partitioner.get_eq_class(lts.initial_state_index())
        );

        // Reducing the quotient again does not merge any states.
        let again = BisimulationPartitioner::new(&quotient, equivalence, &mut timing);
        assert_eq!(again.num_eq_classes(), quotient.num_of_states());
        for state_index in quotient.iter_states() {
            assert_eq!(again.get_eq_class(state_index), state_index);
        }

        assert!(bisimulation_compare(&lts, &quotient, equivalence, &mut timing).unwrap());
    });
}

#[test_case(50 ; "50 states")]
#[test_case(200 ; "200 states")]
#[test_case(1000 ; "1000 states")]
fn test_random_complexity_bounds(num_of_states: usize) {
    let _ = env_logger::builder().is_test(true).try_init();

    random_test(5, |rng| {
        let lts = random_lts(num_of_states, 4, 3, rng);

        for equivalence in [
            Equivalence::StrongBisim,
            Equivalence::BranchingBisim,
            Equivalence::DivergencePreservingBranchingBisim,
        ] {
            let partitioner = BisimulationPartitioner::new(&lts, equivalence, &mut Timing::new());
            let statistics = partitioner.statistics();

            assert!(
                statistics.within_bounds(),
                "The counters for {equivalence} exceed the bounds:\n{statistics}"
            );
        }
    });
}

#[test]
fn test_divergence_is_observable() {
    let _ = env_logger::builder().is_test(true).try_init();

    // States 0 and 1 have a tau self-loop, 2 has not, and all can do a to 3.
    let lts = LabelledTransitionSystem::new(
        0,
        4,
        vec![(0, 0, 0), (0, 1, 3), (1, 0, 1), (1, 1, 3), (2, 1, 3)],
        vec!["tau".into(), "a".into()],
        vec![],
    )
    .unwrap();

    let mut timing = Timing::new();
    let divergence = BisimulationPartitioner::new(&lts, Equivalence::DivergencePreservingBranchingBisim, &mut timing);
    assert!(divergence.in_same_class(0, 1));
    assert!(!divergence.in_same_class(0, 2));
    assert_eq!(divergence.num_eq_classes(), 3);

    let branching = BisimulationPartitioner::new(&lts, Equivalence::BranchingBisim, &mut timing);
    assert!(branching.in_same_class(0, 1));
    assert!(branching.in_same_class(0, 2));
    assert_eq!(branching.num_eq_classes(), 2);
}

#[test]
fn test_inert_tau_chain() {
    let _ = env_logger::builder().is_test(true).try_init();

    // 0 -a-> 1 -tau-> 2, where both 1 and 2 can do b to 3.
    let lts = LabelledTransitionSystem::new(
        0,
        4,
        vec![(0, 1, 1), (1, 0, 2), (1, 2, 3), (2, 2, 3)],
        vec!["tau".into(), "a".into(), "b".into()],
        vec![],
    )
    .unwrap();

    let mut timing = Timing::new();
    let branching = BisimulationPartitioner::new(&lts, Equivalence::BranchingBisim, &mut timing);
    assert!(branching.in_same_class(1, 2));
    assert_eq!(branching.num_eq_classes(), 3);

    let strong = BisimulationPartitioner::new(&lts, Equivalence::StrongBisim, &mut timing);
    assert!(!strong.in_same_class(1, 2));
    assert_eq!(strong.num_eq_classes(), 4);
}

#[test]
fn test_reduce_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Two copies of a.b that are bisimilar, reached by tau from the initial state.
    let lts = LabelledTransitionSystem::new(
        0,
        7,
        vec![(0, 0, 1), (0, 0, 4), (1, 1, 2), (2, 2, 3), (4, 1, 5), (5, 2, 6)],
        vec!["tau".into(), "a".into(), "b".into()],
        vec![],
    )
    .unwrap();

    let mut timing = Timing::new();
    let partitioner = BisimulationPartitioner::new(&lts, Equivalence::BranchingBisim, &mut timing);
    let reduced = bisimulation_reduce(&lts, Equivalence::BranchingBisim, &mut timing);

    assert_eq!(partitioner.num_eq_classes(), 3);
    assert_eq!(reduced.num_of_states(), partitioner.num_eq_classes());
    assert_eq!(reduced.initial_state_index(), partitioner.get_eq_class(lts.initial_state_index()));

    let transitions: BTreeSet<(usize, usize, usize)> = reduced.iter_transitions().collect();
    assert_eq!(
        transitions,
        BTreeSet::from([
            (partitioner.get_eq_class(0), 1, partitioner.get_eq_class(2)),
            (partitioner.get_eq_class(2), 2, partitioner.get_eq_class(3)),
        ])
    );
}

#[test]
fn test_hidden_labels() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Hiding c makes 0 -c-> 1 -a-> 2 branching bisimilar to 3 -a-> 4.
    let lts = LabelledTransitionSystem::new(
        0,
        5,
        vec![(0, 2, 1), (1, 1, 2), (3, 1, 4)],
        vec!["tau".into(), "a".into(), "c".into()],
        vec!["c".into()],
    )
    .unwrap();

    let partitioner = BisimulationPartitioner::new(&lts, Equivalence::BranchingBisim, &mut Timing::new());
    assert!(partitioner.in_same_class(0, 3));
    assert!(partitioner.in_same_class(1, 3));
}

#[test]
fn test_counter_traces() {
    let _ = env_logger::builder().is_test(true).try_init();

    // 0 -a-> 1 -b-> 2 versus 3 -a-> 4 -c-> 5
    let lts = LabelledTransitionSystem::new(
        0,
        6,
        vec![(0, 1, 1), (1, 2, 2), (3, 1, 4), (4, 3, 5)],
        vec!["tau".into(), "a".into(), "b".into(), "c".into()],
        vec![],
    )
    .unwrap();

    let partitioner = BisimulationPartitioner::new(&lts, Equivalence::StrongBisim, &mut Timing::new());
    let traces = partitioner.counter_traces(0, 3).unwrap();
    assert!(!traces.is_empty());
    for trace in &traces {
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0], 1);
    }

    assert_eq!(
        partitioner.counter_traces(2, 5),
        Err(ReductionError::BisimilarStates(2, 5))
    );
}

#[test]
fn test_random_counter_traces() {
    let _ = env_logger::builder().is_test(true).try_init();

    random_test(20, |rng| {
        let lts = random_lts(10, 3, 2, rng);
        let partitioner = BisimulationPartitioner::new(&lts, Equivalence::StrongBisim, &mut Timing::new());

        for state_index in lts.iter_states() {
            for other_state_index in lts.iter_states() {
                let result = partitioner.counter_traces(state_index, other_state_index);
                if partitioner.in_same_class(state_index, other_state_index) {
                    assert!(result.is_err());
                } else {
                    let traces = result.unwrap();
                    assert!(
                        !traces.is_empty(),
                        "States {state_index} and {other_state_index} have no distinguishing trace"
                    );
                    assert!(traces.iter().all(|trace| !trace.is_empty()));
                }
            }
        }
    });
}
