use std::collections::BTreeSet;

use log::debug;

use bisim_lts::merge;
use bisim_lts::LabelledTransitionSystem;
use bisim_lts::StateIndex;
use bisim_utilities::Timing;

use crate::bisim_gjkw::GjkwRefinement;
use crate::scc_reduce;
use crate::CounterExampleGenerator;
use crate::Equivalence;
use crate::IndexedPartition;
use crate::Partition;
use crate::ReductionError;
use crate::RefinementStatistics;
use crate::Trace;

/// Partitions the states of a labelled transition system into the classes of
/// strong or (divergence-preserving) branching bisimilarity.
///
/// For the branching equivalences the system is first reduced modulo tau
/// strongly connected components, the classes are reported for the states of
/// the original system.
pub struct BisimulationPartitioner {
    equivalence: Equivalence,

    /// The system on which the classes are computed, reduced for the branching equivalences.
    lts: LabelledTransitionSystem,

    /// Maps every original state to its state in `lts`.
    scc_partition: IndexedPartition,

    /// The classes of the states in `lts`.
    reduced_classes: IndexedPartition,

    /// The classes of the original states.
    classes: IndexedPartition,

    statistics: RefinementStatistics,
}

impl BisimulationPartitioner {
    pub fn new(lts: &LabelledTransitionSystem, equivalence: Equivalence, timing: &mut Timing) -> Self {
        let (reduced, scc_partition) = if equivalence.is_branching() {
            let mut time = timing.start("scc_reduce");
            let result = scc_reduce(lts, equivalence.preserve_divergence());
            time.finish();
            result
        } else {
            (
                lts.clone(),
                IndexedPartition::from_blocks(lts.iter_states().collect()),
            )
        };

        let mut time = timing.start("bisim_gjkw");
        let mut refinement = GjkwRefinement::new(&reduced, equivalence.is_branching(), equivalence.preserve_divergence());
        refinement.run();
        time.finish();

        // Number the classes in the order of their smallest original state.
        let refined = refinement.partition();
        let mut renumbering: Vec<Option<usize>> = vec![None; refined.num_of_blocks()];
        let mut num_of_classes = 0;
        let mut classes = IndexedPartition::new(lts.num_of_states());
        for state_index in lts.iter_states() {
            let block = refined.block_number(scc_partition.block_number(state_index));
            let class = *renumbering[block].get_or_insert_with(|| {
                num_of_classes += 1;
                num_of_classes - 1
            });
            classes.set_block(state_index, class);
        }

        let mut reduced_classes = IndexedPartition::new(reduced.num_of_states());
        for state_index in reduced.iter_states() {
            let class = renumbering[refined.block_number(state_index)]
                .expect("Every reduced state contains an original state");
            reduced_classes.set_block(state_index, class);
        }

        debug!("Found {} classes of {equivalence}", classes.num_of_blocks());
        debug!("{}", refinement.statistics());

        Self {
            equivalence,
            lts: reduced,
            scc_partition,
            reduced_classes,
            classes,
            statistics: refinement.statistics().clone(),
        }
    }

    pub fn equivalence(&self) -> Equivalence {
        self.equivalence
    }

    /// Returns the number of equivalence classes.
    pub fn num_eq_classes(&self) -> usize {
        self.classes.num_of_blocks()
    }

    /// Returns the class of the given original state.
    pub fn get_eq_class(&self, state_index: StateIndex) -> usize {
        self.classes.block_number(state_index)
    }

    /// Returns true iff both original states are equivalent.
    pub fn in_same_class(&self, state_index: StateIndex, other_state_index: StateIndex) -> bool {
        self.get_eq_class(state_index) == self.get_eq_class(other_state_index)
    }

    /// Returns the partition of the original states into classes.
    pub fn partition(&self) -> &IndexedPartition {
        &self.classes
    }

    pub fn statistics(&self) -> &RefinementStatistics {
        &self.statistics
    }

    /// Returns the quotient of the system, which has one state per class.
    ///
    /// The input system is left untouched, the quotient takes the place of
    /// rewriting its transition relation in place.
    pub fn quotient(&self) -> LabelledTransitionSystem {
        let branching = self.equivalence.is_branching();
        let preserve_divergence = self.equivalence.preserve_divergence();

        let transitions = self.lts.iter_transitions().filter_map(|(from, label, to)| {
            let from_class = self.reduced_classes.block_number(from);
            let to_class = self.reduced_classes.block_number(to);

            // Inert tau transitions disappear, only the divergence self-loops remain.
            if branching
                && self.lts.is_hidden_label(label)
                && from_class == to_class
                && !(preserve_divergence && from == to)
            {
                None
            } else {
                Some((from_class, label, to_class))
            }
        });

        LabelledTransitionSystem::new(
            self.reduced_classes.block_number(self.lts.initial_state_index()),
            self.num_eq_classes(),
            transitions,
            self.lts.labels().into(),
            self.lts.hidden_labels().into(),
        )
        .expect("The quotient only refers to existing classes and labels")
    }

    /// Returns the traces that distinguish the two original states.
    pub fn counter_traces(
        &self,
        state_index: StateIndex,
        other_state_index: StateIndex,
    ) -> Result<BTreeSet<Trace>, ReductionError> {
        for index in [state_index, other_state_index] {
            if index >= self.classes.len() {
                return Err(ReductionError::InvalidState(index, self.classes.len()));
            }
        }

        if self.in_same_class(state_index, other_state_index) {
            return Err(ReductionError::BisimilarStates(state_index, other_state_index));
        }

        let mut generator = CounterExampleGenerator::new(&self.lts, self.equivalence);
        generator.traces(
            self.scc_partition.block_number(state_index),
            self.scc_partition.block_number(other_state_index),
        )
    }
}

/// Computes the partition of the states into the classes of the equivalence.
pub fn bisim_partition(lts: &LabelledTransitionSystem, equivalence: Equivalence, timing: &mut Timing) -> IndexedPartition {
    BisimulationPartitioner::new(lts, equivalence, timing).partition().clone()
}

/// Returns the quotient of the system modulo the equivalence.
pub fn bisimulation_reduce(
    lts: &LabelledTransitionSystem,
    equivalence: Equivalence,
    timing: &mut Timing,
) -> LabelledTransitionSystem {
    let partitioner = BisimulationPartitioner::new(lts, equivalence, timing);

    let mut time = timing.start("quotient");
    let result = partitioner.quotient();
    time.finish();

    result
}

/// Returns true iff the initial states of both systems are equivalent.
pub fn bisimulation_compare(
    left: &LabelledTransitionSystem,
    right: &LabelledTransitionSystem,
    equivalence: Equivalence,
    timing: &mut Timing,
) -> Result<bool, ReductionError> {
    let (merged, right_initial_state) = merge(left, right)?;
    let partitioner = BisimulationPartitioner::new(&merged, equivalence, timing);
    Ok(partitioner.in_same_class(merged.initial_state_index(), right_initial_state))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use test_log::test;

    use super::*;

    #[test_case(Equivalence::StrongBisim, 3 ; "strong")]
    #[test_case(Equivalence::BranchingBisim, 2 ; "branching")]
    #[test_case(Equivalence::DivergencePreservingBranchingBisim, 2 ; "divergence preserving")]
    fn test_tau_chain(equivalence: Equivalence, expected_classes: usize) {
        // 0 -a-> 1 -tau-> 2 -b-> 2
        let lts = LabelledTransitionSystem::new(
            0,
            3,
            vec![(0, 1, 1), (1, 0, 2), (2, 2, 2)],
            vec!["tau".into(), "a".into(), "b".into()],
            vec![],
        )
        .unwrap();

        let partitioner = BisimulationPartitioner::new(&lts, equivalence, &mut Timing::new());
        assert_eq!(partitioner.num_eq_classes(), expected_classes);
        assert_eq!(partitioner.get_eq_class(0), 0);

        let quotient = partitioner.quotient();
        assert_eq!(quotient.num_of_states(), expected_classes);
        assert_eq!(quotient.initial_state_index(), partitioner.get_eq_class(0));
    }

    #[test]
    fn test_tau_cycle_classes() {
        // States 0 and 1 form a tau-cycle and can both do a.
        let lts = LabelledTransitionSystem::new(
            0,
            3,
            vec![(0, 0, 1), (1, 0, 0), (0, 1, 2), (1, 1, 2)],
            vec!["tau".into(), "a".into()],
            vec![],
        )
        .unwrap();

        let partitioner = BisimulationPartitioner::new(&lts, Equivalence::BranchingBisim, &mut Timing::new());
        assert!(partitioner.in_same_class(0, 1));
        assert_eq!(partitioner.num_eq_classes(), 2);
        assert_eq!(partitioner.quotient().num_of_transitions(), 1);

        let partitioner =
            BisimulationPartitioner::new(&lts, Equivalence::DivergencePreservingBranchingBisim, &mut Timing::new());
        assert!(partitioner.in_same_class(0, 1));
        assert_eq!(partitioner.quotient().num_of_transitions(), 2);
    }

    #[test]
    fn test_compare() {
        // a.(b + c) versus a.b + a.c
        let left = LabelledTransitionSystem::new(
            0,
            3,
            vec![(0, 1, 1), (1, 2, 2), (1, 3, 2)],
            vec!["tau".into(), "a".into(), "b".into(), "c".into()],
            vec![],
        )
        .unwrap();
        let right = LabelledTransitionSystem::new(
            0,
            4,
            vec![(0, 1, 1), (0, 1, 2), (1, 2, 3), (2, 3, 3)],
            vec!["tau".into(), "a".into(), "b".into(), "c".into()],
            vec![],
        )
        .unwrap();

        let mut timing = Timing::new();
        assert!(!bisimulation_compare(&left, &right, Equivalence::StrongBisim, &mut timing).unwrap());
        assert!(bisimulation_compare(&left, &left, Equivalence::StrongBisim, &mut timing).unwrap());
        assert!(bisimulation_compare(&right, &right, Equivalence::BranchingBisim, &mut timing).unwrap());
    }

    #[test_case(Equivalence::StrongBisim ; "strong")]
    #[test_case(Equivalence::BranchingBisim ; "branching")]
    fn test_compare_label_hidden_on_one_side(equivalence: Equivalence) {
        // 0 -c-> 1 on both sides, but c is hidden on the right.
        let labels = vec!["tau".to_string(), "c".to_string()];
        let left = LabelledTransitionSystem::new(0, 2, vec![(0, 1, 1)], labels.clone(), vec![]).unwrap();
        let right = LabelledTransitionSystem::new(0, 2, vec![(0, 1, 1)], labels, vec!["c".into()]).unwrap();

        let mut timing = Timing::new();
        assert!(!bisimulation_compare(&left, &right, equivalence, &mut timing).unwrap());
        assert!(bisimulation_compare(&right, &right, equivalence, &mut timing).unwrap());
    }
}
