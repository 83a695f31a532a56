use std::fmt;

/// The behavioural equivalences that can be decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Equivalence {
    StrongBisim,
    BranchingBisim,
    DivergencePreservingBranchingBisim,
}

impl Equivalence {
    /// Returns true iff tau transitions are (partially) invisible.
    pub fn is_branching(&self) -> bool {
        matches!(
            self,
            Equivalence::BranchingBisim | Equivalence::DivergencePreservingBranchingBisim
        )
    }

    /// Returns true iff infinite tau paths are observable.
    pub fn preserve_divergence(&self) -> bool {
        matches!(self, Equivalence::DivergencePreservingBranchingBisim)
    }
}

impl fmt::Display for Equivalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Equivalence::StrongBisim => write!(f, "strong bisimilarity"),
            Equivalence::BranchingBisim => write!(f, "branching bisimilarity"),
            Equivalence::DivergencePreservingBranchingBisim => {
                write!(f, "divergence-preserving branching bisimilarity")
            }
        }
    }
}
