//!
//! A crate containing partition refinement algorithms for strong and
//! (divergence-preserving) branching bisimulation on labelled transition
//! systems.
//!
//! This crate does not use unsafe code.

#![forbid(unsafe_code)]

mod bisim_gjkw;
mod bisim_partitioner;
mod counter_example;
mod equivalence;
mod error;
mod indexed_partition;
mod linked_list;
mod partitioned_states;
mod partitioned_transitions;
mod pool;
mod quotient;
mod refine;
mod scc_decomposition;
mod signature_refinement;
mod signatures;

pub use bisim_gjkw::bisim_gjkw;
pub use bisim_gjkw::RefinementStatistics;
pub use bisim_partitioner::*;
pub use counter_example::*;
pub use equivalence::*;
pub use error::*;
pub use indexed_partition::*;
pub use linked_list::*;
pub use pool::*;
pub use quotient::*;
pub use scc_decomposition::*;
pub use signature_refinement::*;
pub use signatures::*;
