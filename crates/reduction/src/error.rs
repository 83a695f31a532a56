use thiserror::Error;

use bisim_lts::LtsError;
use bisim_lts::StateIndex;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReductionError {
    #[error("States {0} and {1} are bisimilar, so there is no distinguishing trace")]
    BisimilarStates(StateIndex, StateIndex),

    #[error("State {0} does not exist, the system has {1} states")]
    InvalidState(StateIndex, usize),

    #[error(transparent)]
    Lts(#[from] LtsError),
}
