pub mod gridworld;
pub mod mdp;
pub mod simulator;
pub mod solvers;
pub mod stepper;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Discrete = i32;
pub type Continous = f64;

/// Grid coordinate as (row, col); row 0 is the top row.
pub type Cell = (usize, usize);

/// The four compass moves. Enumeration order is fixed; greedy tie-breaks
/// resolve to the earliest action in [`ACTIONS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

pub const ACTIONS: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

impl Action {
    pub fn index(self) -> Discrete {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }

    pub fn from_index(a: Discrete) -> Option<Action> {
        usize::try_from(a).ok().and_then(|i| ACTIONS.get(i)).copied()
    }

    pub(crate) fn offset(self) -> (isize, isize) {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }
}

/// One stochastic outcome of applying an action: where the agent lands,
/// with what probability, and the reward collected on the way in. `done`
/// marks entry into an absorbing terminal cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next_state: Discrete,
    pub probability: Continous,
    pub reward: Continous,
    pub done: bool,
}

pub type Transitions = HashMap<(Discrete, Discrete), Vec<Transition>>;
