use crate::gridworld::GridWorld;
use crate::{Action, Cell, Continous, Discrete, Transition, Transitions, ACTIONS};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("discount factor must lie in [0, 1], got {0}")]
    Gamma(Continous),

    #[error("slip probability must lie in [0, 1], got {0}")]
    Slip(Continous),

    #[error("iteration cap must be positive")]
    MaxIterations,

    #[error("convergence threshold must be positive, got {0}")]
    Theta(Continous),

    #[error("evaluation phase needs at least one sweep")]
    EvalSweeps,
}

/// Solve-time knobs; the grid itself lives in [`GridWorld`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Discount factor.
    pub gamma: Continous,
    /// Probability mass taken from the intended move and split uniformly
    /// over the other three actions.
    pub slip: Continous,
    /// Reward on every transition that does not enter a terminal cell.
    pub step_reward: Continous,
    pub max_iterations: usize,
    /// Convergence threshold on the per-sweep value delta.
    #[serde(default = "default_theta")]
    pub theta: Continous,
    /// Expectation sweeps per evaluation phase in policy iteration. A
    /// truncation knob, not an algorithmic requirement.
    #[serde(default = "default_eval_sweeps")]
    pub eval_sweeps: usize,
}

fn default_theta() -> Continous {
    1e-4
}

fn default_eval_sweeps() -> usize {
    10
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            slip: 0.2,
            step_reward: -0.04,
            max_iterations: 1000,
            theta: default_theta(),
            eval_sweeps: default_eval_sweeps(),
        }
    }
}

impl SolverConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigError::Gamma(self.gamma));
        }
        if !(0.0..=1.0).contains(&self.slip) {
            return Err(ConfigError::Slip(self.slip));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::MaxIterations);
        }
        if !(self.theta > 0.0) {
            return Err(ConfigError::Theta(self.theta));
        }
        if self.eval_sweeps == 0 {
            return Err(ConfigError::EvalSweeps);
        }
        Ok(())
    }
}

/// Markov Decision Process - Sutton & Barto 2018.
pub trait Mdp {
    fn n_s(&self) -> usize;

    fn n_a(&self) -> usize;

    fn transitions(&self) -> Rc<Transitions>;

    // TODO: Gamma should not be here.
    fn gamma(&self) -> Continous;

    fn terminal(&self, s: Discrete) -> bool;
}

pub trait Policy {
    fn action(&self, s: Discrete) -> Option<Discrete>;
}

impl Policy for Vec<Option<Discrete>> {
    fn action(&self, s: Discrete) -> Option<Discrete> {
        self.get(s as usize).copied().flatten()
    }
}

/// Bridges a [`GridWorld`] and a [`SolverConfig`] into the tabular MDP the
/// solvers consume. The full outcome table is materialized once, up front;
/// the grid is small and finite, so there is nothing to stream.
#[derive(Debug)]
pub struct GridMdp {
    grid: Rc<GridWorld>,
    config: SolverConfig,
    transitions: Rc<Transitions>,
}

impl GridMdp {
    pub fn new(grid: Rc<GridWorld>, config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transitions = Rc::new(Self::build_transitions(&grid, &config));
        debug!(
            "materialized {} state-action rows over {} states",
            transitions.len(),
            grid.states().len()
        );

        Ok(Self {
            grid,
            config,
            transitions,
        })
    }

    pub fn grid(&self) -> &Rc<GridWorld> {
        &self.grid
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn build_transitions(grid: &GridWorld, config: &SolverConfig) -> Transitions {
        let mut table: Transitions = HashMap::new();
        for (i, &cell) in grid.states().iter().enumerate() {
            let s = i as Discrete;
            if grid.is_terminal(cell) {
                // Absorbing: every action loops back for free.
                for action in ACTIONS {
                    table.insert(
                        (s, action.index()),
                        vec![Transition {
                            next_state: s,
                            probability: 1.0,
                            reward: 0.0,
                            done: true,
                        }],
                    );
                }
                continue;
            }
            for action in ACTIONS {
                // Intended outcome first, then the slip outcomes in
                // enumeration order. Zero-probability entries stay in the
                // table so the row shape is uniform at both slip extremes.
                let mut outcomes = Vec::with_capacity(ACTIONS.len());
                outcomes.push(Self::outcome(grid, config, cell, action, 1.0 - config.slip));
                for other in ACTIONS.into_iter().filter(|&o| o != action) {
                    outcomes.push(Self::outcome(grid, config, cell, other, config.slip / 3.0));
                }
                table.insert((s, action.index()), outcomes);
            }
        }

        table
    }

    fn outcome(
        grid: &GridWorld,
        config: &SolverConfig,
        cell: Cell,
        direction: Action,
        probability: Continous,
    ) -> Transition {
        let next = grid.step_from(cell, direction);
        let next_state = grid
            .state_index(next)
            .expect("moves never land on a wall");
        match grid.terminal_reward(next) {
            Some(reward) => Transition {
                next_state,
                probability,
                reward,
                done: true,
            },
            None => Transition {
                next_state,
                probability,
                reward: config.step_reward,
                done: false,
            },
        }
    }
}

impl Mdp for GridMdp {
    fn n_s(&self) -> usize {
        self.grid.states().len()
    }

    fn n_a(&self) -> usize {
        ACTIONS.len()
    }

    fn transitions(&self) -> Rc<Transitions> {
        Rc::clone(&self.transitions)
    }

    fn gamma(&self) -> Continous {
        self.config.gamma
    }

    fn terminal(&self, s: Discrete) -> bool {
        self.grid.is_terminal(self.grid.cell(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::GridConfig;
    use float_eq::assert_float_eq;
    use itertools::Itertools;
    use rstest::rstest;

    fn grid_3x3() -> Rc<GridWorld> {
        Rc::new(
            GridWorld::new(GridConfig {
                rows: 3,
                cols: 3,
                walls: vec![(1, 1)],
                terminals: vec![((0, 2), 1.0)],
            })
            .unwrap(),
        )
    }

    fn config(slip: Continous) -> SolverConfig {
        SolverConfig {
            slip,
            ..SolverConfig::default()
        }
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.2)]
    #[case(1.0)]
    fn probabilities_sum_to_one(#[case] slip: Continous) {
        let mdp = GridMdp::new(grid_3x3(), config(slip)).unwrap();
        let transitions = mdp.transitions();

        for (s, a) in (0..mdp.n_s() as Discrete).cartesian_product(0..mdp.n_a() as Discrete) {
            let total: Continous = transitions[&(s, a)].iter().map(|t| t.probability).sum();
            assert_float_eq!(total, 1.0, abs <= 1e-9);
        }
    }

    #[test]
    fn terminal_states_absorb() {
        let mdp = GridMdp::new(grid_3x3(), config(0.2)).unwrap();
        let transitions = mdp.transitions();
        let s = mdp.grid().state_index((0, 2)).unwrap();

        for a in 0..mdp.n_a() as Discrete {
            assert_eq!(
                transitions[&(s, a)],
                vec![Transition {
                    next_state: s,
                    probability: 1.0,
                    reward: 0.0,
                    done: true,
                }]
            );
        }
    }

    #[test]
    fn intended_outcome_comes_first() {
        let mdp = GridMdp::new(grid_3x3(), config(0.2)).unwrap();
        let transitions = mdp.transitions();
        let grid = mdp.grid();
        let s = grid.state_index((2, 0)).unwrap();

        let row = &transitions[&(s, Action::Right.index())];
        assert_eq!(row.len(), 4);
        assert_eq!(row[0].next_state, grid.state_index((2, 1)).unwrap());
        assert_float_eq!(row[0].probability, 0.8, abs <= 1e-9);
        // slip outcomes follow in Up, Down, Left order
        assert_eq!(row[1].next_state, grid.state_index((1, 0)).unwrap());
        assert_eq!(row[2].next_state, s); // Down bounces off the edge
        assert_eq!(row[3].next_state, s); // Left bounces off the edge
        for t in &row[1..] {
            assert_float_eq!(t.probability, 0.2 / 3.0, abs <= 1e-9);
        }
    }

    #[test]
    fn entering_a_terminal_pays_its_reward() {
        let mdp = GridMdp::new(grid_3x3(), config(0.0)).unwrap();
        let transitions = mdp.transitions();
        let grid = mdp.grid();
        let s = grid.state_index((0, 1)).unwrap();

        let row = &transitions[&(s, Action::Right.index())];
        assert_eq!(row[0].next_state, grid.state_index((0, 2)).unwrap());
        assert_float_eq!(row[0].reward, 1.0, abs <= 1e-9);
        assert!(row[0].done);
        // the zero-probability slip outcomes still carry the step reward
        assert_float_eq!(row[1].reward, -0.04, abs <= 1e-9);
        assert!(!row[1].done);
    }

    #[test]
    fn zero_slip_still_enumerates_four_outcomes() {
        let mdp = GridMdp::new(grid_3x3(), config(0.0)).unwrap();
        let transitions = mdp.transitions();
        let s = mdp.grid().state_index((2, 2)).unwrap();

        let row = &transitions[&(s, Action::Up.index())];
        assert_eq!(row.len(), 4);
        assert_float_eq!(row[0].probability, 1.0, abs <= 1e-9);
        for t in &row[1..] {
            assert_float_eq!(t.probability, 0.0, abs <= 1e-9);
        }
    }

    #[rstest]
    #[case(SolverConfig { gamma: 1.2, ..SolverConfig::default() }, ConfigError::Gamma(1.2))]
    #[case(SolverConfig { gamma: -0.1, ..SolverConfig::default() }, ConfigError::Gamma(-0.1))]
    #[case(SolverConfig { slip: 1.5, ..SolverConfig::default() }, ConfigError::Slip(1.5))]
    #[case(SolverConfig { max_iterations: 0, ..SolverConfig::default() }, ConfigError::MaxIterations)]
    #[case(SolverConfig { theta: 0.0, ..SolverConfig::default() }, ConfigError::Theta(0.0))]
    #[case(SolverConfig { eval_sweeps: 0, ..SolverConfig::default() }, ConfigError::EvalSweeps)]
    fn invalid_configs_are_rejected(#[case] config: SolverConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate().unwrap_err(), expected);
        assert_eq!(GridMdp::new(grid_3x3(), config).unwrap_err(), expected);
    }

    #[test]
    fn nan_gamma_is_rejected() {
        let config = SolverConfig {
            gamma: Continous::NAN,
            ..SolverConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Gamma(_)
        ));
    }

    #[test]
    fn config_parses_from_json_with_defaults() {
        let config = SolverConfig::from_json(
            r#"{
                "gamma": 0.9,
                "slip": 0.1,
                "step_reward": -0.04,
                "max_iterations": 200
            }"#,
        )
        .unwrap();

        assert_float_eq!(config.theta, 1e-4, abs <= 0.0);
        assert_eq!(config.eval_sweeps, 10);
        assert!(config.validate().is_ok());
    }
}
