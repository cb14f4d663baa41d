use super::common::{default_policy, greedy_action, q_value};
use super::{MdpSolver, SweepOutcome};
use crate::mdp::Mdp;
use crate::{Continous, Discrete};
use std::rc::Rc;

/// Where a policy-iteration cycle currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Evaluating { remaining: usize },
    Improving,
}

/// Policy iteration with truncated evaluation: a fixed number of
/// policy-fixed expectation sweeps per cycle, then one greedy improvement
/// sweep. Truncation bounds the cost of a visible step and still converges.
/// Ref: Sutton & Barto 2018, ch. 4.
pub struct PolicyIteration {
    mdp: Rc<dyn Mdp>,
    eval_sweeps: usize,
    v: Vec<Continous>,
    policy: Vec<Option<Discrete>>,
    phase: Phase,
    stable: bool,
}

impl PolicyIteration {
    pub fn new(mdp: Rc<dyn Mdp>, eval_sweeps: usize) -> Self {
        let v = vec![0.0; mdp.n_s()];
        let policy = default_policy(mdp.as_ref());

        Self {
            mdp,
            eval_sweeps,
            v,
            policy,
            phase: Phase::Evaluating {
                remaining: eval_sweeps,
            },
            stable: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once an improvement sweep left every action unchanged.
    pub fn stable(&self) -> bool {
        self.stable
    }

    pub fn v(&self) -> &[Continous] {
        &self.v
    }

    /// The working policy: during evaluation this is the policy being
    /// evaluated, not the one the next improvement will produce.
    pub fn policy(&self) -> &[Option<Discrete>] {
        &self.policy
    }

    fn evaluation_sweep(&mut self) -> Continous {
        let transitions = self.mdp.transitions();
        let gamma = self.mdp.gamma();

        let mut next = vec![0.0; self.v.len()];
        let mut delta: Continous = 0.0;
        for s in 0..self.v.len() as Discrete {
            // no max here: the action comes from the working policy
            let a = match self.policy[s as usize] {
                Some(a) => a,
                None => continue, // terminal, pinned at zero
            };
            let value = match q_value(&transitions, &self.v, gamma, s, a) {
                Some(value) => value,
                None => continue,
            };
            next[s as usize] = value;
            delta = delta.max((value - self.v[s as usize]).abs());
        }
        self.v = next;

        delta
    }

    fn improvement_sweep(&mut self) -> bool {
        let transitions = self.mdp.transitions();
        let gamma = self.mdp.gamma();
        let n_a = self.mdp.n_a();

        let mut stable = true;
        for s in 0..self.v.len() as Discrete {
            if self.mdp.terminal(s) {
                continue;
            }
            let greedy = greedy_action(&transitions, &self.v, gamma, n_a, s);
            if greedy != self.policy[s as usize] {
                stable = false;
            }
            self.policy[s as usize] = greedy;
        }

        stable
    }
}

impl MdpSolver for PolicyIteration {
    fn v_star(&self, s: Discrete) -> Continous {
        self.v[s as usize]
    }

    fn q_star(&self, s: Discrete, a: Discrete) -> Option<Continous> {
        q_value(&self.mdp.transitions(), &self.v, self.mdp.gamma(), s, a)
    }

    fn pi_star(&self, s: Discrete) -> Option<Discrete> {
        self.policy[s as usize]
    }

    fn sweep(&mut self) -> SweepOutcome {
        match self.phase {
            Phase::Evaluating { remaining } => {
                let delta = self.evaluation_sweep();
                self.phase = if remaining > 1 {
                    Phase::Evaluating {
                        remaining: remaining - 1,
                    }
                } else {
                    Phase::Improving
                };

                SweepOutcome {
                    delta,
                    converged: false,
                }
            }
            Phase::Improving => {
                self.stable = self.improvement_sweep();
                self.phase = Phase::Evaluating {
                    remaining: self.eval_sweeps,
                };

                // values did not move during improvement
                SweepOutcome {
                    delta: 0.0,
                    converged: self.stable,
                }
            }
        }
    }

    fn reset(&mut self) {
        self.v = vec![0.0; self.mdp.n_s()];
        self.policy = default_policy(self.mdp.as_ref());
        self.phase = Phase::Evaluating {
            remaining: self.eval_sweeps,
        };
        self.stable = false;
    }
}
