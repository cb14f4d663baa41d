use super::common::{default_policy, greedy_action, q_value};
use super::{MdpSolver, SweepOutcome};
use crate::mdp::Mdp;
use crate::{Continous, Discrete};
use std::rc::Rc;

/// Value iteration: synchronous Bellman-optimality sweeps until the value
/// table stops moving. Ref: Sutton & Barto 2018, ch. 4.
pub struct ValueIteration {
    mdp: Rc<dyn Mdp>,
    theta: Continous,
    v: Vec<Continous>,
    policy: Vec<Option<Discrete>>,
}

impl ValueIteration {
    pub fn new(mdp: Rc<dyn Mdp>, theta: Continous) -> Self {
        let v = vec![0.0; mdp.n_s()];
        let policy = default_policy(mdp.as_ref());

        Self {
            mdp,
            theta,
            v,
            policy,
        }
    }

    pub fn v(&self) -> &[Continous] {
        &self.v
    }

    pub fn policy(&self) -> &[Option<Discrete>] {
        &self.policy
    }
}

impl MdpSolver for ValueIteration {
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
        let transitions = self.mdp.transitions();
        let gamma = self.mdp.gamma();
        let n_a = self.mdp.n_a();

        // Jacobi update: every q-value reads the table from before this
        // sweep, never a value written during it.
        let mut next = vec![0.0; self.v.len()];
        let mut delta: Continous = 0.0;
        for s in 0..self.v.len() as Discrete {
            if self.mdp.terminal(s) {
                continue; // pinned at zero, the reward is paid on entry
            }
            let best = (0..n_a as Discrete)
                .filter_map(|a| q_value(&transitions, &self.v, gamma, s, a))
                .fold(Continous::NEG_INFINITY, Continous::max);
            next[s as usize] = best;
            delta = delta.max((best - self.v[s as usize]).abs());
        }
        self.v = next;

        for s in 0..self.v.len() as Discrete {
            if !self.mdp.terminal(s) {
                self.policy[s as usize] = greedy_action(&transitions, &self.v, gamma, n_a, s);
            }
        }

        SweepOutcome {
            delta,
            converged: delta < self.theta,
        }
    }

    fn reset(&mut self) {
        self.v = vec![0.0; self.mdp.n_s()];
        self.policy = default_policy(self.mdp.as_ref());
    }
}
