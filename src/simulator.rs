use crate::mdp::{Mdp, Policy};
use crate::{Continous, Discrete};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use std::rc::Rc;

/// One observed step: the state entered and the reward collected on the
/// way in. The first event of an episode is the start state with no
/// reward.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EpisodeEvent {
    pub s: Discrete,
    pub r: Continous,
}

pub type Episode = Vec<EpisodeEvent>;

pub trait EpisodeGenerator {
    fn generate(&self, n: usize) -> Vec<Episode>;
}

/// Samples episodes by following a fixed policy through the transition
/// table. Reproducible for a given seed; `max_steps` bounds episodes
/// whose policy never reaches a terminal.
pub struct PolicyRollout {
    pub mdp: Rc<dyn Mdp>,
    pub policy: Rc<dyn Policy>,
    pub start: Discrete,
    pub seed: u64,
    pub max_steps: usize,
}

impl EpisodeGenerator for PolicyRollout {
    fn generate(&self, n: usize) -> Vec<Episode> {
        let transitions = self.mdp.transitions();
        let rng = &mut StdRng::seed_from_u64(self.seed);

        let mut eps = vec![];
        for _ in 0..n {
            let mut ep = vec![EpisodeEvent {
                s: self.start,
                r: 0.0,
            }];
            let mut s = self.start;
            for _ in 0..self.max_steps {
                let a = match self.policy.action(s) {
                    Some(a) => a,
                    None => break, // terminal or unmapped
                };
                let ts = &transitions[&(s, a)];
                let dist = WeightedIndex::new(ts.iter().map(|t| t.probability)).unwrap();
                let next = &ts[dist.sample(rng)];
                ep.push(EpisodeEvent {
                    s: next.next_state,
                    r: next.reward,
                });
                if next.done {
                    break;
                }

                s = next.next_state;
            }
            eps.push(ep);
        }

        eps
    }
}
