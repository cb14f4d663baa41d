use crate::mdp::Mdp;
use crate::{Continous, Discrete, Transitions};

/// Expected discounted return of taking `a` in `s` and valuing successors
/// with `v`. `None` when the pair has no row in the table.
pub fn q_value(
    transitions: &Transitions,
    v: &[Continous],
    gamma: Continous,
    s: Discrete,
    a: Discrete,
) -> Option<Continous> {
    transitions.get(&(s, a)).map(|outcomes| {
        outcomes
            .iter()
            .map(|t| t.probability * (t.reward + gamma * v[t.next_state as usize]))
            .sum()
    })
}

/// Earliest action attaining the maximal q-value under `v`.
pub fn greedy_action(
    transitions: &Transitions,
    v: &[Continous],
    gamma: Continous,
    n_a: usize,
    s: Discrete,
) -> Option<Discrete> {
    let mut best: Option<(Discrete, Continous)> = None;
    for a in 0..n_a as Discrete {
        if let Some(q) = q_value(transitions, v, gamma, s, a) {
            match best {
                Some((_, q_best)) if q <= q_best => {}
                _ => best = Some((a, q)),
            }
        }
    }

    best.map(|(a, _)| a)
}

/// Every non-terminal state starts on the first action; terminals carry
/// no action at all.
pub fn default_policy(mdp: &dyn Mdp) -> Vec<Option<Discrete>> {
    (0..mdp.n_s() as Discrete)
        .map(|s| if mdp.terminal(s) { None } else { Some(0) })
        .collect()
}
