use crate::gridworld::GridWorld;
use crate::mdp::{ConfigError, GridMdp, Mdp, SolverConfig};
use crate::solvers::pi::{Phase, PolicyIteration};
use crate::solvers::vi::ValueIteration;
use crate::solvers::MdpSolver;
use crate::{Action, Cell, Continous, Discrete};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    ValueIteration,
    PolicyIteration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Status {
    Ready,
    Running,
    Converged,
    MaxIterationsReached,
    Stopped,
}

/// Cooperative stop flag. Raised by whoever drives the run loop and
/// consulted only between sweeps, so a sweep is never torn mid-update.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<std::cell::Cell<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    fn clear(&self) {
        self.0.set(false);
    }
}

/// Drives the selected engine one sweep per `step`, owning the iteration
/// counter, the termination policy and the run status. Everything is
/// single-threaded; there is exactly one writer of solver state.
pub struct Stepper {
    grid: Rc<GridWorld>,
    algorithm: Algorithm,
    vi: ValueIteration,
    pi: PolicyIteration,
    max_iterations: usize,
    iterations: usize,
    delta: Continous,
    status: Status,
    cancel: CancelToken,
}

impl Stepper {
    pub fn new(grid: Rc<GridWorld>, config: SolverConfig) -> Result<Self, ConfigError> {
        let mdp: Rc<dyn Mdp> = Rc::new(GridMdp::new(Rc::clone(&grid), config.clone())?);

        Ok(Self {
            grid,
            algorithm: Algorithm::ValueIteration,
            vi: ValueIteration::new(Rc::clone(&mdp), config.theta),
            pi: PolicyIteration::new(mdp, config.eval_sweeps),
            max_iterations: config.max_iterations,
            iterations: 0,
            delta: 0.0,
            status: Status::Ready,
            cancel: CancelToken::default(),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Switch engines. The run state does not survive the switch.
    pub fn select(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
        self.reset();
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Max value change of the most recent sweep.
    pub fn delta(&self) -> Continous {
        self.delta
    }

    /// Policy-iteration phase, `None` while value iteration is selected.
    pub fn phase(&self) -> Option<Phase> {
        match self.algorithm {
            Algorithm::ValueIteration => None,
            Algorithm::PolicyIteration => Some(self.pi.phase()),
        }
    }

    pub fn grid(&self) -> &Rc<GridWorld> {
        &self.grid
    }

    pub fn values(&self) -> &[Continous] {
        match self.algorithm {
            Algorithm::ValueIteration => self.vi.v(),
            Algorithm::PolicyIteration => self.pi.v(),
        }
    }

    pub fn policy(&self) -> &[Option<Discrete>] {
        match self.algorithm {
            Algorithm::ValueIteration => self.vi.policy(),
            Algorithm::PolicyIteration => self.pi.policy(),
        }
    }

    pub fn value_at(&self, cell: Cell) -> Option<Continous> {
        let s = self.grid.state_index(cell)?;
        Some(self.values()[s as usize])
    }

    pub fn action_at(&self, cell: Cell) -> Option<Action> {
        let s = self.grid.state_index(cell)?;
        self.policy()[s as usize].and_then(Action::from_index)
    }

    /// A clone of the stop flag for the driver to keep. Cancelling it is
    /// how a second "run" request toggles an in-progress run off.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Back to the initial tables: zero values, default policies, a fresh
    /// evaluation cycle, counter at zero. Idempotent.
    pub fn reset(&mut self) {
        self.vi.reset();
        self.pi.reset();
        self.iterations = 0;
        self.delta = 0.0;
        self.status = Status::Ready;
        self.cancel.clear();
    }

    /// Reset under a new configuration. Validation happens before any
    /// state is touched, so a rejected configuration leaves the current
    /// run exactly as it was.
    pub fn reconfigure(&mut self, config: SolverConfig) -> Result<(), ConfigError> {
        let mdp: Rc<dyn Mdp> = Rc::new(GridMdp::new(Rc::clone(&self.grid), config.clone())?);
        self.vi = ValueIteration::new(Rc::clone(&mdp), config.theta);
        self.pi = PolicyIteration::new(mdp, config.eval_sweeps);
        self.max_iterations = config.max_iterations;
        self.iterations = 0;
        self.delta = 0.0;
        self.status = Status::Ready;
        self.cancel.clear();

        Ok(())
    }

    /// One sweep of the selected engine. A guarded no-op once the run has
    /// converged or exhausted its iteration cap.
    pub fn step(&mut self) -> Status {
        match self.status {
            Status::Converged | Status::MaxIterationsReached => return self.status,
            _ => {}
        }
        if self.iterations >= self.max_iterations {
            self.status = Status::MaxIterationsReached;
            return self.status;
        }

        let outcome = match self.algorithm {
            Algorithm::ValueIteration => self.vi.sweep(),
            Algorithm::PolicyIteration => self.pi.sweep(),
        };
        self.iterations += 1;
        self.delta = outcome.delta;
        self.status = if outcome.converged {
            Status::Converged
        } else if self.iterations >= self.max_iterations {
            Status::MaxIterationsReached
        } else {
            Status::Running
        };
        trace!("sweep {}: delta {:e}", self.iterations, self.delta);

        self.status
    }

    /// Step until the run leaves `Running`. `observe` is called between
    /// steps; that call is the yield point where intermediate state can be
    /// rendered and where a raised [`CancelToken`] takes effect, always
    /// before the next sweep starts.
    pub fn run<F>(&mut self, mut observe: F) -> Status
    where
        F: FnMut(&Self),
    {
        self.cancel.clear();
        loop {
            self.step();
            observe(self);
            if self.status != Status::Running {
                break;
            }
            if self.cancel.is_cancelled() {
                self.status = Status::Stopped;
                break;
            }
        }
        debug!(
            "run finished: {:?} after {} sweeps (delta {:e})",
            self.status, self.iterations, self.delta
        );

        self.status
    }
}
