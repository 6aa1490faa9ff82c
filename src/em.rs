//! Generic EM driver
//!
//! See https://www2.ee.washington.edu/techsite/papers/documents/UWEETR-2010-0002.pdf for
//! a tutorial on EM.
use std::fmt;

pub use crate::error::{EmError, Result};

pub const DEFAULT_MAX_ITER: usize = 100;

/// A model that can be fitted by [Em]
pub trait EmModel {
    type Theta: Clone + fmt::Display;

    /// Expected log likelihood (Q function) at `theta`
    fn evaluate(&self, theta: &Self::Theta) -> Result<f64>;

    /// Parameters maximizing Q given the current parameters `theta`
    fn maximize(&self, theta: &Self::Theta) -> Result<Self::Theta>;

    /// Reject an initial parameter vector outside of the model's domain
    fn check_theta(&self, _theta: &Self::Theta) -> Result<()> {
        Ok(())
    }
}

/// When to stop iterating
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StopRule {
    /// Stop when |Q(t) - Q(t-1)| falls below the threshold given to [Em::run]
    LikelihoodDelta,
    /// Always perform this number of cycles, ignoring the threshold
    FixedIterations(usize),
}

impl Default for StopRule {
    fn default() -> Self {
        Self::LikelihoodDelta
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EmState {
    Init,
    Iterating,
    Terminated,
}

pub struct Em<M: EmModel> {
    model: M,
    theta: M::Theta,
    likelihood: Option<f64>,
    state: EmState,
    stop_rule: StopRule,
    max_iter: usize,
    iterations: usize,
}

/// Change in Q between cycles.  Equal values (including both -inf) give 0
fn likelihood_diff(previous: f64, current: f64) -> f64 {
    if current == previous {
        0.0
    } else {
        if current < previous {
            warn!(
                "Likelihood decreased! previous value: {}, current value: {}",
                previous, current
            );
        }
        current - previous
    }
}

impl<M: EmModel> Em<M> {
    /// Set up EM with an initial guess for theta, which must pass the model's
    /// [EmModel::check_theta]
    pub fn new(model: M, theta: M::Theta) -> Result<Self> {
        model.check_theta(&theta)?;
        Ok(Self {
            model,
            theta,
            likelihood: None,
            state: EmState::Init,
            stop_rule: StopRule::default(),
            max_iter: DEFAULT_MAX_ITER,
            iterations: 0,
        })
    }

    pub fn with_stop_rule(mut self, stop_rule: StopRule) -> Self {
        self.stop_rule = stop_rule;
        self
    }

    /// Iteration cap; always applied whatever the [StopRule]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn theta(&self) -> &M::Theta {
        &self.theta
    }

    pub fn state(&self) -> EmState {
        self.state
    }

    /// Q value from the last cycle of the last run
    pub fn likelihood(&self) -> Option<f64> {
        self.likelihood
    }

    /// Number of cycles performed by the last run
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Run EM from the current parameters and return the final parameters.
    ///
    /// Each cycle evaluates Q at the current parameters, then replaces them by the
    /// M step result.  A numerical failure aborts the run and leaves the parameters
    /// from the last completed cycle in place.
    pub fn run(&mut self, stop: f64) -> Result<M::Theta> {
        let max_cycles = match self.stop_rule {
            StopRule::LikelihoodDelta => self.max_iter,
            StopRule::FixedIterations(n) => n.min(self.max_iter),
        };
        info!(
            "Starting EM: stop rule {:?}, threshold {}, max cycles {}",
            self.stop_rule, stop, max_cycles
        );
        self.state = EmState::Iterating;
        self.iterations = 0;
        let mut previous: Option<f64> = None;
        let mut converged = false;
        while self.iterations < max_cycles {
            let current = self.model.evaluate(&self.theta).map_err(|e| {
                self.state = EmState::Terminated;
                e
            })?;
            debug!(
                "It: {}\tTheta: {}\tlikelihood: {}",
                self.iterations, self.theta, current
            );
            let difference = previous.map(|p| likelihood_diff(p, current));
            self.likelihood = Some(current);
            previous = Some(current);

            self.theta = self.model.maximize(&self.theta).map_err(|e| {
                self.state = EmState::Terminated;
                e
            })?;
            self.iterations += 1;

            if self.stop_rule == StopRule::LikelihoodDelta {
                if let Some(d) = difference {
                    if d.abs() < stop {
                        converged = true;
                        break;
                    }
                }
            }
        }
        self.state = EmState::Terminated;
        if converged || matches!(self.stop_rule, StopRule::FixedIterations(_)) {
            info!(
                "EM finished after {} cycles: {} (likelihood {:?})",
                self.iterations, self.theta, self.likelihood
            );
        } else {
            warn!(
                "EM stopped at iteration cap ({}) without convergence: {}",
                self.iterations, self.theta
            );
        }
        Ok(self.theta.clone())
    }

    pub fn take(self) -> (M::Theta, Option<f64>) {
        (self.theta, self.likelihood)
    }
}
