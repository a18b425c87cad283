//! Bisection on one design variable.
//!
//! The driver looks for exactly one design variable with both bounds and
//! exactly one constraint with an `equals` target, then bisects the residual
//! `constraint - equals` over the design variable's bounds. The model is left
//! evaluated at the reported root.

mod config;

pub use config::{Config, ConfigError};

use braid_core::{Driver, DriverError, DriverReport, DriverStatus, NestedModel, Observer};
use tracing::{debug, trace};

use crate::scalar::{bounded_design_var, equality_constraint, evaluate};

/// Control actions supported by the bisection driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop at the current midpoint.
    StopEarly,
}

/// Iteration event emitted by the bisection driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Iteration counter (1-based within the bisection loop).
    pub iter: usize,
    /// Search bracket before this iteration shrinks it.
    pub bracket: [f64; 2],
    /// Midpoint evaluated in this iteration.
    pub x: f64,
    /// Residual at the midpoint.
    pub residual: f64,
}

/// Drives one equality constraint to its target by bisection.
#[derive(Debug, Clone)]
pub struct BisectionDriver<Obs = ()> {
    config: Config,
    observer: Obs,
}

impl BisectionDriver {
    /// Creates an unobserved driver.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observer: (),
        }
    }
}

impl Default for BisectionDriver {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<Obs> BisectionDriver<Obs> {
    /// Replaces the observer.
    pub fn with_observer<O>(self, observer: O) -> BisectionDriver<O>
    where
        O: Observer<Event, Action>,
    {
        BisectionDriver {
            config: self.config,
            observer,
        }
    }
}

impl<Obs> Driver for BisectionDriver<Obs>
where
    Obs: Observer<Event, Action>,
{
    fn run(&mut self, model: &mut dyn NestedModel) -> Result<DriverReport, DriverError> {
        let var = bounded_design_var(model.design_space())?;
        let (response, target) = equality_constraint(model.design_space())?;
        let config = self.config;

        let (mut left, mut right) = if var.lower < var.upper {
            (var.lower, var.upper)
        } else {
            (var.upper, var.lower)
        };

        let right_residual = residual(model, &var.source, &response, target, right)?;
        if config.residual_converged(right_residual) {
            return Ok(converged(right, 0));
        }
        // Evaluated last so the model is left at `left` if it is already a root.
        let mut left_residual = residual(model, &var.source, &response, target, left)?;
        if config.residual_converged(left_residual) {
            return Ok(converged(left, 0));
        }

        if left_residual.signum() == right_residual.signum() {
            return Err(DriverError::NoBracket {
                lower: left,
                upper: right,
                lower_residual: left_residual,
                upper_residual: right_residual,
            });
        }

        let mut last_residual = left_residual;
        for iter in 1..=config.max_iters() {
            let mid = 0.5 * (left + right);
            let mid_residual = residual(model, &var.source, &response, target, mid)?;
            last_residual = mid_residual;
            trace!(iter, left, right, mid, mid_residual, "bisection step");

            let event = Event {
                iter,
                bracket: [left, right],
                x: mid,
                residual: mid_residual,
            };
            if let Some(Action::StopEarly) = self.observer.observe(&event) {
                return Ok(DriverReport {
                    status: DriverStatus::StoppedByObserver,
                    iters: iter,
                    x: mid,
                });
            }

            if config.x_converged(left, right, mid) || config.residual_converged(mid_residual) {
                debug!(var = %var.source, x = mid, iters = iter, "bisection converged");
                return Ok(converged(mid, iter));
            }

            if mid_residual.signum() == left_residual.signum() {
                left = mid;
                left_residual = mid_residual;
            } else {
                right = mid;
            }
        }

        Err(DriverError::NotConverged {
            iters: config.max_iters(),
            residual: last_residual,
        })
    }
}

fn residual(
    model: &mut dyn NestedModel,
    var: &str,
    response: &str,
    target: f64,
    x: f64,
) -> Result<f64, DriverError> {
    let residual = evaluate(model, var, x, response)? - target;
    if residual.is_finite() {
        Ok(residual)
    } else {
        Err(DriverError::NonFinite { x, value: residual })
    }
}

fn converged(x: f64, iters: usize) -> DriverReport {
    DriverReport {
        status: DriverStatus::Converged,
        iters,
        x,
    }
}
