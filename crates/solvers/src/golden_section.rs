//! Golden section search on one design variable.
//!
//! The driver looks for exactly one design variable with both bounds and
//! exactly one objective. It minimizes `scaler * objective`, so a negative
//! scaler maximizes. Two interior points positioned by the golden ratio are
//! compared each iteration and the bracket shrinks toward the better one.
//!
//! The objective is assumed unimodal on the bounds; otherwise a local optimum
//! may be reported. The model is left evaluated at the reported point.

use braid_core::{Driver, DriverError, DriverReport, DriverStatus, NestedModel, Observer};
use thiserror::Error;
use tracing::{debug, trace};

use crate::scalar::{bounded_design_var, evaluate, single_objective};

/// Inverse of the golden ratio, `(√5 - 1) / 2`.
const INV_PHI: f64 = 0.618_033_988_749_894_8;

/// Configuration for the golden section driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    x_abs_tol: f64,
    x_rel_tol: f64,
}

/// Errors that can occur when validating a golden section driver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("x_abs_tol must be finite and non-negative")]
    XAbs,

    #[error("x_rel_tol must be finite and non-negative")]
    XRel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 200,
            x_abs_tol: 1e-10,
            x_rel_tol: 1e-10,
        }
    }
}

impl Config {
    /// Creates a new config with validated tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if any tolerance is negative or non-finite.
    pub fn new(max_iters: usize, x_abs_tol: f64, x_rel_tol: f64) -> Result<Self, ConfigError> {
        if !x_abs_tol.is_finite() || x_abs_tol < 0.0 {
            return Err(ConfigError::XAbs);
        }
        if !x_rel_tol.is_finite() || x_rel_tol < 0.0 {
            return Err(ConfigError::XRel);
        }

        Ok(Self {
            max_iters,
            x_abs_tol,
            x_rel_tol,
        })
    }

    /// Returns the maximum number of shrink iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    fn converged(&self, left: f64, right: f64) -> bool {
        let mid = 0.5 * (left + right);
        right - left <= self.x_abs_tol + self.x_rel_tol * mid.abs()
    }
}

/// Control actions supported by the golden section driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop and report the current best point.
    StopEarly,
}

/// Iteration event emitted by the golden section driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Iteration counter (1-based).
    pub iter: usize,
    /// Bracket after this iteration's shrink.
    pub bracket: [f64; 2],
    /// Current best point.
    pub x: f64,
    /// Scaled objective at the best point.
    pub objective: f64,
}

/// Minimizes (or, with a negative scaler, maximizes) one objective.
#[derive(Debug, Clone)]
pub struct GoldenSectionDriver<Obs = ()> {
    config: Config,
    observer: Obs,
}

impl GoldenSectionDriver {
    /// Creates an unobserved driver.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observer: (),
        }
    }
}

impl Default for GoldenSectionDriver {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<Obs> GoldenSectionDriver<Obs> {
    /// Replaces the observer.
    pub fn with_observer<O>(self, observer: O) -> GoldenSectionDriver<O>
    where
        O: Observer<Event, Action>,
    {
        GoldenSectionDriver {
            config: self.config,
            observer,
        }
    }
}

/// One evaluated interior point.
#[derive(Debug, Clone, Copy)]
struct Point {
    x: f64,
    f: f64,
}

impl<Obs> Driver for GoldenSectionDriver<Obs>
where
    Obs: Observer<Event, Action>,
{
    fn run(&mut self, model: &mut dyn NestedModel) -> Result<DriverReport, DriverError> {
        let var = bounded_design_var(model.design_space())?;
        let (objective, scaler) = single_objective(model.design_space())?;
        let config = self.config;

        let probe = Probe {
            var: &var.source,
            objective: &objective,
            scaler,
        };

        let (mut left, mut right) = (var.lower.min(var.upper), var.lower.max(var.upper));
        let mut inner_left = probe.at(model, right - INV_PHI * (right - left))?;
        let mut inner_right = probe.at(model, left + INV_PHI * (right - left))?;

        let mut status = None;
        let mut iters = 0;
        for iter in 1..=config.max_iters() {
            if config.converged(left, right) {
                status = Some(DriverStatus::Converged);
                break;
            }
            iters = iter;

            if inner_left.f < inner_right.f {
                right = inner_right.x;
                inner_right = inner_left;
                inner_left = probe.at(model, right - INV_PHI * (right - left))?;
            } else {
                left = inner_left.x;
                inner_left = inner_right;
                inner_right = probe.at(model, left + INV_PHI * (right - left))?;
            }

            let best = best_of(inner_left, inner_right);
            trace!(iter, left, right, x = best.x, f = best.f, "golden section step");

            let event = Event {
                iter,
                bracket: [left, right],
                x: best.x,
                objective: best.f,
            };
            if let Some(Action::StopEarly) = self.observer.observe(&event) {
                status = Some(DriverStatus::StoppedByObserver);
                break;
            }
        }
        if status.is_none() && config.converged(left, right) {
            status = Some(DriverStatus::Converged);
        }

        let Some(status) = status else {
            return Err(DriverError::NotConverged {
                iters,
                residual: right - left,
            });
        };

        // Leave the model at the reported point.
        let best = best_of(inner_left, inner_right);
        probe.at(model, best.x)?;
        debug!(var = %var.source, x = best.x, iters, ?status, "golden section finished");

        Ok(DriverReport {
            status,
            iters,
            x: best.x,
        })
    }
}

/// Evaluates the scaled objective at a design point.
struct Probe<'a> {
    var: &'a str,
    objective: &'a str,
    scaler: f64,
}

impl Probe<'_> {
    fn at(&self, model: &mut dyn NestedModel, x: f64) -> Result<Point, DriverError> {
        let f = self.scaler * evaluate(model, self.var, x, self.objective)?;
        if f.is_finite() {
            Ok(Point { x, f })
        } else {
            Err(DriverError::NonFinite { x, value: f })
        }
    }
}

fn best_of(a: Point, b: Point) -> Point {
    if a.f <= b.f { a } else { b }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use braid_core::{DesignVarOptions, Group, ObjectiveOptions, StorageMode};

    use crate::test_models::Parabola;

    fn optimization_model(parabola: Parabola, scaler: f64) -> Group {
        let mut group = Group::new("opt");
        group.add_subsystem("curve", parabola, &["*"]).unwrap();
        group.setup(StorageMode::Value).unwrap();
        group
            .add_design_var("x", DesignVarOptions::bounded(-5.0, 5.0).unwrap())
            .unwrap();
        group
            .add_objective("f", ObjectiveOptions { scaler })
            .unwrap();
        group
    }

    #[test]
    fn minimizes_parabola() {
        let mut model = optimization_model(Parabola::opening_up(1.5), 1.0);

        let report = GoldenSectionDriver::new(Config::default())
            .run(&mut model)
            .expect("should converge");

        assert_eq!(report.status, DriverStatus::Converged);
        assert_relative_eq!(report.x, 1.5, epsilon = 1e-8);
        assert_relative_eq!(model.get_value("x").unwrap()[0], report.x);
        assert_relative_eq!(model.get_value("f").unwrap()[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn negative_scaler_maximizes() {
        let mut model = optimization_model(Parabola::opening_down(-2.0), -1.0);

        let report = GoldenSectionDriver::new(Config::default())
            .run(&mut model)
            .expect("should converge");

        assert_relative_eq!(report.x, -2.0, epsilon = 1e-8);
        assert_relative_eq!(model.get_value("f").unwrap()[0], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn errors_when_iterations_run_out() {
        let mut model = optimization_model(Parabola::opening_up(0.3), 1.0);
        let config = Config::new(4, 0.0, 0.0).unwrap();

        let result = GoldenSectionDriver::new(config).run(&mut model);
        assert!(matches!(
            result,
            Err(DriverError::NotConverged { iters: 4, .. })
        ));
    }

    #[test]
    fn observer_can_stop_early() {
        let mut model = optimization_model(Parabola::opening_up(0.0), 1.0);

        let report = GoldenSectionDriver::new(Config::default())
            .with_observer(|event: &Event| (event.iter == 2).then_some(Action::StopEarly))
            .run(&mut model)
            .unwrap();

        assert_eq!(report.status, DriverStatus::StoppedByObserver);
        assert_eq!(report.iters, 2);
        assert_relative_eq!(model.get_value("x").unwrap()[0], report.x);
    }

    #[test]
    fn rejects_invalid_config() {
        assert_eq!(Config::new(10, -1.0, 0.0), Err(ConfigError::XAbs));
        assert_eq!(Config::new(10, 0.0, f64::INFINITY), Err(ConfigError::XRel));
    }
}
