use thiserror::Error;

use crate::nested::{ModelError, NestedModel};

/// Errors raised by a driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid design space: {0}")]
    DesignSpace(String),

    #[error("no sign change between {lower} and {upper}: residuals {lower_residual} and {upper_residual}")]
    NoBracket {
        lower: f64,
        upper: f64,
        lower_residual: f64,
        upper_residual: f64,
    },

    #[error("no convergence after {iters} iterations, best residual {residual}")]
    NotConverged { iters: usize, residual: f64 },

    #[error("non-finite value {value} at x = {x}")]
    NonFinite { x: f64, value: f64 },

    #[error("model evaluation failed")]
    Model(#[from] ModelError),
}

/// How a driver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Converged according to the driver's tolerances.
    Converged,
    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// Summary of a successful driver run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverReport {
    pub status: DriverStatus,
    /// Number of iterations after initialization.
    pub iters: usize,
    /// Final value of the varied design variable.
    pub x: f64,
}

/// Iterates a nested model toward a goal described by its design space.
///
/// A driver must leave the model evaluated at the point it reports, so
/// callers can read outputs directly after [`Driver::run`] returns.
pub trait Driver {
    /// Runs the driver to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the design space is unsuitable, the iteration fails
    /// to converge, or the model fails.
    fn run(&mut self, model: &mut dyn NestedModel) -> Result<DriverReport, DriverError>;
}
