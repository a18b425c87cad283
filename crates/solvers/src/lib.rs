//! Iterative drivers for nested Braid models.
//!
//! Each driver reads the model's [`DesignSpace`] to decide what to vary and
//! what to watch, then leaves the model evaluated at the point it reports.
//!
//! - [`bisection`]: drives one equality constraint to its target
//! - [`golden_section`]: minimizes or maximizes one objective
//!
//! [`DesignSpace`]: braid_core::DesignSpace

pub mod bisection;
pub mod golden_section;

mod scalar;

#[cfg(test)]
mod test_models;

pub use bisection::BisectionDriver;
pub use golden_section::GoldenSectionDriver;
