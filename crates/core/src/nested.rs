use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1};
use thiserror::Error;

use crate::{
    component::ComponentError,
    design::{ConstraintOptions, DesignSpace, DesignVarOptions, ObjectiveOptions, OptionsError},
    variable::VariableInfo,
};

/// Which storage a model allocates at setup.
///
/// Derivative storage cannot be added to a model in place; switching modes
/// always means setting the model up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageMode {
    /// Values only.
    Value,
    /// Values plus tangent storage for directional derivatives.
    Derivative,
}

/// Execution options forwarded verbatim to a nested model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExecOptions {
    /// Label of the communicator the model runs on.
    pub comm: Option<String>,
    /// Instance name used in diagnostics.
    pub name: Option<String>,
    /// Log a structural report after each setup.
    pub reports: bool,
    /// Free-form options the model may interpret.
    pub options: BTreeMap<String, String>,
}

/// Errors raised by a nested model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no variable named `{0}`")]
    UnknownVariable(String),

    #[error("variable `{0}` is not a boundary input and cannot be set")]
    NotSettable(String),

    #[error("variable `{name}` holds {expected} values, got {actual}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("model has not been set up")]
    NotSetUp,

    #[error("derivative storage is not allocated")]
    NoDerivativeStorage,

    #[error("model has not been linearized at the current point")]
    NotLinearized,

    #[error("invalid model structure: {0}")]
    Structure(String),

    #[error("invalid options for `{name}`")]
    Options {
        name: String,
        #[source]
        source: OptionsError,
    },

    #[error("subsystem `{name}` failed")]
    Component {
        name: String,
        #[source]
        source: ComponentError,
    },
}

/// A self-contained evaluation context that can be embedded in a larger one.
///
/// Names accepted by the value and derivative methods may be either a
/// variable's qualified or promoted name.
pub trait NestedModel {
    /// Applies execution options. Takes effect at the next setup.
    fn configure(&mut self, options: &ExecOptions);

    /// Performs a structural setup, discarding all stored values.
    ///
    /// # Errors
    ///
    /// Returns an error if the model structure is invalid.
    fn setup(&mut self, mode: StorageMode) -> Result<(), ModelError>;

    /// Returns the storage mode of the last successful setup.
    fn storage_mode(&self) -> Option<StorageMode>;

    /// Returns a snapshot of every variable in the model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotSetUp`] before the first setup.
    fn namespace(&self) -> Result<Vec<VariableInfo>, ModelError>;

    /// Sets a boundary input.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown, not settable, or the value has
    /// the wrong size.
    fn set_value(&mut self, name: &str, value: ArrayView1<'_, f64>) -> Result<(), ModelError>;

    /// Reads the current value of a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown.
    fn get_value(&self, name: &str) -> Result<Array1<f64>, ModelError>;

    /// Evaluates the model once at the current inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if any subsystem fails.
    fn run(&mut self) -> Result<(), ModelError>;

    /// Computes partial derivatives at the current point.
    ///
    /// # Errors
    ///
    /// Returns an error if derivative storage is missing or a subsystem fails.
    fn linearize(&mut self) -> Result<(), ModelError>;

    /// Propagates input seeds through the linearized model.
    ///
    /// Returns one tangent per name in `of`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not linearized, a name is unknown, or
    /// a seed has the wrong size.
    fn jvp(
        &mut self,
        seeds: &[(&str, ArrayView1<'_, f64>)],
        of: &[&str],
    ) -> Result<Vec<Array1<f64>>, ModelError>;

    /// Computes the total derivative block of `of` with respect to `wrt`.
    ///
    /// The default seeds one column at a time through [`NestedModel::jvp`].
    ///
    /// # Errors
    ///
    /// See [`NestedModel::jvp`].
    fn total_block(&mut self, of: &str, wrt: &str) -> Result<Array2<f64>, ModelError> {
        let rows = self.get_value(of)?.len();
        let cols = self.get_value(wrt)?.len();

        let mut block = Array2::zeros((rows, cols));
        let mut seed = Array1::zeros(cols);
        for col in 0..cols {
            seed.fill(0.0);
            seed[col] = 1.0;
            let tangents = self.jvp(&[(wrt, seed.view())], &[of])?;
            let column = tangents
                .first()
                .ok_or_else(|| ModelError::UnknownVariable(of.to_owned()))?;
            block.column_mut(col).assign(column);
        }
        Ok(block)
    }

    /// Declares a design variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the options are invalid.
    fn add_design_var(&mut self, name: &str, options: DesignVarOptions) -> Result<(), ModelError>;

    /// Declares a constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the options are invalid.
    fn add_constraint(&mut self, name: &str, options: ConstraintOptions) -> Result<(), ModelError>;

    /// Declares an objective.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the options are invalid.
    fn add_objective(&mut self, name: &str, options: ObjectiveOptions) -> Result<(), ModelError>;

    /// Returns every design declaration made so far.
    fn design_space(&self) -> &DesignSpace;
}
