use thiserror::Error;

/// Errors produced when validating design declaration options.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum OptionsError {
    #[error("bounds must be finite")]
    NonFiniteBound,

    #[error("lower bound {lower} exceeds upper bound {upper}")]
    InvertedBounds { lower: f64, upper: f64 },

    #[error("an equality target cannot be combined with bounds")]
    EqualsWithBounds,

    #[error("scaler must be finite and nonzero")]
    Scaler,
}

/// Options for a design variable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DesignVarOptions {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub scaler: f64,
}

impl Default for DesignVarOptions {
    fn default() -> Self {
        Self {
            lower: None,
            upper: None,
            scaler: 1.0,
        }
    }
}

impl DesignVarOptions {
    /// Creates validated design variable options.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is non-finite, the bounds are inverted,
    /// or the scaler is zero or non-finite.
    pub fn new(lower: Option<f64>, upper: Option<f64>, scaler: f64) -> Result<Self, OptionsError> {
        let options = Self {
            lower,
            upper,
            scaler,
        };
        options.validate()?;
        Ok(options)
    }

    /// Shorthand for a bounded, unscaled design variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are non-finite or inverted.
    pub fn bounded(lower: f64, upper: f64) -> Result<Self, OptionsError> {
        Self::new(Some(lower), Some(upper), 1.0)
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// See [`DesignVarOptions::new`].
    pub fn validate(&self) -> Result<(), OptionsError> {
        check_bounds(self.lower, self.upper)?;
        check_scaler(self.scaler)
    }
}

/// Options for a constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintOptions {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub equals: Option<f64>,
}

impl ConstraintOptions {
    /// An equality constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is non-finite.
    pub fn equals(target: f64) -> Result<Self, OptionsError> {
        let options = Self {
            equals: Some(target),
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    /// An inequality constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is non-finite or the bounds are inverted.
    pub fn between(lower: Option<f64>, upper: Option<f64>) -> Result<Self, OptionsError> {
        let options = Self {
            lower,
            upper,
            equals: None,
        };
        options.validate()?;
        Ok(options)
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is non-finite, the bounds are inverted, or
    /// an equality target is combined with bounds.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if let Some(target) = self.equals {
            if self.lower.is_some() || self.upper.is_some() {
                return Err(OptionsError::EqualsWithBounds);
            }
            if !target.is_finite() {
                return Err(OptionsError::NonFiniteBound);
            }
        }
        check_bounds(self.lower, self.upper)
    }
}

/// Options for an objective.
///
/// A negative scaler turns minimization into maximization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectiveOptions {
    pub scaler: f64,
}

impl Default for ObjectiveOptions {
    fn default() -> Self {
        Self { scaler: 1.0 }
    }
}

impl ObjectiveOptions {
    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns an error if the scaler is zero or non-finite.
    pub fn validate(&self) -> Result<(), OptionsError> {
        check_scaler(self.scaler)
    }
}

fn check_bounds(lower: Option<f64>, upper: Option<f64>) -> Result<(), OptionsError> {
    if lower.is_some_and(|v| !v.is_finite()) || upper.is_some_and(|v| !v.is_finite()) {
        return Err(OptionsError::NonFiniteBound);
    }
    if let (Some(lower), Some(upper)) = (lower, upper) {
        if lower > upper {
            return Err(OptionsError::InvertedBounds { lower, upper });
        }
    }
    Ok(())
}

fn check_scaler(scaler: f64) -> Result<(), OptionsError> {
    if !scaler.is_finite() || scaler == 0.0 {
        return Err(OptionsError::Scaler);
    }
    Ok(())
}

/// A design variable declared on a model, keyed by the model's own name.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignVar {
    pub source: String,
    pub options: DesignVarOptions,
}

/// A constraint declared on a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub source: String,
    pub options: ConstraintOptions,
}

/// An objective declared on a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub source: String,
    pub options: ObjectiveOptions,
}

/// Everything a driver needs to know about what it may vary and what it
/// should watch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignSpace {
    pub design_vars: Vec<DesignVar>,
    pub constraints: Vec<Constraint>,
    pub objectives: Vec<Objective>,
}

impl DesignSpace {
    /// Returns `true` if at least one constraint or objective is declared.
    #[must_use]
    pub fn has_responses(&self) -> bool {
        !self.constraints.is_empty() || !self.objectives.is_empty()
    }
}
