use std::fmt;

use braid_core::{Driver, ExecOptions};
use thiserror::Error;

use crate::VariableSpec;

/// Construction options for a [`Submodel`](crate::Submodel).
///
/// Inputs and outputs may also be added later with `add_input` and
/// `add_output`; the execution options are forwarded verbatim to the nested
/// model.
pub struct SubmodelConfig {
    pub(crate) inputs: Vec<VariableSpec>,
    pub(crate) outputs: Vec<VariableSpec>,
    pub(crate) driver: Option<Box<dyn Driver>>,
    pub(crate) exec: ExecOptions,
    pub(crate) coloring: bool,
}

/// Errors that can occur when validating a [`SubmodelConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("instance name must not be empty")]
    EmptyName,

    #[error("communicator label must not be empty")]
    EmptyComm,

    #[error("option keys must not be empty")]
    EmptyOptionKey,
}

impl Default for SubmodelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmodelConfig {
    /// A config with no bindings, no driver, and coloring off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            driver: None,
            exec: ExecOptions::default(),
            coloring: false,
        }
    }

    #[must_use]
    pub fn with_inputs<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<VariableSpec>,
    {
        self.inputs.extend(specs.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_outputs<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<VariableSpec>,
    {
        self.outputs.extend(specs.into_iter().map(Into::into));
        self
    }

    /// Attaches a driver; every forward pass then runs it instead of a single
    /// direct evaluation.
    #[must_use]
    pub fn with_driver(mut self, driver: impl Driver + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    #[must_use]
    pub fn with_comm(mut self, label: impl Into<String>) -> Self {
        self.exec.comm = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.exec.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_reports(mut self, reports: bool) -> Self {
        self.exec.reports = reports;
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.exec.options.insert(key.into(), value.into());
        self
    }

    /// Replaces all execution options at once.
    #[must_use]
    pub fn with_exec_options(mut self, exec: ExecOptions) -> Self {
        self.exec = exec;
        self
    }

    /// Enables sparsity detection and colored derivative assembly.
    ///
    /// Once enabled, design declarations made after the first finalize are
    /// rejected, since they could not take part in the coloring.
    #[must_use]
    pub fn with_coloring(mut self, coloring: bool) -> Self {
        self.coloring = coloring;
        self
    }

    #[must_use]
    pub fn exec_options(&self) -> &ExecOptions {
        &self.exec
    }

    #[must_use]
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Checks the execution options.
    ///
    /// # Errors
    ///
    /// Returns an error if the name, communicator label, or an option key is
    /// present but empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exec.name.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyName);
        }
        if self.exec.comm.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyComm);
        }
        if self.exec.options.keys().any(String::is_empty) {
            return Err(ConfigError::EmptyOptionKey);
        }
        Ok(())
    }
}

impl fmt::Debug for SubmodelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmodelConfig")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("driver", &self.driver.as_ref().map(|_| "..."))
            .field("exec", &self.exec)
            .field("coloring", &self.coloring)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_specs() {
        let config = SubmodelConfig::new()
            .with_inputs(["r", "th*"])
            .with_inputs([("g1.x", "xa")])
            .with_outputs(["x"])
            .with_name("polar");

        assert_eq!(
            config.inputs,
            [
                VariableSpec::literal("r"),
                VariableSpec::pattern("th*"),
                VariableSpec::alias("g1.x", "xa"),
            ]
        );
        assert_eq!(config.exec_options().name.as_deref(), Some("polar"));
        assert!(!config.has_driver());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_labels() {
        assert_eq!(
            SubmodelConfig::new().with_name("").validate(),
            Err(ConfigError::EmptyName)
        );
        assert_eq!(
            SubmodelConfig::new().with_comm("").validate(),
            Err(ConfigError::EmptyComm)
        );
        assert_eq!(
            SubmodelConfig::new().with_option("", "1").validate(),
            Err(ConfigError::EmptyOptionKey)
        );
    }
}
