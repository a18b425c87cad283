use braid_core::{
    Component, Driver, ExecOptions, Group, ModelError, NestedModel, StorageMode, VariableInfo,
    Vars,
};
use tracing::{debug, error, trace};

use crate::{BindingTable, Error, VariableBinding};

/// Name of the single subsystem a wrapped component is placed under.
pub const WRAPPED_SUBSYSTEM: &str = "model";

/// What the nested model was last finalized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FinalizeKey {
    bindings: u64,
    mode: StorageMode,
}

/// Owns the nested model and drives its setup and forward passes.
///
/// The model is set up again whenever the binding table or the storage mode
/// changes. A forward pass runs the attached driver if there is one, and a
/// single evaluation otherwise.
pub struct SubsystemRunner<M> {
    model: M,
    driver: Option<Box<dyn Driver>>,
    finalized: Option<FinalizeKey>,
    setups: usize,
}

impl SubsystemRunner<Group> {
    /// Places `component` in a fresh group with every port promoted.
    ///
    /// # Errors
    ///
    /// Returns an error if the group rejects the component.
    pub fn wrap(
        component: impl Component + 'static,
        driver: Option<Box<dyn Driver>>,
        options: &ExecOptions,
    ) -> Result<Self, Error> {
        let name = options.name.clone().unwrap_or_else(|| "submodel".to_owned());
        let mut group = Group::new(name);
        group.add_subsystem(WRAPPED_SUBSYSTEM, component, &["*"])?;
        Ok(Self::new(group, driver, options))
    }
}

impl<M: NestedModel> SubsystemRunner<M> {
    /// Takes ownership of `model` and forwards the execution options to it.
    pub fn new(mut model: M, driver: Option<Box<dyn Driver>>, options: &ExecOptions) -> Self {
        model.configure(options);
        Self {
            model,
            driver,
            finalized: None,
            setups: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    #[must_use]
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Number of setups performed on the nested model so far.
    #[must_use]
    pub fn setup_count(&self) -> usize {
        self.setups
    }

    /// The storage mode of the current finalize, if any.
    #[must_use]
    pub fn storage_mode(&self) -> Option<StorageMode> {
        self.finalized.map(|key| key.mode)
    }

    /// Returns the nested namespace, doing a value-mode setup first if the
    /// model has never been set up.
    ///
    /// # Errors
    ///
    /// Returns an error if setup fails.
    pub fn namespace(&mut self) -> Result<Vec<VariableInfo>, Error> {
        if self.model.storage_mode().is_none() {
            self.setup(StorageMode::Value)?;
        }
        Ok(self.model.namespace()?)
    }

    /// Finalizes the nested model for `table` in `mode`.
    ///
    /// Returns `true` if a setup was needed. Calling again with the same
    /// table version and mode does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if setup fails or a bound variable is missing from
    /// the resulting namespace.
    pub fn finalize(&mut self, table: &BindingTable, mode: StorageMode) -> Result<bool, Error> {
        let key = FinalizeKey {
            bindings: table.version(),
            mode,
        };
        if self.finalized == Some(key) {
            return Ok(false);
        }

        // A structural pass in the right mode can be reused once.
        let reuse = self.finalized.is_none() && self.model.storage_mode() == Some(mode);
        self.finalized = None;
        if !reuse {
            self.setup(mode)?;
        }
        self.check_bindings(table)?;
        self.finalized = Some(key);
        Ok(!reuse)
    }

    /// Pushes inputs, evaluates, and pulls outputs, all by local name.
    ///
    /// # Errors
    ///
    /// Returns an error if an input is missing, a bound variable has
    /// disappeared, the driver fails, or the model fails.
    pub fn run_forward(
        &mut self,
        table: &BindingTable,
        inputs: &Vars,
        mode: StorageMode,
    ) -> Result<Vars, Error> {
        self.finalize(table, mode)?;

        for binding in table.inputs() {
            let value = inputs
                .get(&binding.local)
                .ok_or_else(|| Error::MissingInput(binding.local.clone()))?;
            self.model
                .set_value(&binding.source, value.view())
                .map_err(|err| out_of_sync(binding, err))?;
            trace!(local = %binding.local, source = %binding.source, "input pushed");
        }

        match self.driver.as_mut() {
            Some(driver) => {
                let report = driver.run(&mut self.model).map_err(Error::InnerSolveFailed)?;
                trace!(status = ?report.status, iters = report.iters, "nested driver finished");
            }
            None => self.model.run()?,
        }

        let mut outputs = Vars::with_capacity(table.len());
        for binding in table.outputs() {
            let value = self
                .model
                .get_value(&binding.source)
                .map_err(|err| out_of_sync(binding, err))?;
            trace!(local = %binding.local, source = %binding.source, "output pulled");
            outputs.insert(binding.local.clone(), value);
        }
        Ok(outputs)
    }

    fn setup(&mut self, mode: StorageMode) -> Result<(), Error> {
        self.model.setup(mode)?;
        self.setups += 1;
        debug!(?mode, setups = self.setups, "nested model set up");
        Ok(())
    }

    fn check_bindings(&self, table: &BindingTable) -> Result<(), Error> {
        let namespace = self.model.namespace()?;
        for binding in table.iter() {
            if !namespace.iter().any(|info| info.qualified == binding.source) {
                return Err(out_of_sync(
                    binding,
                    ModelError::UnknownVariable(binding.source.clone()),
                ));
            }
        }
        Ok(())
    }
}

/// Maps a lookup failure on a bound name to a consistency error.
fn out_of_sync(binding: &VariableBinding, err: ModelError) -> Error {
    match err {
        ModelError::UnknownVariable(_) => {
            error!(
                local = %binding.local,
                source = %binding.source,
                "binding table is out of sync with the nested model"
            );
            Error::BindingOutOfSync {
                local: binding.local.clone(),
                source_name: binding.source.clone(),
            }
        }
        other => Error::Model(other),
    }
}
