use braid_core::{
    Component, ComponentError, ConstraintOptions, DesignVarOptions, Group, Interface,
    NestedModel, ObjectiveOptions, PartialDecl, Partials, Port, StorageMode, Vars,
};
use tracing::{debug, instrument};

use crate::{
    BindingTable, DerivativeAssembler, DesignOptions, DesignSpecRegistry, Error, SubmodelConfig,
    SubsystemRunner, VariableBinding, VariableSpec,
    coloring::{ColoringKey, SparsityPattern},
    registry::DeferredSpec,
    resolve::resolve,
};


/// Where a submodel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No binding table yet.
    Unbound,
    /// Bindings exist but the nested model is not finalized for them.
    Bound,
    FinalizedValue,
    FinalizedDerivative,
}

/// A nested model exposed as a single component.
///
/// Callers choose which nested variables become the component's inputs and
/// outputs, and under which local names. The binding is resolved at
/// [`finalize`](Submodel::finalize); until then the nested namespace is
/// never consulted.
pub struct Submodel<M> {
    name: String,
    inputs: Vec<VariableSpec>,
    outputs: Vec<VariableSpec>,
    coloring_enabled: bool,
    runner: SubsystemRunner<M>,
    registry: DesignSpecRegistry,
    assembler: DerivativeAssembler,
    table: Option<BindingTable>,
    dirty: bool,
    table_versions: u64,
    coloring: Option<SparsityPattern>,
}

impl Submodel<Group> {
    /// Wraps a single component, promoting all of its ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn wrap(component: impl Component + 'static, mut config: SubmodelConfig) -> Result<Self, Error> {
        config.validate()?;
        let runner = SubsystemRunner::wrap(component, config.driver.take(), &config.exec)?;
        Ok(Self::with_runner(runner, config))
    }
}

impl<M: NestedModel> Submodel<M> {
    /// Wraps a nested model.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn new(model: M, mut config: SubmodelConfig) -> Result<Self, Error> {
        config.validate()?;
        let runner = SubsystemRunner::new(model, config.driver.take(), &config.exec);
        Ok(Self::with_runner(runner, config))
    }

    fn with_runner(runner: SubsystemRunner<M>, config: SubmodelConfig) -> Self {
        Self {
            name: config.exec.name.unwrap_or_else(|| "submodel".to_owned()),
            inputs: config.inputs,
            outputs: config.outputs,
            coloring_enabled: config.coloring,
            runner,
            registry: DesignSpecRegistry::new(),
            assembler: DerivativeAssembler::new(),
            table: None,
            dirty: false,
            table_versions: 0,
            coloring: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an input spec. Takes effect at the next finalize.
    pub fn add_input(&mut self, spec: impl Into<VariableSpec>) {
        self.inputs.push(spec.into());
        self.dirty = true;
    }

    /// Adds an output spec. Takes effect at the next finalize.
    pub fn add_output(&mut self, spec: impl Into<VariableSpec>) {
        self.outputs.push(spec.into());
        self.dirty = true;
    }

    /// Declares a bound input as a design variable of the nested model.
    ///
    /// # Errors
    ///
    /// See [`DesignSpecRegistry::declare`].
    pub fn add_design_var(&mut self, local: &str, options: DesignVarOptions) -> Result<(), Error> {
        self.declare(DeferredSpec::new(local, DesignOptions::DesignVar(options)))
    }

    /// Declares a bound output as a constraint of the nested model.
    ///
    /// # Errors
    ///
    /// See [`DesignSpecRegistry::declare`].
    pub fn add_constraint(&mut self, local: &str, options: ConstraintOptions) -> Result<(), Error> {
        self.declare(DeferredSpec::new(local, DesignOptions::Constraint(options)))
    }

    /// Declares a bound output as an objective of the nested model.
    ///
    /// # Errors
    ///
    /// See [`DesignSpecRegistry::declare`].
    pub fn add_objective(&mut self, local: &str, options: ObjectiveOptions) -> Result<(), Error> {
        self.declare(DeferredSpec::new(local, DesignOptions::Objective(options)))
    }

    fn declare(&mut self, spec: DeferredSpec) -> Result<(), Error> {
        let table = self.table.as_ref().filter(|_| !self.dirty);
        let live = table.map(|table| (table, self.runner.model_mut()));
        self.registry.declare(spec, live, self.coloring_enabled)
    }

    /// Resolves bindings and prepares the nested model for evaluation.
    ///
    /// Bindings are resolved again only if specs were added since the last
    /// call. The nested model is set up again if the bindings or the storage
    /// mode changed. The deferred design log is drained on the first call.
    ///
    /// The returned interface declares dense partials until a coloring has
    /// been detected by [`compute_totals`](Submodel::compute_totals); later
    /// calls, and [`interface`](Submodel::interface), declare sparse ones.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error, or an error from setting up the
    /// nested model. Nothing is registered when resolution fails.
    #[instrument(skip(self), fields(submodel = %self.name))]
    pub fn finalize(&mut self, want_derivative_storage: bool) -> Result<Interface, Error> {
        let mode = if want_derivative_storage {
            StorageMode::Derivative
        } else {
            StorageMode::Value
        };

        if self.table.is_none() || self.dirty {
            let namespace = self.runner.namespace()?;
            let table = resolve(&self.inputs, &self.outputs, &namespace, self.table_versions + 1)?;
            self.registry.drain(&table, self.runner.model_mut())?;

            self.table_versions = table.version();
            self.table = Some(table);
            self.dirty = false;
            if self.coloring.take().is_some() {
                debug!("bindings changed, coloring discarded");
            }
        }

        let table = self.table.as_ref().ok_or(Error::NotFinalized("finalize"))?;
        self.runner.finalize(table, mode)?;
        Ok(self.interface_for(table))
    }

    /// Evaluates the nested model at `inputs`, keyed by local name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFinalized`] if specs were added since the last
    /// finalize, or any error from the forward pass.
    #[instrument(level = "debug", skip_all, fields(submodel = %self.name))]
    pub fn compute(&mut self, inputs: &Vars) -> Result<Vars, Error> {
        let table = ready(&self.table, self.dirty, "compute")?;
        self.runner.run_forward(table, inputs, StorageMode::Value)
    }

    /// Computes every bound `(output, input)` total-derivative block.
    ///
    /// # Errors
    ///
    /// See [`Submodel::compute_totals`].
    pub fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, Error> {
        self.all_totals(inputs)
    }

    fn all_totals(&mut self, inputs: &Vars) -> Result<Partials, Error> {
        let table = ready(&self.table, self.dirty, "compute_partials")?;
        let of: Vec<String> = table.outputs().map(|b| b.local.clone()).collect();
        let wrt: Vec<String> = table.inputs().map(|b| b.local.clone()).collect();

        let of: Vec<&str> = of.iter().map(String::as_str).collect();
        let wrt: Vec<&str> = wrt.iter().map(String::as_str).collect();
        self.compute_totals(inputs, &of, &wrt)
    }

    /// Computes the total-derivative blocks of `of` with respect to `wrt`.
    ///
    /// With coloring enabled and a design variable plus a response applied,
    /// the first call detects the sparsity pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFinalized`] if specs were added since the last
    /// finalize, [`Error::UnknownVariable`] for a name that is not bound, or
    /// any error from the nested model.
    #[instrument(level = "debug", skip_all, fields(submodel = %self.name))]
    pub fn compute_totals(
        &mut self,
        inputs: &Vars,
        of: &[&str],
        wrt: &[&str],
    ) -> Result<Partials, Error> {
        let table = ready(&self.table, self.dirty, "compute_totals")?;
        let key = ColoringKey {
            bindings: table.version(),
            design: self.registry.version(),
        };

        if self.coloring_enabled && self.coloring.is_none() && self.registry.colorable() {
            let pattern = self
                .assembler
                .detect_sparsity(&mut self.runner, table, inputs, key)?;
            self.coloring = Some(pattern);
        }

        self.runner
            .run_forward(table, inputs, StorageMode::Derivative)?;
        let coloring = self.coloring.as_ref().map(|pattern| (pattern, key));
        self.assembler
            .compute(self.runner.model_mut(), table, of, wrt, coloring)
    }

    #[must_use]
    pub fn state(&self) -> State {
        match (&self.table, self.runner.storage_mode()) {
            (None, _) => State::Unbound,
            (Some(_), _) if self.dirty => State::Bound,
            (Some(_), None) => State::Bound,
            (Some(_), Some(StorageMode::Value)) => State::FinalizedValue,
            (Some(_), Some(StorageMode::Derivative)) => State::FinalizedDerivative,
        }
    }

    /// Returns `true` once a sparsity pattern has been detected for the
    /// current structure.
    #[must_use]
    pub fn is_colored(&self) -> bool {
        self.coloring.is_some()
    }

    #[must_use]
    pub fn coloring(&self) -> Option<&SparsityPattern> {
        self.coloring.as_ref()
    }

    /// The current binding table, if one has been resolved.
    #[must_use]
    pub fn bindings(&self) -> Option<&BindingTable> {
        self.table.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &DesignSpecRegistry {
        &self.registry
    }

    #[must_use]
    pub fn runner(&self) -> &SubsystemRunner<M> {
        &self.runner
    }

    #[must_use]
    pub fn model(&self) -> &M {
        self.runner.model()
    }

    /// The interface declared to the enclosing model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFinalized`] before the first finalize or after
    /// specs were added.
    pub fn interface(&self) -> Result<Interface, Error> {
        Ok(self.interface_for(ready(&self.table, self.dirty, "interface")?))
    }

    fn interface_for(&self, table: &BindingTable) -> Interface {
        let port = |b: &VariableBinding| Port::new(&b.local, b.meta.clone());
        let mut interface = Interface::new(
            table.inputs().map(port).collect(),
            table.outputs().map(port).collect(),
        );

        for output in table.outputs() {
            for input in table.inputs() {
                let decl = match &self.coloring {
                    Some(pattern) => {
                        let entries = pattern.nonzeros(&output.source, &input.source);
                        if entries.is_empty() {
                            continue;
                        }
                        PartialDecl::sparse(&output.local, &input.local, entries.iter().copied())
                    }
                    None => PartialDecl::dense(&output.local, &input.local),
                };
                interface.partials.push(decl);
            }
        }
        interface
    }
}

impl<M: NestedModel> Component for Submodel<M> {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(self.finalize(false)?)
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let table = ready(&self.table, self.dirty, "compute")?;
        Ok(self.runner.run_forward(table, inputs, StorageMode::Value)?)
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        Ok(self.all_totals(inputs)?)
    }
}

/// The binding table, unless specs were added since it was resolved.
fn ready<'a>(
    table: &'a Option<BindingTable>,
    dirty: bool,
    operation: &'static str,
) -> Result<&'a BindingTable, Error> {
    table
        .as_ref()
        .filter(|_| !dirty)
        .ok_or(Error::NotFinalized(operation))
}
