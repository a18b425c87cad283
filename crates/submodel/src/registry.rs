//! Design declarations made against local names.
//!
//! Declarations arrive before the nested model has a binding table, so they
//! are logged first and drained once, in order, at the first structural
//! finalize. After that they are translated and applied immediately, unless
//! the caller has locked the structure.

use std::fmt;

use braid_core::{
    ConstraintOptions, DesignVarOptions, NestedModel, ObjectiveOptions, OptionsError,
};
use tracing::debug;

use crate::{BindingTable, Error, Role};

/// The kind of a design declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecKind {
    DesignVar,
    Constraint,
    Objective,
}

impl SpecKind {
    /// The binding role a declaration of this kind must name.
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            Self::DesignVar => Role::Input,
            Self::Constraint | Self::Objective => Role::Output,
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DesignVar => f.write_str("design variable"),
            Self::Constraint => f.write_str("constraint"),
            Self::Objective => f.write_str("objective"),
        }
    }
}

/// Options of a design declaration, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DesignOptions {
    DesignVar(DesignVarOptions),
    Constraint(ConstraintOptions),
    Objective(ObjectiveOptions),
}

impl DesignOptions {
    #[must_use]
    pub fn kind(&self) -> SpecKind {
        match self {
            Self::DesignVar(_) => SpecKind::DesignVar,
            Self::Constraint(_) => SpecKind::Constraint,
            Self::Objective(_) => SpecKind::Objective,
        }
    }

    fn validate(&self) -> Result<(), OptionsError> {
        match self {
            Self::DesignVar(options) => options.validate(),
            Self::Constraint(options) => options.validate(),
            Self::Objective(options) => options.validate(),
        }
    }
}

/// A design declaration keyed by local name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeferredSpec {
    pub local: String,
    pub options: DesignOptions,
}

impl DeferredSpec {
    pub fn new(local: impl Into<String>, options: DesignOptions) -> Self {
        Self {
            local: local.into(),
            options,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SpecKind {
        self.options.kind()
    }

    /// Looks up the nested variable this declaration targets.
    fn source<'t>(&self, table: &'t BindingTable) -> Result<&'t str, Error> {
        let role = self.kind().role();
        table
            .get(role, &self.local)
            .map(|binding| binding.source.as_str())
            .ok_or_else(|| Error::UnknownVariable {
                name: self.local.clone(),
                role,
            })
    }

    fn apply_to<M>(&self, model: &mut M, source: &str) -> Result<(), Error>
    where
        M: NestedModel + ?Sized,
    {
        match self.options {
            DesignOptions::DesignVar(options) => model.add_design_var(source, options)?,
            DesignOptions::Constraint(options) => model.add_constraint(source, options)?,
            DesignOptions::Objective(options) => model.add_objective(source, options)?,
        }
        debug!(kind = %self.kind(), local = %self.local, source, "design declaration applied");
        Ok(())
    }
}

/// Ordered log of design declarations.
#[derive(Debug, Clone, Default)]
pub struct DesignSpecRegistry {
    pending: Vec<DeferredSpec>,
    applied: Vec<DeferredSpec>,
    drained: bool,
    version: u64,
}

impl DesignSpecRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the log has been drained.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Increases with every accepted declaration.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Declarations waiting for the first finalize.
    #[must_use]
    pub fn pending(&self) -> &[DeferredSpec] {
        &self.pending
    }

    /// Declarations already applied to the nested model, in order.
    #[must_use]
    pub fn applied(&self) -> &[DeferredSpec] {
        &self.applied
    }

    /// Returns `true` if the applied set has a design variable and a response,
    /// which is what a sparsity coloring needs.
    #[must_use]
    pub fn colorable(&self) -> bool {
        let has = |kind| self.applied.iter().any(|spec| spec.kind() == kind);
        has(SpecKind::DesignVar) && (has(SpecKind::Constraint) || has(SpecKind::Objective))
    }

    /// Records a declaration.
    ///
    /// Before the drain it is logged. After the drain it is applied through
    /// `table` right away, or rejected if `locked`. `table` is `None` when the
    /// current bindings are out of date.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, the structure is locked,
    /// the local name is not bound in the right role, or the nested model
    /// rejects the declaration.
    pub fn declare<M>(
        &mut self,
        spec: DeferredSpec,
        live: Option<(&BindingTable, &mut M)>,
        locked: bool,
    ) -> Result<(), Error>
    where
        M: NestedModel + ?Sized,
    {
        spec.options
            .validate()
            .map_err(|err| Error::InvalidSpec {
                spec: spec.local.clone(),
                reason: err.to_string(),
            })?;

        if !self.drained {
            debug!(kind = %spec.kind(), local = %spec.local, "design declaration deferred");
            self.pending.push(spec);
            self.version += 1;
            return Ok(());
        }

        if locked {
            return Err(Error::StructureLocked {
                kind: spec.kind(),
                name: spec.local,
            });
        }

        let (table, model) = live.ok_or(Error::NotFinalized("declaring design variables"))?;
        let source = spec.source(table)?;
        spec.apply_to(model, source)?;
        self.applied.push(spec);
        self.version += 1;
        Ok(())
    }

    /// Applies every logged declaration, in order, exactly once.
    ///
    /// Every local name is translated before anything is applied, so a bad
    /// name leaves both the log and the model untouched. Later calls do
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a local name is not bound in the right role or the
    /// nested model rejects a declaration.
    pub fn drain<M>(&mut self, table: &BindingTable, model: &mut M) -> Result<usize, Error>
    where
        M: NestedModel + ?Sized,
    {
        if self.drained {
            return Ok(0);
        }

        let sources = self
            .pending
            .iter()
            .map(|spec| spec.source(table))
            .collect::<Result<Vec<_>, _>>()?;

        for (spec, source) in self.pending.iter().zip(sources) {
            spec.apply_to(model, source)?;
        }

        let count = self.pending.len();
        self.applied.append(&mut self.pending);
        self.drained = true;
        debug!(count, "design log drained");
        Ok(count)
    }
}
