//! Embed a nested model as a single black-box component.
//!
//! A [`Submodel`] owns a [`NestedModel`](braid_core::NestedModel) and exposes
//! a chosen subset of its variables, under local names, as the inputs and
//! outputs of one [`Component`](braid_core::Component). Variables are named
//! with [`VariableSpec`]s: a literal name, an alias, or a glob pattern.
//!
//! The pieces:
//!
//! - [`resolve`] turns specs into a [`BindingTable`]
//! - [`SubsystemRunner`] owns the nested model, its setup, and forward passes
//! - [`DesignSpecRegistry`] logs design declarations until they can be applied
//! - [`DerivativeAssembler`] computes total derivatives, densely or through a
//!   [`SparsityPattern`] coloring

mod assembler;
mod binding;
mod coloring;
mod config;
mod error;
mod registry;
mod resolve;
mod runner;
mod spec;
mod submodel;

pub use assembler::DerivativeAssembler;
pub use binding::{BindingTable, Role, VariableBinding};
pub use coloring::{ColoringKey, Column, SparsityPattern};
pub use config::{ConfigError, SubmodelConfig};
pub use error::Error;
pub use registry::{DeferredSpec, DesignOptions, DesignSpecRegistry, SpecKind};
pub use resolve::resolve;
pub use runner::{SubsystemRunner, WRAPPED_SUBSYSTEM};
pub use spec::VariableSpec;
pub use submodel::{State, Submodel};
