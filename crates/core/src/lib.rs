//! Core traits and types for the Braid framework.
//!
//! This crate defines the boundary that nested evaluation builds on:
//!
//! - [`VariableMeta`], [`VariableInfo`]: what a model says about its variables
//! - [`Component`]: an explicit computation with declared ports and partials
//! - [`NestedModel`]: a self-contained evaluation context with value and
//!   derivative storage
//! - [`Driver`]: iterates a nested model toward the goal described by its
//!   [`DesignSpace`]
//! - [`Observer`]: receives driver events and optionally returns actions
//! - [`Group`]: a promotion-based graph of components implementing
//!   [`NestedModel`]

mod component;
mod design;
mod driver;
mod group;
mod nested;
mod observer;
mod variable;

pub use component::{Component, ComponentError, Interface, PartialDecl, Partials, Vars};
pub use design::{
    Constraint, ConstraintOptions, DesignSpace, DesignVar, DesignVarOptions, Objective,
    ObjectiveOptions, OptionsError,
};
pub use driver::{Driver, DriverError, DriverReport, DriverStatus};
pub use group::Group;
pub use nested::{ExecOptions, ModelError, NestedModel, StorageMode};
pub use observer::Observer;
pub use variable::{Port, VariableInfo, VariableKind, VariableMeta};
