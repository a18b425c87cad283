use braid_core::{DriverError, ModelError};
use thiserror::Error;

use crate::{Role, SpecKind, coloring::ColoringKey, config::ConfigError};

/// Errors raised by a [`Submodel`](crate::Submodel).
///
/// Resolution errors surface from `finalize`, before any numeric work.
/// Runtime errors from the nested model pass through as [`Error::Model`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid variable spec `{spec}`: {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("no {role} named `{name}` in the nested model")]
    UnknownVariable { name: String, role: Role },

    #[error("`{name}` matches {} variables ({}); bind one with an alias", .candidates.len(), .candidates.join(", "))]
    AmbiguousName {
        name: String,
        candidates: Vec<String>,
    },

    #[error("local {role} name `{name}` is bound more than once")]
    DuplicateLocalName { name: String, role: Role },

    #[error("cannot declare {kind} `{name}`: structure is locked once coloring is configured")]
    StructureLocked { kind: SpecKind, name: String },

    #[error("nested solve failed")]
    InnerSolveFailed(#[source] DriverError),

    #[error("sparsity pattern built for {built:?} used at {current:?}")]
    StaleColoring {
        built: ColoringKey,
        current: ColoringKey,
    },

    #[error("submodel must be finalized before {0}")]
    NotFinalized(&'static str),

    #[error("bound variable `{source_name}` (local `{local}`) is missing from the nested model")]
    BindingOutOfSync { local: String, source_name: String },

    #[error("no value supplied for input `{0}`")]
    MissingInput(String),

    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
