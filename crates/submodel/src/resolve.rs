//! Name resolution against a namespace snapshot.
//!
//! Inputs resolve only against boundary inputs, since nothing else can be
//! set from outside. Outputs resolve against everything the nested model can
//! answer for on its own: computed outputs and boundary inputs. Connected
//! inputs are left out of both, as they are copies of an output.

use std::collections::HashSet;

use braid_core::{VariableInfo, VariableKind};
use glob::Pattern;
use tracing::{debug, warn};

use crate::{
    BindingTable, Error, Role, VariableBinding, VariableSpec, spec::has_glob_chars,
};


/// Resolves input and output specs into a binding table.
///
/// Inputs are resolved before outputs, each in declaration order, and the
/// table keeps that order.
///
/// # Errors
///
/// Returns the first resolution error in declaration order.
pub fn resolve(
    inputs: &[VariableSpec],
    outputs: &[VariableSpec],
    namespace: &[VariableInfo],
    version: u64,
) -> Result<BindingTable, Error> {
    let mut table = BindingTable::new(version);

    let settable: Vec<&VariableInfo> = namespace.iter().filter(|i| i.is_boundary()).collect();
    let readable: Vec<&VariableInfo> = namespace
        .iter()
        .filter(|i| i.kind != VariableKind::ConnectedInput)
        .collect();

    Resolver {
        role: Role::Input,
        candidates: &settable,
        namespace,
    }
    .resolve_into(inputs, &mut table)?;

    Resolver {
        role: Role::Output,
        candidates: &readable,
        namespace,
    }
    .resolve_into(outputs, &mut table)?;

    debug!(
        version,
        inputs = table.inputs().count(),
        outputs = table.outputs().count(),
        "bindings resolved"
    );
    Ok(table)
}

/// A name to look up and the local name to expose it under.
struct Request {
    name: String,
    local: String,
}

struct Resolver<'a> {
    role: Role,
    candidates: &'a [&'a VariableInfo],
    namespace: &'a [VariableInfo],
}

impl Resolver<'_> {
    fn resolve_into(&self, specs: &[VariableSpec], table: &mut BindingTable) -> Result<(), Error> {
        for spec in specs {
            for request in self.expand(spec)? {
                let binding = self.bind(request)?;
                table.insert(binding)?;
            }
        }
        Ok(())
    }

    /// Turns one spec into lookups; a pattern becomes one per match.
    fn expand(&self, spec: &VariableSpec) -> Result<Vec<Request>, Error> {
        match spec {
            VariableSpec::Literal(name) => Ok(vec![Request {
                name: name.clone(),
                local: name.clone(),
            }]),
            VariableSpec::Alias { source, alias } => {
                if has_glob_chars(source) || has_glob_chars(alias) {
                    return Err(Error::InvalidSpec {
                        spec: format!("({source}, {alias})"),
                        reason: "aliases cannot contain glob characters".into(),
                    });
                }
                Ok(vec![Request {
                    name: source.clone(),
                    local: alias.clone(),
                }])
            }
            VariableSpec::Pattern(glob) => {
                let pattern = Pattern::new(glob).map_err(|err| Error::InvalidSpec {
                    spec: glob.clone(),
                    reason: err.to_string(),
                })?;

                let mut seen = HashSet::new();
                let requests: Vec<Request> = self
                    .candidates
                    .iter()
                    .filter(|info| pattern.matches(&info.promoted))
                    .filter(|info| seen.insert(info.promoted.as_str()))
                    .map(|info| Request {
                        name: info.promoted.clone(),
                        local: info.promoted.clone(),
                    })
                    .collect();
                if requests.is_empty() {
                    warn!(pattern = %glob, role = %self.role, "pattern matched nothing, dropping it");
                }
                Ok(requests)
            }
        }
    }

    fn bind(&self, request: Request) -> Result<VariableBinding, Error> {
        let matches: Vec<&VariableInfo> = self
            .candidates
            .iter()
            .copied()
            .filter(|info| info.answers_to(&request.name))
            .collect();

        match matches.as_slice() {
            [] => Err(self.missing(request.name)),
            [info] => Ok(VariableBinding {
                local: request.local,
                source: info.qualified.clone(),
                role: self.role,
                meta: info.meta.clone(),
            }),
            many => Err(Error::AmbiguousName {
                name: request.name,
                candidates: many.iter().map(|info| info.qualified.clone()).collect(),
            }),
        }
    }

    fn missing(&self, name: String) -> Error {
        let computed = self.role == Role::Input
            && self.namespace.iter().any(|info| info.answers_to(&name));

        if computed {
            Error::InvalidSpec {
                spec: name,
                reason: "computed inside the nested model, only boundary inputs can be bound as inputs"
                    .into(),
            }
        } else {
            Error::UnknownVariable {
                name,
                role: self.role,
            }
        }
    }
}
