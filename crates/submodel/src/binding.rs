use std::fmt;

use braid_core::VariableMeta;

use crate::Error;

/// Which side of the reduced interface a binding is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Input,
    Output,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// A resolved association between a local name and a nested variable.
///
/// `meta` is what gets declared outward; `source` is what the nested model
/// is addressed by. The two never need to be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub local: String,
    /// Qualified name of the nested variable.
    pub source: String,
    pub role: Role,
    pub meta: VariableMeta,
}

/// Resolved bindings in resolution order.
///
/// The order fixes the layout of argument lists, result lists, and derivative
/// blocks. Every table carries a version; a rebuilt table gets a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    version: u64,
    bindings: Vec<VariableBinding>,
}

impl BindingTable {
    pub(crate) fn new(version: u64) -> Self {
        Self {
            version,
            bindings: Vec::new(),
        }
    }

    /// Appends a binding, rejecting a local name already used in its role.
    pub(crate) fn insert(&mut self, binding: VariableBinding) -> Result<(), Error> {
        if self.get(binding.role, &binding.local).is_some() {
            return Err(Error::DuplicateLocalName {
                name: binding.local,
                role: binding.role,
            });
        }
        self.bindings.push(binding);
        Ok(())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn get(&self, role: Role, local: &str) -> Option<&VariableBinding> {
        self.bindings
            .iter()
            .find(|b| b.role == role && b.local == local)
    }

    #[must_use]
    pub fn input(&self, local: &str) -> Option<&VariableBinding> {
        self.get(Role::Input, local)
    }

    #[must_use]
    pub fn output(&self, local: &str) -> Option<&VariableBinding> {
        self.get(Role::Output, local)
    }

    /// Finds the binding of a nested variable within a role.
    #[must_use]
    pub fn by_source(&self, role: Role, source: &str) -> Option<&VariableBinding> {
        self.bindings
            .iter()
            .find(|b| b.role == role && b.source == source)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &VariableBinding> {
        self.bindings.iter().filter(|b| b.role == Role::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &VariableBinding> {
        self.bindings.iter().filter(|b| b.role == Role::Output)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableBinding> {
        self.bindings.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(local: &str, source: &str, role: Role) -> VariableBinding {
        VariableBinding {
            local: local.into(),
            source: source.into(),
            role,
            meta: VariableMeta::scalar(),
        }
    }

    #[test]
    fn local_names_are_unique_per_role() {
        let mut table = BindingTable::new(1);
        table.insert(binding("x", "a.x", Role::Input)).unwrap();
        table.insert(binding("x", "a.y", Role::Output)).unwrap();

        let result = table.insert(binding("x", "b.x", Role::Input));
        assert!(matches!(
            result,
            Err(Error::DuplicateLocalName { ref name, role: Role::Input }) if name == "x"
        ));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut table = BindingTable::new(1);
        table.insert(binding("b", "m.b", Role::Input)).unwrap();
        table.insert(binding("z", "m.z", Role::Output)).unwrap();
        table.insert(binding("a", "m.a", Role::Input)).unwrap();

        let inputs: Vec<_> = table.inputs().map(|b| b.local.as_str()).collect();
        assert_eq!(inputs, ["b", "a"]);
        assert_eq!(
            table.by_source(Role::Output, "m.z").map(|b| b.local.as_str()),
            Some("z")
        );
    }
}
