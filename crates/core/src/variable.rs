/// Metadata carried by a variable through every layer that exposes it.
///
/// Units are kept as an opaque label. Braid never converts between units; it
/// only carries them from the variable's owner to whoever binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableMeta {
    pub units: Option<String>,
    pub shape: Vec<usize>,
    pub description: String,
}

impl Default for VariableMeta {
    fn default() -> Self {
        Self::scalar()
    }
}

impl VariableMeta {
    /// Metadata for a unitless scalar.
    #[must_use]
    pub fn scalar() -> Self {
        Self::with_shape([1])
    }

    /// Metadata for a unitless variable of the given shape.
    #[must_use]
    pub fn with_shape(shape: impl Into<Vec<usize>>) -> Self {
        Self {
            units: None,
            shape: shape.into(),
            description: String::new(),
        }
    }

    /// Sets the units label.
    #[must_use]
    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the number of flattened entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
}

/// A named input or output declared by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub meta: VariableMeta,
}

impl Port {
    /// Creates a port with explicit metadata.
    pub fn new(name: impl Into<String>, meta: VariableMeta) -> Self {
        Self {
            name: name.into(),
            meta,
        }
    }

    /// Creates a unitless scalar port.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, VariableMeta::scalar())
    }
}

/// How a variable participates in the model it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// An input nothing inside the model produces, so callers may set it.
    BoundaryInput,
    /// An input fed by an output of another subsystem.
    ConnectedInput,
    /// A value computed by a subsystem.
    Output,
}

/// One entry of a model's namespace snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    /// Fully qualified path, e.g. `polar.x`.
    pub qualified: String,
    /// The name the variable is exposed under after promotion.
    pub promoted: String,
    pub kind: VariableKind,
    pub meta: VariableMeta,
}

impl VariableInfo {
    /// Returns `true` if callers may set this variable directly.
    #[must_use]
    pub fn is_boundary(&self) -> bool {
        self.kind == VariableKind::BoundaryInput
    }

    /// Returns `true` if the variable is computed inside the model.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.kind == VariableKind::Output
    }

    /// Returns `true` if `name` refers to this variable by either of its names.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.qualified == name || self.promoted == name
    }
}
