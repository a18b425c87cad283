use std::collections::{HashMap, hash_map};

use ndarray::{Array1, Array2};

use crate::variable::Port;

/// Values keyed by variable name, each flattened to one dimension.
pub type Vars = HashMap<String, Array1<f64>>;

/// Error type returned by components.
///
/// Components are stored as trait objects, so their errors are boxed.
pub type ComponentError = Box<dyn std::error::Error + Send + Sync>;

/// A partial-derivative declaration for one `(of, wrt)` pair.
///
/// `rows`/`cols` hold the nonzero coordinates when the pair is known to be
/// sparse; `None` means the block is dense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDecl {
    pub of: String,
    pub wrt: String,
    pub rows: Option<Vec<usize>>,
    pub cols: Option<Vec<usize>>,
}

impl PartialDecl {
    /// Declares a dense block.
    pub fn dense(of: impl Into<String>, wrt: impl Into<String>) -> Self {
        Self {
            of: of.into(),
            wrt: wrt.into(),
            rows: None,
            cols: None,
        }
    }

    /// Declares a sparse block from its nonzero coordinates.
    pub fn sparse(
        of: impl Into<String>,
        wrt: impl Into<String>,
        entries: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let (rows, cols) = entries.into_iter().unzip();
        Self {
            of: of.into(),
            wrt: wrt.into(),
            rows: Some(rows),
            cols: Some(cols),
        }
    }
}

/// What a component exposes to the graph that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    pub partials: Vec<PartialDecl>,
}

impl Interface {
    /// Creates an interface with no declared partials.
    #[must_use]
    pub fn new(inputs: Vec<Port>, outputs: Vec<Port>) -> Self {
        Self {
            inputs,
            outputs,
            partials: Vec::new(),
        }
    }
}

/// Jacobian blocks keyed by `(of, wrt)`.
///
/// A missing block is a structural zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partials {
    blocks: HashMap<(String, String), Array2<f64>>,
}

impl Partials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the block for `(of, wrt)`, replacing any previous one.
    pub fn insert(&mut self, of: impl Into<String>, wrt: impl Into<String>, block: Array2<f64>) {
        self.blocks.insert((of.into(), wrt.into()), block);
    }

    /// Returns the block for `(of, wrt)`, if one was stored.
    #[must_use]
    pub fn get(&self, of: &str, wrt: &str) -> Option<&Array2<f64>> {
        self.blocks.get(&(of.to_owned(), wrt.to_owned()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, (String, String), Array2<f64>> {
        self.blocks.iter()
    }
}

/// An explicit component: outputs are computed directly from inputs.
///
/// The owning graph calls [`Component::setup`] during its own structural
/// setup, then [`Component::compute`] once per evaluation, and
/// [`Component::compute_partials`] whenever it linearizes.
pub trait Component {
    /// Declares the component's ports and partials.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot determine its interface.
    fn setup(&mut self) -> Result<Interface, ComponentError>;

    /// Computes every declared output from the given inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the computation fails.
    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError>;

    /// Computes partial derivatives of outputs with respect to inputs.
    ///
    /// The default declares no partials, so every block is a structural zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the derivatives cannot be computed.
    fn compute_partials(&mut self, _inputs: &Vars) -> Result<Partials, ComponentError> {
        Ok(Partials::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn missing_block_is_none() {
        let mut partials = Partials::new();
        partials.insert("y", "x", array![[2.0]]);

        assert_eq!(partials.get("y", "x"), Some(&array![[2.0]]));
        assert!(partials.get("x", "y").is_none());
        assert_eq!(partials.len(), 1);
    }

    #[test]
    fn sparse_declaration_splits_coordinates() {
        let decl = PartialDecl::sparse("y", "x", [(0, 0), (1, 1), (2, 2)]);

        assert_eq!(decl.rows, Some(vec![0, 1, 2]));
        assert_eq!(decl.cols, Some(vec![0, 1, 2]));
    }
}
