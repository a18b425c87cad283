//! Components shared by the integration tests.

use braid_core::{Component, ComponentError, Interface, Partials, Port, VariableMeta, Vars};
use ndarray::array;
use tracing_subscriber::EnvFilter;

/// Routes tracing output to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn polar_inputs() -> Vec<Port> {
    vec![
        Port::new("r", VariableMeta::scalar().units("m")),
        Port::new("theta", VariableMeta::scalar().units("rad")),
    ]
}

fn polar_point(inputs: &Vars) -> (f64, f64) {
    (inputs["r"][0], inputs["theta"][0])
}

/// x = r·cos(θ)
pub struct PolarX;

impl Component for PolarX {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(
            polar_inputs(),
            vec![Port::new("x", VariableMeta::scalar().units("m"))],
        ))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let (r, theta) = polar_point(inputs);
        Ok(Vars::from([("x".to_owned(), array![r * theta.cos()])]))
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        let (r, theta) = polar_point(inputs);
        let mut partials = Partials::new();
        partials.insert("x", "r", array![[theta.cos()]]);
        partials.insert("x", "theta", array![[-r * theta.sin()]]);
        Ok(partials)
    }
}

/// y = r·sin(θ)
pub struct PolarY;

impl Component for PolarY {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(
            polar_inputs(),
            vec![Port::new("y", VariableMeta::scalar().units("m"))],
        ))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let (r, theta) = polar_point(inputs);
        Ok(Vars::from([("y".to_owned(), array![r * theta.sin()])]))
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        let (r, theta) = polar_point(inputs);
        let mut partials = Partials::new();
        partials.insert("y", "r", array![[theta.sin()]]);
        partials.insert("y", "theta", array![[r * theta.cos()]]);
        Ok(partials)
    }
}

/// Both Cartesian coordinates of a polar point.
pub struct Polar;

impl Component for Polar {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(
            polar_inputs(),
            vec![
                Port::new("x", VariableMeta::scalar().units("m")),
                Port::new("y", VariableMeta::scalar().units("m")),
            ],
        ))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let (r, theta) = polar_point(inputs);
        Ok(Vars::from([
            ("x".to_owned(), array![r * theta.cos()]),
            ("y".to_owned(), array![r * theta.sin()]),
        ]))
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        let mut partials = PolarX.compute_partials(inputs)?;
        for ((of, wrt), block) in PolarY.compute_partials(inputs)?.iter() {
            partials.insert(of, wrt, block.clone());
        }
        Ok(partials)
    }
}

/// z = x² + y
pub struct Combiner;

impl Component for Combiner {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(
            vec![Port::scalar("x"), Port::scalar("y")],
            vec![Port::scalar("z")],
        ))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let (x, y) = (inputs["x"][0], inputs["y"][0]);
        Ok(Vars::from([("z".to_owned(), array![x * x + y])]))
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        let mut partials = Partials::new();
        partials.insert("z", "x", array![[2.0 * inputs["x"][0]]]);
        partials.insert("z", "y", array![[1.0]]);
        Ok(partials)
    }
}

/// residual = x² − a
pub struct SquareResidual;

impl Component for SquareResidual {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(
            vec![Port::scalar("x"), Port::scalar("a")],
            vec![Port::scalar("residual")],
        ))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let (x, a) = (inputs["x"][0], inputs["a"][0]);
        Ok(Vars::from([("residual".to_owned(), array![x * x - a])]))
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        let mut partials = Partials::new();
        partials.insert("residual", "x", array![[2.0 * inputs["x"][0]]]);
        partials.insert("residual", "a", array![[-1.0]]);
        Ok(partials)
    }
}

/// Builds a `Vars` map from scalar entries.
#[must_use]
pub fn scalars(entries: &[(&str, f64)]) -> Vars {
    entries
        .iter()
        .map(|&(name, value)| (name.to_owned(), array![value]))
        .collect()
}
