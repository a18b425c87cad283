use braid_core::{Component, ComponentError, Interface, Partials, Port, Vars};
use ndarray::array;

/// r = x² - a.
pub struct Quadratic {
    a: f64,
}

impl Quadratic {
    pub fn new(a: f64) -> Self {
        Self { a }
    }
}

impl Component for Quadratic {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(vec![Port::scalar("x")], vec![Port::scalar("r")]))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let x = inputs["x"][0];
        Ok(Vars::from([("r".to_owned(), array![x * x - self.a])]))
    }

    fn compute_partials(&mut self, inputs: &Vars) -> Result<Partials, ComponentError> {
        let mut partials = Partials::new();
        partials.insert("r", "x", array![[2.0 * inputs["x"][0]]]);
        Ok(partials)
    }
}

/// f = sign * ((x - center)² + 1).
pub struct Parabola {
    center: f64,
    sign: f64,
}

impl Parabola {
    pub fn opening_up(center: f64) -> Self {
        Self { center, sign: 1.0 }
    }

    pub fn opening_down(center: f64) -> Self {
        Self { center, sign: -1.0 }
    }
}

impl Component for Parabola {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(vec![Port::scalar("x")], vec![Port::scalar("f")]))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let dx = inputs["x"][0] - self.center;
        Ok(Vars::from([("f".to_owned(), array![self.sign * (dx * dx + 1.0)])]))
    }
}
