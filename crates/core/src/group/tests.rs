use approx::assert_relative_eq;
use ndarray::{Array1, Array2, array};

use crate::{
    ConstraintOptions, DesignVarOptions, Interface, ModelError, NestedModel, Partials, Port,
    StorageMode, VariableKind, VariableMeta, Vars,
    component::{Component, ComponentError},
};

use super::Group;

/// y = k * x, elementwise.
struct Scale {
    input: &'static str,
    output: &'static str,
    k: f64,
    size: usize,
}

impl Scale {
    fn scalar(input: &'static str, output: &'static str, k: f64) -> Self {
        Self {
            input,
            output,
            k,
            size: 1,
        }
    }
}

impl Component for Scale {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        let meta = VariableMeta::with_shape([self.size]);
        Ok(Interface::new(
            vec![Port::new(self.input, meta.clone())],
            vec![Port::new(self.output, meta)],
        ))
    }

    fn compute(&mut self, inputs: &Vars) -> Result<Vars, ComponentError> {
        let x = &inputs[self.input];
        Ok(Vars::from([(self.output.to_owned(), x * self.k)]))
    }

    fn compute_partials(&mut self, _inputs: &Vars) -> Result<Partials, ComponentError> {
        let mut partials = Partials::new();
        partials.insert(
            self.output,
            self.input,
            Array2::eye(self.size) * self.k,
        );
        Ok(partials)
    }
}

/// Always fails.
struct Broken;

impl Component for Broken {
    fn setup(&mut self) -> Result<Interface, ComponentError> {
        Ok(Interface::new(vec![Port::scalar("a")], vec![Port::scalar("b")]))
    }

    fn compute(&mut self, _inputs: &Vars) -> Result<Vars, ComponentError> {
        Err("broken on purpose".into())
    }
}

fn chain() -> Group {
    let mut group = Group::new("chain");
    group
        .add_subsystem("double", Scale::scalar("x", "y", 2.0), &["*"])
        .unwrap()
        .add_subsystem("triple", Scale::scalar("y", "z", 3.0), &["*"])
        .unwrap();
    group
}

#[test]
fn runs_connected_subsystems() {
    let mut group = chain();
    group.setup(StorageMode::Value).unwrap();

    group.set_value("x", array![2.0].view()).unwrap();
    group.run().unwrap();

    assert_relative_eq!(group.get_value("y").unwrap()[0], 4.0);
    assert_relative_eq!(group.get_value("z").unwrap()[0], 12.0);
    assert_relative_eq!(group.get_value("triple.y").unwrap()[0], 4.0);
}

#[test]
fn runs_in_dependency_order() {
    let mut group = Group::new("reversed");
    group
        .add_subsystem("triple", Scale::scalar("y", "z", 3.0), &["*"])
        .unwrap()
        .add_subsystem("double", Scale::scalar("x", "y", 2.0), &["*"])
        .unwrap();
    group.setup(StorageMode::Value).unwrap();

    group.set_value("x", array![1.0].view()).unwrap();
    group.run().unwrap();

    assert_relative_eq!(group.get_value("z").unwrap()[0], 6.0);
}

#[test]
fn namespace_tags_boundary_inputs() {
    let mut group = chain();
    group.setup(StorageMode::Value).unwrap();

    let namespace = group.namespace().unwrap();
    let kind_of = |qualified: &str| {
        namespace
            .iter()
            .find(|info| info.qualified == qualified)
            .map(|info| info.kind)
    };

    assert_eq!(kind_of("double.x"), Some(VariableKind::BoundaryInput));
    assert_eq!(kind_of("double.y"), Some(VariableKind::Output));
    assert_eq!(kind_of("triple.y"), Some(VariableKind::ConnectedInput));
    assert_eq!(kind_of("triple.z"), Some(VariableKind::Output));
    assert_eq!(namespace.len(), 4);
}

#[test]
fn unpromoted_ports_keep_qualified_names() {
    let mut group = Group::new("loose");
    group
        .add_subsystem("double", Scale::scalar("x", "y", 2.0), &[])
        .unwrap()
        .add_subsystem("triple", Scale::scalar("y", "z", 3.0), &["z"])
        .unwrap();
    group.setup(StorageMode::Value).unwrap();

    let namespace = group.namespace().unwrap();
    let triple_y = namespace.iter().find(|i| i.qualified == "triple.y").unwrap();
    assert_eq!(triple_y.promoted, "triple.y");
    assert!(triple_y.is_boundary());

    group.set_value("triple.y", array![5.0].view()).unwrap();
    group.run().unwrap();
    assert_relative_eq!(group.get_value("z").unwrap()[0], 15.0);
}

#[test]
fn rejects_setting_computed_values() {
    let mut group = chain();
    group.setup(StorageMode::Value).unwrap();

    let result = group.set_value("y", array![1.0].view());
    assert!(matches!(result, Err(ModelError::NotSettable(_))));

    let result = group.set_value("x", array![1.0, 2.0].view());
    assert!(matches!(result, Err(ModelError::ShapeMismatch { .. })));

    let result = group.set_value("nope", array![1.0].view());
    assert!(matches!(result, Err(ModelError::UnknownVariable(_))));
}

#[test]
fn rejects_cycles() {
    let mut group = Group::new("loop");
    group
        .add_subsystem("a", Scale::scalar("x", "y", 2.0), &["*"])
        .unwrap()
        .add_subsystem("b", Scale::scalar("y", "x", 2.0), &["*"])
        .unwrap();

    let result = group.setup(StorageMode::Value);
    assert!(matches!(result, Err(ModelError::Structure(_))));
}

#[test]
fn rejects_duplicate_promoted_outputs() {
    let mut group = Group::new("clash");
    group
        .add_subsystem("a", Scale::scalar("u", "y", 2.0), &["*"])
        .unwrap()
        .add_subsystem("b", Scale::scalar("v", "y", 2.0), &["*"])
        .unwrap();

    let result = group.setup(StorageMode::Value);
    assert!(matches!(result, Err(ModelError::Structure(_))));
}

#[test]
fn rejects_duplicate_subsystem_names() {
    let mut group = chain();
    let result = group.add_subsystem("double", Scale::scalar("p", "q", 1.0), &[]);
    assert!(matches!(result, Err(ModelError::Structure(_))));
}

#[test]
fn propagates_component_failures() {
    let mut group = Group::new("fails");
    group.add_subsystem("broken", Broken, &["*"]).unwrap();
    group.setup(StorageMode::Value).unwrap();

    let result = group.run();
    assert!(matches!(result, Err(ModelError::Component { ref name, .. }) if name == "broken"));
}

#[test]
fn chain_rule_through_connections() {
    let mut group = chain();
    group.setup(StorageMode::Derivative).unwrap();
    group.set_value("x", array![1.5].view()).unwrap();
    group.run().unwrap();
    group.linearize().unwrap();

    let block = group.total_block("z", "x").unwrap();
    assert_relative_eq!(block[[0, 0]], 6.0);

    let block = group.total_block("y", "x").unwrap();
    assert_relative_eq!(block[[0, 0]], 2.0);
}

#[test]
fn vector_totals_are_diagonal() {
    let mut group = Group::new("vector");
    group
        .add_subsystem(
            "scale",
            Scale {
                input: "x",
                output: "y",
                k: 4.0,
                size: 3,
            },
            &["*"],
        )
        .unwrap();
    group.setup(StorageMode::Derivative).unwrap();
    group.set_value("x", array![1.0, 2.0, 3.0].view()).unwrap();
    group.run().unwrap();
    group.linearize().unwrap();

    let block = group.total_block("y", "x").unwrap();
    assert_eq!(block, Array2::eye(3) * 4.0);

    let tangents = group
        .jvp(&[("x", Array1::ones(3).view())], &["y"])
        .unwrap();
    assert_eq!(tangents[0], array![4.0, 4.0, 4.0]);
}

#[test]
fn derivatives_need_derivative_storage() {
    let mut group = chain();
    group.setup(StorageMode::Value).unwrap();
    group.run().unwrap();

    assert!(matches!(
        group.linearize(),
        Err(ModelError::NoDerivativeStorage)
    ));
}

#[test]
fn jvp_requires_linearization() {
    let mut group = chain();
    group.setup(StorageMode::Derivative).unwrap();
    group.run().unwrap();

    let result = group.jvp(&[("x", array![1.0].view())], &["z"]);
    assert!(matches!(result, Err(ModelError::NotLinearized)));
}

#[test]
fn setup_discards_values() {
    let mut group = chain();
    group.setup(StorageMode::Value).unwrap();
    group.set_value("x", array![7.0].view()).unwrap();
    group.run().unwrap();

    group.setup(StorageMode::Derivative).unwrap();
    assert_eq!(group.storage_mode(), Some(StorageMode::Derivative));
    assert_relative_eq!(group.get_value("z").unwrap()[0], 0.0);
}

#[test]
fn design_declarations_survive_setup() {
    let mut group = chain();
    group.setup(StorageMode::Value).unwrap();
    group
        .add_design_var("x", DesignVarOptions::bounded(0.0, 1.0).unwrap())
        .unwrap();
    group
        .add_constraint("z", ConstraintOptions::equals(3.0).unwrap())
        .unwrap();

    let result = group.add_design_var("w", DesignVarOptions::default());
    assert!(matches!(result, Err(ModelError::UnknownVariable(_))));

    group.setup(StorageMode::Derivative).unwrap();
    assert_eq!(group.design_space().design_vars.len(), 1);
    assert!(group.design_space().has_responses());
}
