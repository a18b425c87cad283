use std::f64::consts::PI;

use approx::assert_relative_eq;
use braid_core::{DesignVarOptions, Group, ObjectiveOptions};
use braid_submodel::{Error, State, Submodel, SubmodelConfig};
use integration_tests::{Polar, PolarX, PolarY, init_tracing, scalars};

fn polar_config() -> SubmodelConfig {
    SubmodelConfig::new()
        .with_inputs(["r", "theta"])
        .with_outputs(["x"])
}

#[test]
fn evaluates_bound_outputs() {
    init_tracing();
    let mut submodel = Submodel::wrap(PolarX, polar_config()).unwrap();
    submodel.finalize(false).unwrap();

    let outputs = submodel
        .compute(&scalars(&[("r", 1.0), ("theta", PI)]))
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert_relative_eq!(outputs["x"][0], -1.0, epsilon = 1e-10);
}

#[test]
fn total_derivatives_at_theta_pi() {
    init_tracing();
    let mut submodel = Submodel::wrap(PolarX, polar_config()).unwrap();
    submodel.finalize(true).unwrap();

    let partials = submodel
        .compute_partials(&scalars(&[("r", 1.0), ("theta", PI)]))
        .unwrap();

    assert_relative_eq!(partials.get("x", "r").unwrap()[[0, 0]], -1.0, epsilon = 1e-10);
    assert_relative_eq!(
        partials.get("x", "theta").unwrap()[[0, 0]],
        -1.2246e-16,
        epsilon = 1e-19
    );
}

#[test]
fn colored_and_dense_paths_agree() {
    init_tracing();
    let point = scalars(&[("r", 1.3), ("theta", 0.4)]);

    let mut results = Vec::new();
    for coloring in [false, true] {
        let config = SubmodelConfig::new()
            .with_inputs(["r", "theta"])
            .with_outputs(["x", "y"])
            .with_coloring(coloring);
        let mut submodel = Submodel::wrap(Polar, config).unwrap();
        submodel
            .add_design_var("theta", DesignVarOptions::default())
            .unwrap();
        submodel
            .add_objective("y", ObjectiveOptions::default())
            .unwrap();
        submodel.finalize(true).unwrap();

        results.push(submodel.compute_partials(&point).unwrap());
        assert_eq!(submodel.is_colored(), coloring);
    }

    let (dense, colored) = (&results[0], &results[1]);
    assert_eq!(dense.len(), 4);
    for ((of, wrt), block) in dense.iter() {
        let other = colored.get(of, wrt).unwrap();
        assert_relative_eq!(block[[0, 0]], other[[0, 0]], epsilon = 1e-10);
    }
    assert_relative_eq!(colored.get("y", "theta").unwrap()[[0, 0]], 1.3 * 0.4_f64.cos());
}

fn twins() -> Group {
    let mut group = Group::new("twins");
    group
        .add_subsystem("px", PolarX, &["*"])
        .unwrap()
        .add_subsystem("py", PolarY, &["*"])
        .unwrap();
    group
}

#[test]
fn shared_promoted_inputs_need_aliases() {
    init_tracing();
    let config = SubmodelConfig::new().with_inputs(["r"]);
    let mut submodel = Submodel::new(twins(), config).unwrap();

    let result = submodel.finalize(false);
    assert!(matches!(
        result,
        Err(Error::AmbiguousName { ref candidates, .. }) if candidates == &["px.r", "py.r"]
    ));

    let config = SubmodelConfig::new()
        .with_inputs([("px.r", "r_x"), ("py.r", "r_y"), ("px.theta", "t_x"), ("py.theta", "t_y")])
        .with_outputs(["x", "y"]);
    let mut submodel = Submodel::new(twins(), config).unwrap();
    submodel.finalize(false).unwrap();

    let outputs = submodel
        .compute(&scalars(&[("r_x", 2.0), ("r_y", 3.0), ("t_x", 0.0), ("t_y", PI / 2.0)]))
        .unwrap();
    assert_relative_eq!(outputs["x"][0], 2.0);
    assert_relative_eq!(outputs["y"][0], 3.0);
}

#[test]
fn mode_switches_set_up_once_each() {
    init_tracing();
    let mut submodel = Submodel::wrap(PolarX, polar_config()).unwrap();
    let point = scalars(&[("r", 2.0), ("theta", 0.0)]);
    submodel.finalize(false).unwrap();

    let mut counts = Vec::new();
    for _ in 0..2 {
        submodel.compute(&point).unwrap();
        counts.push(submodel.runner().setup_count());
        submodel.compute_partials(&point).unwrap();
        counts.push(submodel.runner().setup_count());
    }
    assert_eq!(counts, [1, 2, 3, 4]);
    assert_eq!(submodel.state(), State::FinalizedDerivative);

    // Values pushed before a switch are never read back after it.
    let outputs = submodel.compute(&point).unwrap();
    assert_relative_eq!(outputs["x"][0], 2.0);
}
