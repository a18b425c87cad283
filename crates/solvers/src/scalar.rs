use braid_core::{DesignSpace, DriverError, NestedModel};
use ndarray::array;

/// A scalar design variable with finite bounds.
pub(crate) struct BoundedVar {
    pub source: String,
    pub lower: f64,
    pub upper: f64,
}

/// Picks the single design variable that has both bounds.
pub(crate) fn bounded_design_var(space: &DesignSpace) -> Result<BoundedVar, DriverError> {
    let mut bounded = space.design_vars.iter().filter_map(|dv| {
        Some(BoundedVar {
            source: dv.source.clone(),
            lower: dv.options.lower?,
            upper: dv.options.upper?,
        })
    });

    let var = bounded
        .next()
        .ok_or_else(|| DriverError::DesignSpace("no design variable with both bounds".into()))?;
    if bounded.next().is_some() {
        return Err(DriverError::DesignSpace(
            "more than one bounded design variable".into(),
        ));
    }

    #[allow(clippy::float_cmp)]
    if var.lower == var.upper {
        return Err(DriverError::DesignSpace(format!(
            "design variable `{}` has zero-width bounds",
            var.source
        )));
    }
    Ok(var)
}

/// Picks the single equality constraint, returning its name and target.
pub(crate) fn equality_constraint(space: &DesignSpace) -> Result<(String, f64), DriverError> {
    let mut equalities = space
        .constraints
        .iter()
        .filter_map(|con| Some((con.source.clone(), con.options.equals?)));

    let found = equalities
        .next()
        .ok_or_else(|| DriverError::DesignSpace("no equality constraint".into()))?;
    if equalities.next().is_some() {
        return Err(DriverError::DesignSpace(
            "more than one equality constraint".into(),
        ));
    }
    Ok(found)
}

/// Picks the single objective, returning its name and scaler.
pub(crate) fn single_objective(space: &DesignSpace) -> Result<(String, f64), DriverError> {
    match space.objectives.as_slice() {
        [objective] => Ok((objective.source.clone(), objective.options.scaler)),
        [] => Err(DriverError::DesignSpace("no objective".into())),
        _ => Err(DriverError::DesignSpace("more than one objective".into())),
    }
}

/// Sets the design variable to `x`, runs the model, and reads a scalar response.
pub(crate) fn evaluate(
    model: &mut dyn NestedModel,
    var: &str,
    x: f64,
    response: &str,
) -> Result<f64, DriverError> {
    model.set_value(var, array![x].view())?;
    model.run()?;
    let value = model.get_value(response)?;
    match value.as_slice() {
        Some([v]) => Ok(*v),
        _ => Err(DriverError::DesignSpace(format!(
            "response `{response}` is not a scalar"
        ))),
    }
}
