//! A promotion-based graph of components.
//!
//! Every port of a subsystem has a qualified name, `subsystem.port`. Ports
//! whose names match one of the subsystem's promotion patterns are also
//! exposed under their bare name. An input promoted to the same name as a
//! promoted output is connected to it; every other input is a boundary input
//! that callers set directly.
//!
//! Subsystems run in dependency order. Derivatives are propagated forward
//! through each subsystem's declared partials, so a total derivative is
//! exact whenever the partials are.

use std::{collections::HashMap, fmt};

use glob::Pattern;
use ndarray::{Array1, ArrayView1};
use petgraph::{algo::toposort, graph::DiGraph};
use tracing::{debug, info};

use crate::{
    component::{Component, ComponentError, Partials, Vars},
    design::{
        Constraint, ConstraintOptions, DesignSpace, DesignVar, DesignVarOptions, Objective,
        ObjectiveOptions,
    },
    nested::{ExecOptions, ModelError, NestedModel, StorageMode},
    variable::{Port, VariableInfo, VariableKind},
};

#[cfg(test)]
mod tests;

/// A graph of components wired together by promoted names.
pub struct Group {
    name: String,
    options: ExecOptions,
    subsystems: Vec<Subsystem>,
    design: DesignSpace,
    layout: Option<Layout>,
}

struct Subsystem {
    name: String,
    component: Box<dyn Component>,
    promotes: Vec<Pattern>,
}

/// Storage location of one variable.
struct Slot {
    info: VariableInfo,
    owner: usize,
    port: String,
    size: usize,
    source: Option<usize>,
}

/// Slot indices of one subsystem's ports.
#[derive(Default)]
struct Wiring {
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

/// Everything built by a structural setup.
struct Layout {
    mode: StorageMode,
    slots: Vec<Slot>,
    lookup: HashMap<String, Vec<usize>>,
    wiring: Vec<Wiring>,
    order: Vec<usize>,
    values: Vec<Array1<f64>>,
    tangents: Option<Vec<Array1<f64>>>,
    partials: Option<Vec<Partials>>,
}

impl Group {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: ExecOptions::default(),
            subsystems: Vec::new(),
            design: DesignSpace::default(),
            layout: None,
        }
    }

    /// Returns the group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a subsystem, promoting every port that matches one of `promotes`.
    ///
    /// Use `&["*"]` to promote everything. Adding a subsystem discards the
    /// current setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains a `.`, is already used,
    /// or a promotion pattern is malformed.
    pub fn add_subsystem(
        &mut self,
        name: impl Into<String>,
        component: impl Component + 'static,
        promotes: &[&str],
    ) -> Result<&mut Self, ModelError> {
        let name = name.into();
        if name.is_empty() || name.contains('.') {
            return Err(ModelError::Structure(format!(
                "invalid subsystem name `{name}`"
            )));
        }
        if self.subsystems.iter().any(|sub| sub.name == name) {
            return Err(ModelError::Structure(format!(
                "subsystem `{name}` already exists"
            )));
        }

        let promotes = promotes
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|err| {
                    ModelError::Structure(format!("bad promotion pattern `{pattern}`: {err}"))
                })
            })
            .collect::<Result<_, _>>()?;

        self.subsystems.push(Subsystem {
            name,
            component: Box::new(component),
            promotes,
        });
        self.layout = None;
        Ok(self)
    }

    fn layout(&self) -> Result<&Layout, ModelError> {
        self.layout.as_ref().ok_or(ModelError::NotSetUp)
    }

    fn layout_mut(&mut self) -> Result<&mut Layout, ModelError> {
        self.layout.as_mut().ok_or(ModelError::NotSetUp)
    }

    /// Rejects declarations naming variables the current setup does not have.
    fn check_declared(&self, name: &str) -> Result<(), ModelError> {
        match &self.layout {
            Some(layout) if !layout.lookup.contains_key(name) => {
                Err(ModelError::UnknownVariable(name.to_owned()))
            }
            _ => Ok(()),
        }
    }

    fn report(&self, layout: &Layout) {
        let boundary = layout
            .slots
            .iter()
            .filter(|slot| slot.info.is_boundary())
            .count();
        let order: Vec<&str> = layout
            .order
            .iter()
            .map(|&i| self.subsystems[i].name.as_str())
            .collect();
        info!(
            group = %self.name,
            comm = ?self.options.comm,
            instance = ?self.options.name,
            variables = layout.slots.len(),
            boundary,
            ?order,
            "setup report"
        );
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subsystems: Vec<&str> = self.subsystems.iter().map(|s| s.name.as_str()).collect();
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("subsystems", &subsystems)
            .field("mode", &self.storage_mode())
            .finish_non_exhaustive()
    }
}

impl Subsystem {
    fn promotes(&self, port: &str) -> bool {
        self.promotes.iter().any(|pattern| pattern.matches(port))
    }

    fn slot(&self, owner: usize, port: &Port, kind: VariableKind) -> Slot {
        let qualified = format!("{}.{}", self.name, port.name);
        let promoted = if self.promotes(&port.name) {
            port.name.clone()
        } else {
            qualified.clone()
        };
        Slot {
            info: VariableInfo {
                qualified,
                promoted,
                kind,
                meta: port.meta.clone(),
            },
            owner,
            port: port.name.clone(),
            size: port.meta.size(),
            source: None,
        }
    }

    fn failed(&self, source: ComponentError) -> ModelError {
        ModelError::Component {
            name: self.name.clone(),
            source,
        }
    }
}

impl Layout {
    fn build(subsystems: &mut [Subsystem], mode: StorageMode) -> Result<Self, ModelError> {
        let mut interfaces = Vec::with_capacity(subsystems.len());
        for sub in subsystems.iter_mut() {
            let interface = sub.component.setup().map_err(|err| sub.failed(err))?;
            interfaces.push(interface);
        }

        let mut slots: Vec<Slot> = Vec::new();
        let mut wiring: Vec<Wiring> = Vec::with_capacity(subsystems.len());
        let mut promoted_outputs: HashMap<String, usize> = HashMap::new();

        for (owner, (sub, interface)) in subsystems.iter().zip(&interfaces).enumerate() {
            let mut ports = Wiring::default();
            for port in &interface.outputs {
                let slot = sub.slot(owner, port, VariableKind::Output);
                if let Some(prev) = promoted_outputs.insert(slot.info.promoted.clone(), slots.len())
                {
                    return Err(ModelError::Structure(format!(
                        "outputs `{}` and `{}` are both promoted to `{}`",
                        slots[prev].info.qualified, slot.info.qualified, slot.info.promoted
                    )));
                }
                ports.outputs.push(slots.len());
                slots.push(slot);
            }
            wiring.push(ports);
        }

        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<_> = (0..subsystems.len()).map(|i| graph.add_node(i)).collect();

        for (owner, (sub, interface)) in subsystems.iter().zip(&interfaces).enumerate() {
            for port in &interface.inputs {
                let mut slot = sub.slot(owner, port, VariableKind::BoundaryInput);
                if let Some(&source) = promoted_outputs.get(&slot.info.promoted) {
                    let producer = &slots[source];
                    if producer.size != slot.size {
                        return Err(ModelError::Structure(format!(
                            "`{}` has {} values but its source `{}` has {}",
                            slot.info.qualified, slot.size, producer.info.qualified, producer.size
                        )));
                    }
                    graph.add_edge(nodes[producer.owner], nodes[owner], ());
                    slot.info.kind = VariableKind::ConnectedInput;
                    slot.source = Some(source);
                }
                wiring[owner].inputs.push(slots.len());
                slots.push(slot);
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| {
                ModelError::Structure(format!(
                    "cycle through subsystem `{}`",
                    subsystems[graph[cycle.node_id()]].name
                ))
            })?
            .into_iter()
            .map(|node| graph[node])
            .collect();

        let mut lookup: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, slot) in slots.iter().enumerate() {
            if lookup.contains_key(&slot.info.qualified) {
                return Err(ModelError::Structure(format!(
                    "duplicate variable `{}`",
                    slot.info.qualified
                )));
            }
            lookup
                .entry(slot.info.qualified.clone())
                .or_default()
                .push(index);
            if slot.info.promoted != slot.info.qualified {
                lookup
                    .entry(slot.info.promoted.clone())
                    .or_default()
                    .push(index);
            }
        }

        let values: Vec<Array1<f64>> = slots.iter().map(|slot| Array1::zeros(slot.size)).collect();
        let tangents = (mode == StorageMode::Derivative).then(|| values.clone());

        Ok(Self {
            mode,
            slots,
            lookup,
            wiring,
            order,
            values,
            tangents,
            partials: None,
        })
    }

    fn targets(&self, name: &str) -> Result<&[usize], ModelError> {
        self.lookup
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_owned()))
    }

    /// Resolves a name to the slot whose value represents it.
    ///
    /// A promoted name shared by an output and its connected inputs reads the
    /// output.
    fn readable(&self, name: &str) -> Result<usize, ModelError> {
        let targets = self.targets(name)?;
        Ok(targets
            .iter()
            .copied()
            .find(|&slot| self.slots[slot].info.is_output())
            .unwrap_or(targets[0]))
    }

    /// Resolves a name to the boundary slots it sets, checking the size.
    fn settable(&self, name: &str, len: usize) -> Result<Vec<usize>, ModelError> {
        let targets = self.targets(name)?;
        for &slot in targets {
            let slot = &self.slots[slot];
            if !slot.info.is_boundary() {
                return Err(ModelError::NotSettable(name.to_owned()));
            }
            if slot.size != len {
                return Err(ModelError::ShapeMismatch {
                    name: name.to_owned(),
                    expected: slot.size,
                    actual: len,
                });
            }
        }
        Ok(targets.to_vec())
    }

    /// Copies connected values into a subsystem's inputs and collects them.
    fn pull_inputs(&mut self, owner: usize) -> Vars {
        let mut inputs = Vars::with_capacity(self.wiring[owner].inputs.len());
        for &slot in &self.wiring[owner].inputs {
            if let Some(source) = self.slots[slot].source {
                let value = self.values[source].clone();
                self.values[slot] = value;
            }
            inputs.insert(self.slots[slot].port.clone(), self.values[slot].clone());
        }
        inputs
    }

    fn push_outputs(&mut self, owner: usize, name: &str, outputs: &Vars) -> Result<(), ModelError> {
        for &slot in &self.wiring[owner].outputs {
            let target = &self.slots[slot];
            let value = outputs.get(&target.port).ok_or_else(|| {
                ModelError::Structure(format!(
                    "subsystem `{name}` did not compute `{}`",
                    target.port
                ))
            })?;
            if value.len() != target.size {
                return Err(ModelError::ShapeMismatch {
                    name: target.info.qualified.clone(),
                    expected: target.size,
                    actual: value.len(),
                });
            }
            self.values[slot] = value.clone();
        }
        Ok(())
    }

    /// Propagates the seeded tangents forward through every subsystem.
    fn propagate(&mut self) -> Result<(), ModelError> {
        let partials = self.partials.as_ref().ok_or(ModelError::NotLinearized)?;
        let tangents = self.tangents.as_mut().ok_or(ModelError::NoDerivativeStorage)?;

        for &owner in &self.order {
            let ports = &self.wiring[owner];
            for &slot in &ports.inputs {
                if let Some(source) = self.slots[slot].source {
                    let tangent = tangents[source].clone();
                    tangents[slot] = tangent;
                }
            }
            for &out in &ports.outputs {
                let mut tangent = Array1::zeros(self.slots[out].size);
                for &inp in &ports.inputs {
                    let Some(block) = partials[owner].get(&self.slots[out].port, &self.slots[inp].port)
                    else {
                        continue;
                    };
                    let expected = (self.slots[out].size, self.slots[inp].size);
                    if block.dim() != expected {
                        return Err(ModelError::Structure(format!(
                            "partial of `{}` with respect to `{}` has shape {:?}, expected {expected:?}",
                            self.slots[out].info.qualified,
                            self.slots[inp].info.qualified,
                            block.dim()
                        )));
                    }
                    tangent += &block.dot(&tangents[inp]);
                }
                tangents[out] = tangent;
            }
        }
        Ok(())
    }
}

impl NestedModel for Group {
    fn configure(&mut self, options: &ExecOptions) {
        self.options = options.clone();
    }

    fn setup(&mut self, mode: StorageMode) -> Result<(), ModelError> {
        self.layout = None;
        let layout = Layout::build(&mut self.subsystems, mode)?;
        debug!(group = %self.name, ?mode, variables = layout.slots.len(), "group set up");
        if self.options.reports {
            self.report(&layout);
        }
        self.layout = Some(layout);
        Ok(())
    }

    fn storage_mode(&self) -> Option<StorageMode> {
        self.layout.as_ref().map(|layout| layout.mode)
    }

    fn namespace(&self) -> Result<Vec<VariableInfo>, ModelError> {
        Ok(self
            .layout()?
            .slots
            .iter()
            .map(|slot| slot.info.clone())
            .collect())
    }

    fn set_value(&mut self, name: &str, value: ArrayView1<'_, f64>) -> Result<(), ModelError> {
        let layout = self.layout_mut()?;
        for slot in layout.settable(name, value.len())? {
            layout.values[slot].assign(&value);
        }
        layout.partials = None;
        Ok(())
    }

    fn get_value(&self, name: &str) -> Result<Array1<f64>, ModelError> {
        let layout = self.layout()?;
        Ok(layout.values[layout.readable(name)?].clone())
    }

    fn run(&mut self) -> Result<(), ModelError> {
        let layout = self.layout.as_mut().ok_or(ModelError::NotSetUp)?;
        layout.partials = None;
        for position in 0..layout.order.len() {
            let owner = layout.order[position];
            let inputs = layout.pull_inputs(owner);
            let sub = &mut self.subsystems[owner];
            let outputs = sub.component.compute(&inputs).map_err(|err| sub.failed(err))?;
            layout.push_outputs(owner, &sub.name, &outputs)?;
        }
        Ok(())
    }

    fn linearize(&mut self) -> Result<(), ModelError> {
        let layout = self.layout.as_mut().ok_or(ModelError::NotSetUp)?;
        if layout.tangents.is_none() {
            return Err(ModelError::NoDerivativeStorage);
        }

        let mut partials = vec![Partials::new(); self.subsystems.len()];
        for position in 0..layout.order.len() {
            let owner = layout.order[position];
            let inputs = layout.pull_inputs(owner);
            let sub = &mut self.subsystems[owner];
            partials[owner] = sub
                .component
                .compute_partials(&inputs)
                .map_err(|err| sub.failed(err))?;
        }
        layout.partials = Some(partials);
        Ok(())
    }

    fn jvp(
        &mut self,
        seeds: &[(&str, ArrayView1<'_, f64>)],
        of: &[&str],
    ) -> Result<Vec<Array1<f64>>, ModelError> {
        let layout = self.layout_mut()?;
        let mut seeded = Vec::with_capacity(seeds.len());
        for (name, seed) in seeds {
            seeded.push((layout.settable(name, seed.len())?, seed));
        }

        let tangents = layout
            .tangents
            .as_mut()
            .ok_or(ModelError::NoDerivativeStorage)?;
        for tangent in tangents.iter_mut() {
            tangent.fill(0.0);
        }
        for (targets, seed) in seeded {
            for slot in targets {
                tangents[slot].assign(seed);
            }
        }

        layout.propagate()?;

        let tangents = layout
            .tangents
            .as_ref()
            .ok_or(ModelError::NoDerivativeStorage)?;
        of.iter()
            .map(|name| Ok(tangents[layout.readable(name)?].clone()))
            .collect()
    }

    fn add_design_var(&mut self, name: &str, options: DesignVarOptions) -> Result<(), ModelError> {
        options.validate().map_err(|source| ModelError::Options {
            name: name.to_owned(),
            source,
        })?;
        self.check_declared(name)?;
        self.design.design_vars.push(DesignVar {
            source: name.to_owned(),
            options,
        });
        Ok(())
    }

    fn add_constraint(&mut self, name: &str, options: ConstraintOptions) -> Result<(), ModelError> {
        options.validate().map_err(|source| ModelError::Options {
            name: name.to_owned(),
            source,
        })?;
        self.check_declared(name)?;
        self.design.constraints.push(Constraint {
            source: name.to_owned(),
            options,
        });
        Ok(())
    }

    fn add_objective(&mut self, name: &str, options: ObjectiveOptions) -> Result<(), ModelError> {
        options.validate().map_err(|source| ModelError::Options {
            name: name.to_owned(),
            source,
        })?;
        self.check_declared(name)?;
        self.design.objectives.push(Objective {
            source: name.to_owned(),
            options,
        });
        Ok(())
    }

    fn design_space(&self) -> &DesignSpace {
        &self.design
    }
}
