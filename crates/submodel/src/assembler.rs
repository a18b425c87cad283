use braid_core::{NestedModel, Partials, StorageMode, Vars};
use ndarray::{Array1, Array2, ArrayView1};
use tracing::{debug, error, trace};

use crate::{
    BindingTable, Error, Role, SubsystemRunner, VariableBinding,
    coloring::{ColoringKey, SparsityPattern},
};

/// Assembles total derivatives of bound outputs with respect to bound inputs.
///
/// Without a coloring every requested block is computed densely. With one,
/// each color costs a single directional derivative and only the recorded
/// nonzero entries are filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeAssembler {
    perturbations: usize,
    step: f64,
}

impl Default for DerivativeAssembler {
    fn default() -> Self {
        Self {
            perturbations: 2,
            step: 1e-3,
        }
    }
}

impl DerivativeAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detects the nonzero structure of every bound `(output, input)` block.
    ///
    /// Dense totals are taken at `inputs` and at a few deterministic
    /// perturbations of it, and their nonzeros are unioned. The nested model
    /// is left at the last perturbed point.
    ///
    /// # Errors
    ///
    /// Returns an error if any forward pass or derivative evaluation fails.
    pub fn detect_sparsity<M: NestedModel>(
        &self,
        runner: &mut SubsystemRunner<M>,
        table: &BindingTable,
        inputs: &Vars,
        key: ColoringKey,
    ) -> Result<SparsityPattern, Error> {
        let of = unique_sources(table.outputs());
        let wrt = unique_sources(table.inputs());

        let mut samples = Vec::with_capacity(self.perturbations + 1);
        for sample in 0..=self.perturbations {
            let point = self.perturbed(table, inputs, sample)?;
            runner.run_forward(table, &point, StorageMode::Derivative)?;

            let model = runner.model_mut();
            model.linearize()?;
            let mut blocks = Vec::with_capacity(of.len() * wrt.len());
            for output in &of {
                for input in &wrt {
                    blocks.push(model.total_block(&output.source, &input.source)?);
                }
            }
            samples.push(blocks);
        }

        let of: Vec<_> = of.iter().map(|b| (b.source.as_str(), b.meta.size())).collect();
        let wrt: Vec<_> = wrt.iter().map(|b| (b.source.as_str(), b.meta.size())).collect();
        let pattern = SparsityPattern::from_samples(key, &of, &wrt, &samples);
        debug!(
            colors = pattern.color_count(),
            nonzeros = pattern.nonzero_count(),
            "sparsity detected"
        );
        Ok(pattern)
    }

    /// Computes the total-derivative blocks of `of` with respect to `wrt`,
    /// keyed by local names.
    ///
    /// The model must have just been evaluated at the point of interest in
    /// derivative mode. `coloring` pairs a pattern with the key it must match.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is not bound in the right role, the pattern
    /// is stale, or the nested model fails to linearize.
    pub fn compute<M: NestedModel + ?Sized>(
        &self,
        model: &mut M,
        table: &BindingTable,
        of: &[&str],
        wrt: &[&str],
        coloring: Option<(&SparsityPattern, ColoringKey)>,
    ) -> Result<Partials, Error> {
        let of = bound(table, Role::Output, of)?;
        let wrt = bound(table, Role::Input, wrt)?;

        if let Some((pattern, current)) = coloring {
            if pattern.key() != current {
                error!(built = ?pattern.key(), ?current, "stale sparsity pattern");
                return Err(Error::StaleColoring {
                    built: pattern.key(),
                    current,
                });
            }
        }

        model.linearize()?;
        let blocks = match coloring {
            Some((pattern, _)) => colored(model, pattern, &of, &wrt)?,
            None => dense(model, &of, &wrt)?,
        };

        let mut partials = Partials::new();
        let pairs = of.iter().flat_map(|o| wrt.iter().map(move |w| (o, w)));
        for ((output, input), block) in pairs.zip(blocks) {
            partials.insert(&output.local, &input.local, block);
        }
        Ok(partials)
    }

    /// Shifts every bound input by a sample-dependent amount.
    fn perturbed(&self, table: &BindingTable, inputs: &Vars, sample: usize) -> Result<Vars, Error> {
        let mut point = inputs.clone();
        if sample == 0 {
            return Ok(point);
        }

        #[allow(clippy::cast_precision_loss)]
        let scale = self.step * sample as f64;
        for (position, binding) in table.inputs().enumerate() {
            let value = point
                .get_mut(&binding.local)
                .ok_or_else(|| Error::MissingInput(binding.local.clone()))?;
            for (index, entry) in value.iter_mut().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let skew = 1.0 + 0.37 * ((position + index) % 7) as f64;
                *entry += scale * skew * (1.0 + entry.abs());
            }
        }
        Ok(point)
    }
}

fn bound<'t>(
    table: &'t BindingTable,
    role: Role,
    names: &[&str],
) -> Result<Vec<&'t VariableBinding>, Error> {
    names
        .iter()
        .map(|&name| {
            table.get(role, name).ok_or_else(|| Error::UnknownVariable {
                name: name.to_owned(),
                role,
            })
        })
        .collect()
}

/// One binding per distinct source, in table order.
fn unique_sources<'t>(
    bindings: impl Iterator<Item = &'t VariableBinding>,
) -> Vec<&'t VariableBinding> {
    let mut unique: Vec<&VariableBinding> = Vec::new();
    for binding in bindings {
        if !unique.iter().any(|b| b.source == binding.source) {
            unique.push(binding);
        }
    }
    unique
}

fn dense<M: NestedModel + ?Sized>(
    model: &mut M,
    of: &[&VariableBinding],
    wrt: &[&VariableBinding],
) -> Result<Vec<Array2<f64>>, Error> {
    let mut blocks = Vec::with_capacity(of.len() * wrt.len());
    for output in of {
        for input in wrt {
            blocks.push(model.total_block(&output.source, &input.source)?);
        }
    }
    Ok(blocks)
}

fn colored<M: NestedModel + ?Sized>(
    model: &mut M,
    pattern: &SparsityPattern,
    of: &[&VariableBinding],
    wrt: &[&VariableBinding],
) -> Result<Vec<Array2<f64>>, Error> {
    let mut blocks: Vec<Array2<f64>> = of
        .iter()
        .flat_map(|o| wrt.iter().map(move |w| Array2::zeros((o.meta.size(), w.meta.size()))))
        .collect();

    for color in pattern.colors() {
        // Requested columns only, by source name.
        let columns: Vec<(&str, usize)> = color
            .iter()
            .filter(|column| wrt.iter().any(|w| w.source == column.wrt))
            .map(|column| (column.wrt.as_str(), column.index))
            .collect();
        if columns.is_empty() {
            continue;
        }

        let needed: Vec<usize> = (0..of.len())
            .filter(|&i| {
                columns.iter().any(|&(source, index)| {
                    pattern
                        .nonzeros(&of[i].source, source)
                        .iter()
                        .any(|&(_, col)| col == index)
                })
            })
            .collect();
        if needed.is_empty() {
            continue;
        }

        let mut seeds: Vec<(&str, Array1<f64>)> = Vec::new();
        for &(source, index) in &columns {
            let position = match seeds.iter().position(|(name, _)| *name == source) {
                Some(position) => position,
                None => {
                    let size = wrt
                        .iter()
                        .find(|w| w.source == source)
                        .map_or(0, |w| w.meta.size());
                    seeds.push((source, Array1::zeros(size)));
                    seeds.len() - 1
                }
            };
            seeds[position].1[index] = 1.0;
        }
        let seed_views: Vec<(&str, ArrayView1<'_, f64>)> = seeds
            .iter()
            .map(|(source, seed)| (*source, seed.view()))
            .collect();
        let names: Vec<&str> = needed.iter().map(|&i| of[i].source.as_str()).collect();

        let tangents = model.jvp(&seed_views, &names)?;
        trace!(columns = columns.len(), outputs = names.len(), "colored directional derivative");

        // Several bindings may share a source; each gets the same column.
        for (&i, tangent) in needed.iter().zip(&tangents) {
            for &(source, index) in &columns {
                let entries = pattern.nonzeros(&of[i].source, source);
                for (j, _) in wrt.iter().enumerate().filter(|(_, w)| w.source == source) {
                    let block = &mut blocks[i * wrt.len() + j];
                    for &(row, col) in entries {
                        if col == index {
                            block[[row, col]] = tangent[row];
                        }
                    }
                }
            }
        }
    }
    Ok(blocks)
}
