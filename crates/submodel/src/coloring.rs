//! Sparsity patterns and column coloring.
//!
//! A pattern records, per `(of, wrt)` pair of nested source names, which
//! entries of the total-derivative block can be nonzero. Columns whose
//! nonzero rows never overlap share a color and are recovered together from
//! a single directional derivative.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use ndarray::Array2;

/// The structural versions a pattern was detected under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColoringKey {
    /// Version of the binding table.
    pub bindings: u64,
    /// Version of the design declaration set.
    pub design: u64,
}

/// One column of a `wrt` variable's derivative blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column {
    pub wrt: String,
    pub index: usize,
}

/// A block shape described by source name and flattened size.
pub type Extent<'a> = (&'a str, usize);

/// Nonzero structure of a set of total-derivative blocks, plus a coloring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPattern {
    key: ColoringKey,
    nonzeros: BTreeMap<String, BTreeMap<String, Vec<(usize, usize)>>>,
    colors: Vec<Vec<Column>>,
}

impl SparsityPattern {
    /// Builds a pattern from dense blocks sampled at several points.
    ///
    /// `samples` holds one list of blocks per point, ordered by `of` then
    /// `wrt`. An entry is nonzero if it is nonzero in any sample.
    #[must_use]
    pub fn from_samples(
        key: ColoringKey,
        of: &[Extent<'_>],
        wrt: &[Extent<'_>],
        samples: &[Vec<Array2<f64>>],
    ) -> Self {
        let mut nonzeros: BTreeMap<String, BTreeMap<String, Vec<(usize, usize)>>> = BTreeMap::new();

        for (i, &(of_name, _)) in of.iter().enumerate() {
            for (j, &(wrt_name, _)) in wrt.iter().enumerate() {
                let mut entries = BTreeSet::new();
                for blocks in samples {
                    let Some(block) = blocks.get(i * wrt.len() + j) else {
                        continue;
                    };
                    for ((row, col), value) in block.indexed_iter() {
                        if *value != 0.0 {
                            entries.insert((row, col));
                        }
                    }
                }
                if !entries.is_empty() {
                    nonzeros
                        .entry(of_name.to_owned())
                        .or_default()
                        .insert(wrt_name.to_owned(), entries.into_iter().collect());
                }
            }
        }

        let colors = color_columns(of, wrt, &nonzeros);
        Self {
            key,
            nonzeros,
            colors,
        }
    }

    #[must_use]
    pub fn key(&self) -> ColoringKey {
        self.key
    }

    /// Nonzero `(row, col)` entries of one block; empty for a structural zero.
    #[must_use]
    pub fn nonzeros(&self, of: &str, wrt: &str) -> &[(usize, usize)] {
        self.nonzeros
            .get(of)
            .and_then(|row| row.get(wrt))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Column groups that can be seeded together.
    #[must_use]
    pub fn colors(&self) -> &[Vec<Column>] {
        &self.colors
    }

    #[must_use]
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Total number of nonzero entries across all blocks.
    #[must_use]
    pub fn nonzero_count(&self) -> usize {
        self.nonzeros
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

/// Greedy coloring in column order.
///
/// Rows are numbered across all `of` blocks stacked vertically. Columns with
/// no nonzero rows get no color.
fn color_columns(
    of: &[Extent<'_>],
    wrt: &[Extent<'_>],
    nonzeros: &BTreeMap<String, BTreeMap<String, Vec<(usize, usize)>>>,
) -> Vec<Vec<Column>> {
    let mut offsets = Vec::with_capacity(of.len());
    let mut total = 0;
    for &(_, rows) in of {
        offsets.push(total);
        total += rows;
    }

    let mut colors: Vec<(Vec<Column>, HashSet<usize>)> = Vec::new();
    let mut seen = HashSet::new();
    for &(wrt_name, cols) in wrt {
        if !seen.insert(wrt_name) {
            continue;
        }
        for index in 0..cols {
            let mut rows = HashSet::new();
            for (&(of_name, _), &offset) in of.iter().zip(&offsets) {
                let Some(entries) = nonzeros.get(of_name).and_then(|row| row.get(wrt_name)) else {
                    continue;
                };
                rows.extend(
                    entries
                        .iter()
                        .filter(|&&(_, col)| col == index)
                        .map(|&(row, _)| offset + row),
                );
            }
            if rows.is_empty() {
                continue;
            }

            let column = Column {
                wrt: wrt_name.to_owned(),
                index,
            };
            match colors.iter_mut().find(|(_, used)| used.is_disjoint(&rows)) {
                Some((members, used)) => {
                    members.push(column);
                    used.extend(rows);
                }
                None => colors.push((vec![column], rows)),
            }
        }
    }

    colors.into_iter().map(|(members, _)| members).collect()
}
