//! Parameter grids enumerated by batch drivers
//!
//! Indices enumerate the cartesian product with the first axis outermost,
//! so index `i` always maps to the same combination across restarts.

use crate::error::{Result, TrackerError};

use super::kind::ExperimentKind;
use super::parameters::Parameters;

/// Grid of seed × inner quantity proportion × inner length proportion
#[derive(Debug, Clone)]
pub struct ParameterGrid {
    pub kind: ExperimentKind,
    pub seeds: Vec<u64>,
    pub inner_quantity_proportions: Vec<f64>,
    pub inner_length_proportions: Vec<f64>,
}

impl ParameterGrid {
    /// Twenty seeds, full and halved inner quantity and length
    pub fn standard(kind: ExperimentKind) -> Self {
        Self {
            kind,
            seeds: (2..22).collect(),
            inner_quantity_proportions: vec![1.0, 0.5],
            inner_length_proportions: vec![1.0, 0.5],
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len() * self.inner_quantity_proportions.len() * self.inner_length_proportions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parameters of the run at `index`
    pub fn get(&self, index: usize) -> Result<Parameters> {
        let total = self.len();
        if index >= total {
            return Err(TrackerError::IndexOutOfRange { index, total });
        }

        let n_length = self.inner_length_proportions.len();
        let n_quantity = self.inner_quantity_proportions.len();
        let length_i = index % n_length;
        let quantity_i = (index / n_length) % n_quantity;
        let seed_i = index / (n_length * n_quantity);

        let mut params = Parameters::defaults(self.kind, self.seeds[seed_i]);
        params.index = Some(index);
        params.inner_quantity_proportion = self.inner_quantity_proportions[quantity_i];
        params.inner_length_proportion = self.inner_length_proportions[length_i];
        Ok(params)
    }

    pub fn iter(&self) -> impl Iterator<Item = Parameters> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i).ok())
    }
}

/// Grid of seed × default inner quantity for parameter tuning
#[derive(Debug, Clone)]
pub struct TuningGrid {
    pub kind: ExperimentKind,
    pub seeds: Vec<u64>,
    pub inner_quantities: Vec<u64>,
}

impl TuningGrid {
    pub fn standard(kind: ExperimentKind) -> Self {
        Self {
            kind,
            seeds: (0..20).collect(),
            inner_quantities: kind.tuning_inner_quantities(),
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len() * self.inner_quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(seed, default_inner_quantity)` at `index`
    pub fn combination(&self, index: usize) -> Result<(u64, u64)> {
        let total = self.len();
        if index >= total {
            return Err(TrackerError::IndexOutOfRange { index, total });
        }
        let n = self.inner_quantities.len();
        Ok((self.seeds[index / n], self.inner_quantities[index % n]))
    }

    pub fn get(&self, index: usize) -> Result<Parameters> {
        let (seed, quantity) = self.combination(index)?;
        Ok(Parameters::tuning(self.kind, seed, quantity))
    }
}
