use anyhow::bail;
use nalgebra::DMatrix;

use crate::errors::ValidationError;
use crate::Result;

/// Symmetric pairwise distances between named taxa.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    names: Vec<String>,
    matrix: DMatrix<f64>,
}

impl DistanceMatrix {
    pub fn new(names: Vec<String>, matrix: DMatrix<f64>) -> Result<Self> {
        if matrix.nrows() != names.len() || matrix.ncols() != names.len() {
            bail!(ValidationError::new(format!(
                "Distance matrix of shape {}x{} does not match {} names",
                matrix.nrows(),
                matrix.ncols(),
                names.len()
            )));
        }
        Ok(Self { names, matrix })
    }

    /// Builds the matrix from `n * n` values in row-major order.
    pub fn from_row_major(names: Vec<String>, distances: &[f64]) -> Result<Self> {
        let n = names.len();
        if distances.len() != n * n {
            bail!(ValidationError::new(format!(
                "Expected {} distances for {} names, got {}",
                n * n,
                n,
                distances.len()
            )));
        }
        Self::new(names, DMatrix::from_row_slice(n, n, distances))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.matrix[(i, j)])
    }

    pub fn has_nan(&self) -> bool {
        self.matrix.iter().any(|d| d.is_nan())
    }

    pub fn to_row_major(&self) -> Vec<f64> {
        self.matrix.transpose().as_slice().to_vec()
    }
}
