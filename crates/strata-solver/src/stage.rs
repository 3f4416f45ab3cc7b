//! Stage accumulation and the solver contract.

use nalgebra::{DMatrix, DVector};

use strata_core::{Scalar, error::SolverError, types::RowType};

/// All rows a task contributes at its priority level for one tick.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Priority level; smaller solves earlier.
    pub priority: u32,
    /// Desired task rates, one per row.
    pub e_dot_star: DVector<Scalar>,
    /// Task Jacobian, rows × n_controls.
    pub jacobian: DMatrix<Scalar>,
    /// Constraint sense per row.
    pub row_types: Vec<RowType>,
}

impl Stage {
    /// Number of rows in this stage.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.e_dot_star.len()
    }
}

/// The narrow contract between the task manager and a hierarchical QP
/// implementation.
pub trait HqpSolver: Send {
    /// Drop all accumulated stages.
    fn clear_stages(&mut self);

    /// Append one task's rows at the given priority. Stages with equal
    /// priority are concatenated into one level.
    fn append_stage(
        &mut self,
        priority: u32,
        e_dot_star: DVector<Scalar>,
        jacobian: DMatrix<Scalar>,
        row_types: &[RowType],
    );

    /// Solve the accumulated hierarchy for the joint-velocity vector.
    fn solve(&mut self, n_controls: usize) -> Result<DVector<Scalar>, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_row_count() {
        let stage = Stage {
            priority: 1,
            e_dot_star: DVector::from_vec(vec![0.1, 0.2]),
            jacobian: DMatrix::zeros(2, 4),
            row_types: vec![RowType::Eq, RowType::Eq],
        };
        assert_eq!(stage.rows(), 2);
    }
}
