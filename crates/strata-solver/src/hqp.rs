//! Cascaded slack QP over Clarabel.
//!
//! Each priority level `p` solves
//!
//! ```text
//!   min  ‖w‖² + η‖u‖²
//!   s.t. rows of levels < p locked at their achieved values/bounds
//!        J_p·u − w  =/≤/≥  ė*_p   (per row type)
//! ```
//!
//! so every level is feasible by construction and the slack `w`
//! measures exactly how much of the level's demand the remaining
//! freedom could not deliver. Equality rows are then locked at
//! `J·u*`, inequality rows at their slack-adjusted bounds, and the
//! next level solves inside that set. Only the highest-priority level
//! is allowed no slack: if its residual exceeds the tolerance the
//! whole solve reports infeasibility and the caller zeroes the
//! command.

use std::collections::BTreeMap;

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::debug;

use strata_core::{Scalar, error::SolverError, types::RowType};

use crate::stage::{HqpSolver, Stage};

/// One row carried forward from a solved level.
#[derive(Debug, Clone)]
enum LockedRow {
    Eq {
        coeffs: RowDVector<Scalar>,
        rhs: Scalar,
    },
    Leq {
        coeffs: RowDVector<Scalar>,
        bound: Scalar,
    },
    Geq {
        coeffs: RowDVector<Scalar>,
        bound: Scalar,
    },
}

/// Hierarchical QP solver backed by Clarabel.
pub struct ClarabelHqpSolver {
    stages: Vec<Stage>,
    /// Tikhonov weight on `‖u‖²` at every level.
    regularization: Scalar,
    /// Residual above which the top level counts as infeasible.
    slack_tolerance: Scalar,
}

impl Default for ClarabelHqpSolver {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            regularization: 1e-6,
            slack_tolerance: 1e-5,
        }
    }
}

impl ClarabelHqpSolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the `η` damping weight.
    #[must_use]
    pub fn with_regularization(mut self, eta: Scalar) -> Self {
        self.regularization = eta;
        self
    }

    /// Solve one priority level. Returns the velocity solution and the
    /// per-row violations of this level's own rows.
    fn solve_level(
        &self,
        n: usize,
        locked: &[LockedRow],
        rows: &[(RowDVector<Scalar>, Scalar, RowType)],
    ) -> Result<(DVector<Scalar>, Vec<Scalar>), SolverError> {
        let m = rows.len();
        let n_vars = n + m;

        let locked_eq = locked
            .iter()
            .filter(|r| matches!(r, LockedRow::Eq { .. }))
            .count();
        let locked_ineq = locked.len() - locked_eq;
        let cur_eq = rows.iter().filter(|r| r.2 == RowType::Eq).count();
        let cur_ineq = m - cur_eq;

        let n_eq = locked_eq + cur_eq;
        let n_ineq = locked_ineq + cur_ineq;

        // Quadratic cost: η‖u‖² + ‖w‖² (the 1/2 x'Px form needs the 2s).
        let mut p = DMatrix::<Scalar>::zeros(n_vars, n_vars);
        for i in 0..n {
            p[(i, i)] = 2.0 * self.regularization;
        }
        for i in n..n_vars {
            p[(i, i)] = 2.0;
        }
        let q = vec![0.0; n_vars];

        // Constraint rows: zero-cone block first, then nonnegative block.
        let mut a = DMatrix::<Scalar>::zeros(n_eq + n_ineq, n_vars);
        let mut b = vec![0.0; n_eq + n_ineq];
        let mut eq_row = 0;
        let mut ineq_row = n_eq;

        for row in locked {
            match row {
                LockedRow::Eq { coeffs, rhs } => {
                    a.view_mut((eq_row, 0), (1, n)).copy_from(coeffs);
                    b[eq_row] = *rhs;
                    eq_row += 1;
                }
                LockedRow::Leq { coeffs, bound } => {
                    a.view_mut((ineq_row, 0), (1, n)).copy_from(coeffs);
                    b[ineq_row] = *bound;
                    ineq_row += 1;
                }
                LockedRow::Geq { coeffs, bound } => {
                    a.view_mut((ineq_row, 0), (1, n)).copy_from(&(-coeffs));
                    b[ineq_row] = -bound;
                    ineq_row += 1;
                }
            }
        }

        for (j, (coeffs, target, row_type)) in rows.iter().enumerate() {
            match row_type {
                RowType::Eq => {
                    a.view_mut((eq_row, 0), (1, n)).copy_from(coeffs);
                    a[(eq_row, n + j)] = -1.0;
                    b[eq_row] = *target;
                    eq_row += 1;
                }
                RowType::Leq => {
                    a.view_mut((ineq_row, 0), (1, n)).copy_from(coeffs);
                    a[(ineq_row, n + j)] = -1.0;
                    b[ineq_row] = *target;
                    ineq_row += 1;
                }
                RowType::Geq => {
                    a.view_mut((ineq_row, 0), (1, n)).copy_from(&(-coeffs));
                    a[(ineq_row, n + j)] = -1.0;
                    b[ineq_row] = -target;
                    ineq_row += 1;
                }
            }
        }

        let mut cones = Vec::new();
        if n_eq > 0 {
            cones.push(ZeroConeT(n_eq));
        }
        if n_ineq > 0 {
            cones.push(NonnegativeConeT(n_ineq));
        }

        let p_csc = CscMatrix::from(p.row_iter());
        let a_csc = CscMatrix::from(a.row_iter());
        let mut settings = DefaultSettings::default();
        settings.verbose = false;

        let mut solver = DefaultSolver::new(&p_csc, &q, &a_csc, &b, &cones, settings);
        solver.solve();

        match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {}
            status => {
                return Err(SolverError::Backend(format!(
                    "level QP terminated with status {status:?}"
                )));
            }
        }

        let u = DVector::from_column_slice(&solver.solution.x[..n]);
        let violations = rows
            .iter()
            .map(|(coeffs, target, row_type)| {
                let achieved = (coeffs * &u)[0];
                match row_type {
                    RowType::Eq => (achieved - target).abs(),
                    RowType::Leq => (achieved - target).max(0.0),
                    RowType::Geq => (target - achieved).max(0.0),
                }
            })
            .collect();

        Ok((u, violations))
    }
}

impl HqpSolver for ClarabelHqpSolver {
    fn clear_stages(&mut self) {
        self.stages.clear();
    }

    fn append_stage(
        &mut self,
        priority: u32,
        e_dot_star: DVector<Scalar>,
        jacobian: DMatrix<Scalar>,
        row_types: &[RowType],
    ) {
        debug_assert_eq!(e_dot_star.len(), jacobian.nrows());
        debug_assert_eq!(e_dot_star.len(), row_types.len());
        self.stages.push(Stage {
            priority,
            e_dot_star,
            jacobian,
            row_types: row_types.to_vec(),
        });
    }

    fn solve(&mut self, n_controls: usize) -> Result<DVector<Scalar>, SolverError> {
        if self.stages.is_empty() {
            return Err(SolverError::NoStages);
        }

        // Group stage indices by ascending priority; ties concatenate.
        let mut levels: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, stage) in self.stages.iter().enumerate() {
            levels.entry(stage.priority).or_default().push(i);
        }

        let mut locked: Vec<LockedRow> = Vec::new();
        let mut u = DVector::zeros(n_controls);
        let mut top_level = true;

        for (&priority, stage_indices) in &levels {
            let mut rows: Vec<(RowDVector<Scalar>, Scalar, RowType)> = Vec::new();
            for &i in stage_indices {
                let stage = &self.stages[i];
                for r in 0..stage.rows() {
                    rows.push((
                        RowDVector::from(stage.jacobian.row(r).clone_owned()),
                        stage.e_dot_star[r],
                        stage.row_types[r],
                    ));
                }
            }

            let (level_u, violations) = self.solve_level(n_controls, &locked, &rows)?;

            let residual = violations.iter().fold(0.0, |acc: Scalar, v| acc.max(*v));
            if top_level && residual > self.slack_tolerance {
                return Err(SolverError::Infeasible { priority, residual });
            }
            if residual > self.slack_tolerance {
                debug!(priority, residual, "priority level relaxed");
            }

            // Lock this level's rows for everything below it.
            for ((coeffs, target, row_type), violation) in rows.into_iter().zip(&violations) {
                let achieved = (&coeffs * &level_u)[0];
                locked.push(match row_type {
                    RowType::Eq => LockedRow::Eq {
                        coeffs,
                        rhs: achieved,
                    },
                    RowType::Leq => LockedRow::Leq {
                        coeffs,
                        bound: target + violation,
                    },
                    RowType::Geq => LockedRow::Geq {
                        coeffs,
                        bound: target - violation,
                    },
                });
            }

            u = level_u;
            top_level = false;
        }

        Ok(u)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_kin::dls;

    fn eq_types(m: usize) -> Vec<RowType> {
        vec![RowType::Eq; m]
    }

    #[test]
    fn solve_without_stages_is_an_error() {
        let mut solver = ClarabelHqpSolver::new();
        assert!(matches!(solver.solve(2), Err(SolverError::NoStages)));
    }

    #[test]
    fn single_identity_stage_returns_target_rates() {
        let mut solver = ClarabelHqpSolver::new();
        let target = DVector::from_vec(vec![0.5, -0.3]);
        solver.append_stage(1, target.clone(), DMatrix::identity(2, 2), &eq_types(2));
        let u = solver.solve(2).unwrap();
        assert_relative_eq!(u[0], 0.5, epsilon = 1e-4);
        assert_relative_eq!(u[1], -0.3, epsilon = 1e-4);
    }

    #[test]
    fn matches_damped_least_squares_on_a_wide_stage() {
        let j = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, -1.0]);
        let target = DVector::from_vec(vec![0.6]);

        let mut solver = ClarabelHqpSolver::new();
        solver.append_stage(1, target.clone(), j.clone(), &eq_types(1));
        let u = solver.solve(3).unwrap();

        let reference = dls(&j, 1e-3) * &target;
        for i in 0..3 {
            assert_relative_eq!(u[i], reference[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn clearing_stages_resets_the_solver() {
        let mut solver = ClarabelHqpSolver::new();
        solver.append_stage(
            1,
            DVector::from_vec(vec![1.0]),
            DMatrix::identity(1, 1),
            &eq_types(1),
        );
        solver.clear_stages();
        assert!(matches!(solver.solve(1), Err(SolverError::NoStages)));
    }

    #[test]
    fn higher_priority_bound_caps_lower_priority_tracking() {
        let mut solver = ClarabelHqpSolver::new();
        // Priority 1: u0 <= 0.2 and u0 >= -0.2.
        solver.append_stage(
            1,
            DVector::from_vec(vec![0.2, -0.2]),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 0.0]),
            &[RowType::Leq, RowType::Geq],
        );
        // Priority 2: drive both joints hard.
        solver.append_stage(
            2,
            DVector::from_vec(vec![5.0, 0.4]),
            DMatrix::identity(2, 2),
            &eq_types(2),
        );
        let u = solver.solve(2).unwrap();
        assert_relative_eq!(u[0], 0.2, epsilon = 1e-3);
        assert_relative_eq!(u[1], 0.4, epsilon = 1e-3);
    }

    #[test]
    fn equal_priorities_concatenate() {
        let mut solver = ClarabelHqpSolver::new();
        // Two consistent single-row stages at the same priority.
        solver.append_stage(
            1,
            DVector::from_vec(vec![0.3]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            &eq_types(1),
        );
        solver.append_stage(
            1,
            DVector::from_vec(vec![-0.1]),
            DMatrix::from_row_slice(1, 2, &[0.0, 1.0]),
            &eq_types(1),
        );
        let u = solver.solve(2).unwrap();
        assert_relative_eq!(u[0], 0.3, epsilon = 1e-4);
        assert_relative_eq!(u[1], -0.1, epsilon = 1e-4);
    }

    #[test]
    fn contradictory_top_level_is_infeasible() {
        let mut solver = ClarabelHqpSolver::new();
        solver.append_stage(
            1,
            DVector::from_vec(vec![1.0]),
            DMatrix::from_row_slice(1, 1, &[1.0]),
            &eq_types(1),
        );
        solver.append_stage(
            1,
            DVector::from_vec(vec![-1.0]),
            DMatrix::from_row_slice(1, 1, &[1.0]),
            &eq_types(1),
        );
        let err = solver.solve(1).unwrap_err();
        assert!(matches!(err, SolverError::Infeasible { priority: 1, .. }));
    }

    #[test]
    fn contradiction_below_top_level_is_relaxed() {
        let mut solver = ClarabelHqpSolver::new();
        // Top level pins u0.
        solver.append_stage(
            1,
            DVector::from_vec(vec![0.1]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            &eq_types(1),
        );
        // Lower level wants u0 somewhere else entirely; that demand is
        // relaxed, not fatal, and u1 still tracks.
        solver.append_stage(
            2,
            DVector::from_vec(vec![3.0, 0.2]),
            DMatrix::identity(2, 2),
            &eq_types(2),
        );
        let u = solver.solve(2).unwrap();
        assert_relative_eq!(u[0], 0.1, epsilon = 1e-3);
        assert_relative_eq!(u[1], 0.2, epsilon = 1e-3);
    }

    #[test]
    fn inequality_only_hierarchy_rests_at_zero() {
        let mut solver = ClarabelHqpSolver::new();
        solver.append_stage(
            1,
            DVector::from_vec(vec![0.5, -0.5]),
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 0.0]),
            &[RowType::Leq, RowType::Geq],
        );
        let u = solver.solve(2).unwrap();
        // Nothing demands motion; regularization keeps u at rest.
        assert!(u.amax() < 1e-4);
    }

    #[test]
    fn geq_constraint_is_respected() {
        let mut solver = ClarabelHqpSolver::new();
        // Priority 1: u0 >= 0.3. Priority 2: u0 -> 0.
        solver.append_stage(
            1,
            DVector::from_vec(vec![0.3]),
            DMatrix::from_row_slice(1, 1, &[1.0]),
            &[RowType::Geq],
        );
        solver.append_stage(
            2,
            DVector::from_vec(vec![0.0]),
            DMatrix::from_row_slice(1, 1, &[1.0]),
            &eq_types(1),
        );
        let u = solver.solve(1).unwrap();
        assert_relative_eq!(u[0], 0.3, epsilon = 1e-3);
    }
}
