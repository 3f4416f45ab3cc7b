//! Numeric helpers: Moore-Penrose pseudoinverse and damped least
//! squares.
//!
//! `dls` is the classic fallback for solving a single task stage
//! outside the hierarchical QP: `u = dls(J) · ė*`. The solver tests use
//! it as an independent reference.

use nalgebra::DMatrix;

use strata_core::Scalar;

/// Moore-Penrose pseudoinverse via SVD.
///
/// Singular values below `ε · max(rows, cols) · σ_max` are treated as
/// zero.
#[must_use]
pub fn pinv(a: &DMatrix<Scalar>) -> DMatrix<Scalar> {
    if a.is_empty() {
        return DMatrix::zeros(a.ncols(), a.nrows());
    }
    let svd = a.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let tol = Scalar::EPSILON * a.nrows().max(a.ncols()) as Scalar * sigma_max;
    svd.pseudo_inverse(tol)
        .unwrap_or_else(|_| DMatrix::zeros(a.ncols(), a.nrows()))
}

/// Damped-least-squares right-inverse `Jᵀ(JJᵀ + η²I)⁻¹`.
///
/// Well defined near singular configurations; falls back to [`pinv`]
/// if the damped Gram matrix is still not invertible.
#[must_use]
pub fn dls(j: &DMatrix<Scalar>, eta: Scalar) -> DMatrix<Scalar> {
    let m = j.nrows();
    let damped = j * j.transpose() + DMatrix::identity(m, m) * (eta * eta);
    match damped.try_inverse() {
        Some(inv) => j.transpose() * inv,
        None => pinv(j),
    }
}
