//! SDF-based obstacle avoidance.
//!
//! Each bound point or sphere primitive on the manipulator contributes
//! one lower-bound row: `e` is the signed obstacle distance at the
//! primitive's world position and `J = ĝᵀ·J_point`. Gradients come
//! from an injected [`DistanceOracle`]. If the oracle fails, or a
//! gradient is unusable, the affected rows are neutralized for the
//! tick (zero Jacobian, zero value); the task itself never fails over
//! the oracle and no substitute gradient is invented.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Point3};
use tracing::warn;

use strata_core::{
    Scalar,
    error::{BindingError, ConfigError, StrataError},
    types::RowType,
};
use strata_geom::{PrimitiveKind, PrimitiveShape, PrimitiveStore};
use strata_kin::RobotState;

use crate::oracle::DistanceOracle;

#[derive(Clone)]
pub struct AvoidCollisionsSdf {
    primitive_names: Vec<String>,
    oracle: Arc<dyn DistanceOracle>,
    row_types: Vec<RowType>,
    /// Query points for the bulk oracle call, reused tick to tick.
    points: Vec<Point3<Scalar>>,
    /// Sphere radii per row (zero for points).
    radii: Vec<Scalar>,
    jac: DMatrix<Scalar>,
    root_frame: String,
}

impl std::fmt::Debug for AvoidCollisionsSdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvoidCollisionsSdf")
            .field("primitive_names", &self.primitive_names)
            .finish_non_exhaustive()
    }
}

impl AvoidCollisionsSdf {
    /// Parse the list of avoidance primitive names.
    pub fn parse(
        def_params: &[String],
        oracle: Option<&Arc<dyn DistanceOracle>>,
    ) -> Result<Self, StrataError> {
        if def_params.is_empty() {
            return Err(ConfigError::WrongArity {
                what: "AvoidCollisionsSDF",
                expected: 1,
                got: 0,
            }
            .into());
        }
        let oracle = oracle.ok_or_else(|| {
            strata_core::error::OracleError::Unavailable(
                "no distance oracle injected into the controller".into(),
            )
        })?;
        Ok(Self {
            primitive_names: def_params.to_vec(),
            oracle: oracle.clone(),
            row_types: vec![RowType::Geq; def_params.len()],
            points: Vec::new(),
            radii: Vec::new(),
            jac: DMatrix::zeros(0, 0),
            root_frame: String::new(),
        })
    }

    pub fn init(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        n_controls: usize,
    ) -> Result<(), StrataError> {
        for name in &self.primitive_names {
            let primitive = store
                .get(name)
                .ok_or_else(|| BindingError::UnknownPrimitive(name.clone()))?;
            if !matches!(
                primitive.kind(),
                PrimitiveKind::Point | PrimitiveKind::Sphere
            ) {
                return Err(BindingError::PrimitiveKindMismatch {
                    name: name.clone(),
                    expected: "point or sphere",
                    found: primitive.kind().name(),
                }
                .into());
            }
            let segment = state.tree.resolve_frame(&primitive.frame_id)?;
            if state.tree.q_nr_of_segment(segment).is_none() {
                return Err(BindingError::NotOnManipulator(name.clone()).into());
            }
        }
        self.root_frame = state
            .tree
            .segments()
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        self.points = Vec::with_capacity(self.primitive_names.len());
        self.radii = Vec::with_capacity(self.primitive_names.len());
        self.jac = DMatrix::zeros(6, n_controls);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.primitive_names.len()
    }

    #[must_use]
    pub fn row_types(&self) -> &[RowType] {
        &self.row_types
    }

    #[must_use]
    pub fn bound_primitives(&self) -> Vec<&str> {
        self.primitive_names.iter().map(String::as_str).collect()
    }

    pub fn update(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        e: &mut DVector<Scalar>,
        j: &mut DMatrix<Scalar>,
    ) -> Result<(), StrataError> {
        // Pass 1: world positions of every avoidance primitive.
        self.points.clear();
        self.radii.clear();
        for name in &self.primitive_names {
            let primitive = store
                .get(name)
                .ok_or_else(|| BindingError::UnknownPrimitive(name.clone()))?;
            let segment = state.tree.resolve_frame(&primitive.frame_id)?;
            let (local, radius) = match &primitive.shape {
                PrimitiveShape::Point(p) => (p.p, 0.0),
                PrimitiveShape::Sphere(s) => (s.center, s.radius),
                _ => {
                    return Err(BindingError::PrimitiveKindMismatch {
                        name: name.clone(),
                        expected: "point or sphere",
                        found: primitive.kind().name(),
                    }
                    .into());
                }
            };
            let pose = state.tree.segment_pose(&state.q, segment);
            self.points.push(pose * local);
            self.radii.push(radius);
        }

        let gradients = match self.oracle.query_gradients(&self.points, &self.root_frame) {
            Ok(gradients) if gradients.len() == self.points.len() => gradients,
            Ok(gradients) => {
                warn!(
                    expected = self.points.len(),
                    got = gradients.len(),
                    "distance oracle returned a short batch; skipping avoidance rows this tick"
                );
                neutralize(e, j);
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "distance oracle failed; skipping avoidance rows this tick");
                neutralize(e, j);
                return Ok(());
            }
        };

        // Pass 2: one row per primitive.
        j.fill(0.0);
        for (row, (name, gradient)) in self
            .primitive_names
            .iter()
            .zip(gradients.iter())
            .enumerate()
        {
            if !self.oracle.is_valid(gradient) {
                warn!(primitive = %name, "invalid obstacle gradient; row skipped this tick");
                e[row] = 0.0;
                continue;
            }
            let distance = gradient.norm();
            let direction = gradient / distance;
            e[row] = distance - self.radii[row];

            let primitive = store
                .get(name)
                .ok_or_else(|| BindingError::UnknownPrimitive(name.clone()))?;
            let segment = state.tree.resolve_frame(&primitive.frame_id)?;
            let local = match &primitive.shape {
                PrimitiveShape::Point(p) => p.p,
                PrimitiveShape::Sphere(s) => s.center,
                _ => unreachable!("kinds checked in pass 1"),
            };
            state
                .tree
                .frame_jacobian_into(&state.q, segment, &local, &mut self.jac);
            for col in 0..j.ncols() {
                j[(row, col)] = direction.x * self.jac[(0, col)]
                    + direction.y * self.jac[(1, col)]
                    + direction.z * self.jac[(2, col)];
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        DVector::zeros(self.rows())
    }
}

fn neutralize(e: &mut DVector<Scalar>, j: &mut DMatrix<Scalar>) {
    e.fill(0.0);
    j.fill(0.0);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
