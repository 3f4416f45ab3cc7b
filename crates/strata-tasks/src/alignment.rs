//! Geometric alignment task: angular error between two directions.
//!
//! The error is `e = cos δ − d₁·d₂` for a configurable angle offset δ
//! (default zero, giving `1 − cos θ`). The row vanishes exactly when
//! the angle between the directions equals δ, and the Jacobian
//! `(d₁×d₂)ᵀ(J_ω,B − J_ω,A)` carries the matching sign.

use nalgebra::{DMatrix, DVector, Vector3};

use strata_core::{
    Scalar,
    error::{BindingError, ConfigError, StrataError},
    types::RowType,
};
use strata_geom::{Primitive, PrimitiveKind, PrimitiveShape, PrimitiveStore};
use strata_kin::RobotState;

use crate::projection::parse_binding;

/// Distance below which a line-to-sphere bearing is undefined.
const DEGENERATE_DISTANCE: Scalar = 1e-9;

#[derive(Debug, Clone)]
pub struct Alignment {
    kind_b: PrimitiveKind,
    name_a: String,
    name_b: String,
    cos_offset: Scalar,
    row_types: [RowType; 1],
    jac_a: DMatrix<Scalar>,
    jac_b: DMatrix<Scalar>,
}

impl Alignment {
    /// Parse `(kind_a, kind_b, "a = b" [, angle_offset_rad])`.
    ///
    /// The first primitive must be a line; the second may be a line,
    /// plane, cylinder or sphere.
    pub fn parse(def_params: &[String]) -> Result<Self, StrataError> {
        if def_params.len() < 3 || def_params.len() > 4 {
            return Err(ConfigError::WrongArity {
                what: "GeometricAlignment",
                expected: 3,
                got: def_params.len(),
            }
            .into());
        }
        let kind_a = PrimitiveKind::parse(&def_params[0])?;
        let kind_b = PrimitiveKind::parse(&def_params[1])?;
        if kind_a != PrimitiveKind::Line
            || !matches!(
                kind_b,
                PrimitiveKind::Line
                    | PrimitiveKind::Plane
                    | PrimitiveKind::Cylinder
                    | PrimitiveKind::Sphere
            )
        {
            return Err(BindingError::UnsupportedPair {
                op: "alignment",
                a: kind_a.name().to_string(),
                b: kind_b.name().to_string(),
            }
            .into());
        }
        let (name_a, name_b) = parse_binding(&def_params[2])?;
        let offset = match def_params.get(3) {
            Some(text) => text.parse().map_err(|_| ConfigError::BadNumber {
                what: "angle offset",
                text: text.clone(),
            })?,
            None => 0.0,
        };
        Ok(Self {
            kind_b,
            name_a,
            name_b,
            cos_offset: Scalar::cos(offset),
            row_types: [RowType::Eq],
            jac_a: DMatrix::zeros(0, 0),
            jac_b: DMatrix::zeros(0, 0),
        })
    }

    pub fn init(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        n_controls: usize,
    ) -> Result<(), StrataError> {
        for (name, kind) in [
            (&self.name_a, PrimitiveKind::Line),
            (&self.name_b, self.kind_b),
        ] {
            let primitive = store
                .get(name)
                .ok_or_else(|| BindingError::UnknownPrimitive(name.clone()))?;
            if primitive.kind() != kind {
                return Err(BindingError::PrimitiveKindMismatch {
                    name: name.clone(),
                    expected: kind.name(),
                    found: primitive.kind().name(),
                }
                .into());
            }
            state.tree.resolve_frame(&primitive.frame_id)?;
        }
        self.jac_a = DMatrix::zeros(6, n_controls);
        self.jac_b = DMatrix::zeros(6, n_controls);
        Ok(())
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        1
    }

    #[must_use]
    pub fn row_types(&self) -> &[RowType] {
        &self.row_types
    }

    #[must_use]
    pub fn bound_primitives(&self) -> Vec<&str> {
        vec![&self.name_a, &self.name_b]
    }

    /// Current angle in radians recovered from the task value.
    #[must_use]
    pub fn angle_from_error(&self, e: Scalar) -> Scalar {
        (self.cos_offset - e).clamp(-1.0, 1.0).acos()
    }

    pub fn update(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        e: &mut DVector<Scalar>,
        j: &mut DMatrix<Scalar>,
    ) -> Result<(), StrataError> {
        let prim_a = resolve(store, &self.name_a, PrimitiveKind::Line)?;
        let prim_b = resolve(store, &self.name_b, self.kind_b)?;
        let seg_a = state.tree.resolve_frame(&prim_a.frame_id)?;
        let seg_b = state.tree.resolve_frame(&prim_b.frame_id)?;

        let PrimitiveShape::Line(line) = &prim_a.shape else {
            unreachable!("kind checked above");
        };
        let pose_a = state.tree.segment_pose(&state.q, seg_a);
        let pose_b = state.tree.segment_pose(&state.q, seg_b);
        let d1 = pose_a.rotation * line.direction.into_inner();

        // Angular (and for the sphere bearing also linear) Jacobians at
        // the primitives' reference points.
        state
            .tree
            .frame_jacobian_into(&state.q, seg_a, &line.origin, &mut self.jac_a);

        match &prim_b.shape {
            PrimitiveShape::Line(other) => {
                let d2 = pose_b.rotation * other.direction.into_inner();
                state
                    .tree
                    .frame_jacobian_into(&state.q, seg_b, &other.origin, &mut self.jac_b);
                self.rigid_row(&d1, &d2, e, j);
            }
            PrimitiveShape::Plane(plane) => {
                let d2 = pose_b.rotation * plane.normal.into_inner();
                state.tree.frame_jacobian_into(
                    &state.q,
                    seg_b,
                    &nalgebra::Point3::origin(),
                    &mut self.jac_b,
                );
                self.rigid_row(&d1, &d2, e, j);
            }
            PrimitiveShape::Cylinder(cyl) => {
                let d2 = pose_b.rotation * cyl.direction.into_inner();
                state
                    .tree
                    .frame_jacobian_into(&state.q, seg_b, &cyl.origin, &mut self.jac_b);
                self.rigid_row(&d1, &d2, e, j);
            }
            PrimitiveShape::Sphere(sphere) => {
                let o_w = pose_a * line.origin;
                let c_w = state.tree.frame_jacobian_into(
                    &state.q,
                    seg_b,
                    &sphere.center,
                    &mut self.jac_b,
                );
                let v = c_w.coords - o_w.coords;
                let rho = v.norm();
                if rho <= DEGENERATE_DISTANCE {
                    e[0] = 0.0;
                    j.fill(0.0);
                    return Ok(());
                }
                let d2 = v / rho;
                e[0] = self.cos_offset - d1.dot(&d2);
                // Bearing row: the target direction moves with both the
                // sphere center and the line origin.
                let c = d1.cross(&d2);
                let p_d1 = d1 - d2 * d2.dot(&d1);
                for col in 0..j.ncols() {
                    let wa = Vector3::new(
                        self.jac_a[(3, col)],
                        self.jac_a[(4, col)],
                        self.jac_a[(5, col)],
                    );
                    let rel_lin = Vector3::new(
                        self.jac_b[(0, col)] - self.jac_a[(0, col)],
                        self.jac_b[(1, col)] - self.jac_a[(1, col)],
                        self.jac_b[(2, col)] - self.jac_a[(2, col)],
                    );
                    j[(0, col)] = -c.dot(&wa) - p_d1.dot(&rel_lin) / rho;
                }
            }
            _ => unreachable!("pair support checked at parse"),
        }
        Ok(())
    }

    /// Row for a target direction rigidly attached to frame B.
    fn rigid_row(
        &self,
        d1: &Vector3<Scalar>,
        d2: &Vector3<Scalar>,
        e: &mut DVector<Scalar>,
        j: &mut DMatrix<Scalar>,
    ) {
        e[0] = self.cos_offset - d1.dot(d2);
        let c = d1.cross(d2);
        for col in 0..j.ncols() {
            let wa = Vector3::new(
                self.jac_a[(3, col)],
                self.jac_a[(4, col)],
                self.jac_a[(5, col)],
            );
            let wb = Vector3::new(
                self.jac_b[(3, col)],
                self.jac_b[(4, col)],
                self.jac_b[(5, col)],
            );
            j[(0, col)] = c.dot(&(wb - wa));
        }
    }

    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        DVector::zeros(1)
    }
}

fn resolve<'a>(
    store: &'a PrimitiveStore,
    name: &str,
    kind: PrimitiveKind,
) -> Result<&'a Primitive, BindingError> {
    let primitive = store
        .get(name)
        .ok_or_else(|| BindingError::UnknownPrimitive(name.to_string()))?;
    if primitive.kind() != kind {
        return Err(BindingError::PrimitiveKindMismatch {
            name: name.to_string(),
            expected: kind.name(),
            found: primitive.kind().name(),
        });
    }
    Ok(primitive)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
