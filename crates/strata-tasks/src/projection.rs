//! Geometric projection task: signed distance between two primitives.
//!
//! Point↔point is the 3-row vector error `pA − pB`; every other
//! supported pair is a single scalar row. Jacobians use the
//! closest-point form `ĝᵀ(J_A(p) − J_B(cp))`: `cp` is the material
//! point of primitive B closest to (or defining the distance from) the
//! A-side point, so the row is exact to first order for rigid
//! geometry.

use nalgebra::{DMatrix, DVector, Isometry3, Point3, Vector3};
use tracing::debug;

use strata_core::{
    Scalar,
    error::{BindingError, ConfigError, StrataError},
    types::RowType,
};
use strata_geom::{BoxShape, Primitive, PrimitiveKind, PrimitiveShape, PrimitiveStore};
use strata_kin::RobotState;

/// Distance below which a direction becomes undefined and the row is
/// neutralized for the tick.
const DEGENERATE_DISTANCE: Scalar = 1e-9;

#[derive(Debug, Clone)]
pub struct Projection {
    kind_a: PrimitiveKind,
    kind_b: PrimitiveKind,
    name_a: String,
    name_b: String,
    rows: usize,
    row_types: Vec<RowType>,
    jac_a: DMatrix<Scalar>,
    jac_b: DMatrix<Scalar>,
}

impl Projection {
    /// Parse `(kind_a, kind_b, "a = b" [, eq|leq|geq])`.
    pub fn parse(def_params: &[String]) -> Result<Self, StrataError> {
        if def_params.len() < 3 || def_params.len() > 4 {
            return Err(ConfigError::WrongArity {
                what: "GeometricProjection",
                expected: 3,
                got: def_params.len(),
            }
            .into());
        }
        let kind_a = PrimitiveKind::parse(&def_params[0])?;
        let kind_b = PrimitiveKind::parse(&def_params[1])?;
        let (name_a, name_b) = parse_binding(&def_params[2])?;

        let rows = match (kind_a, kind_b) {
            (PrimitiveKind::Point, PrimitiveKind::Point) => 3,
            (
                PrimitiveKind::Point,
                PrimitiveKind::Line
                | PrimitiveKind::Plane
                | PrimitiveKind::Box
                | PrimitiveKind::Cylinder
                | PrimitiveKind::Sphere,
            )
            | (PrimitiveKind::Sphere, PrimitiveKind::Plane | PrimitiveKind::Sphere) => 1,
            _ => {
                return Err(BindingError::UnsupportedPair {
                    op: "projection",
                    a: kind_a.name().to_string(),
                    b: kind_b.name().to_string(),
                }
                .into());
            }
        };

        let sign = match def_params.get(3).map(String::as_str) {
            None | Some("eq") => RowType::Eq,
            Some("leq") => RowType::Leq,
            Some("geq") => RowType::Geq,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "projection sign".into(),
                    message: format!("expected eq, leq or geq, got '{other}'"),
                }
                .into());
            }
        };
        if rows == 3 && sign != RowType::Eq {
            return Err(ConfigError::InvalidValue {
                field: "projection sign".into(),
                message: "point-point projection only supports eq".into(),
            }
            .into());
        }

        Ok(Self {
            kind_a,
            kind_b,
            name_a,
            name_b,
            rows,
            row_types: vec![sign; rows],
            jac_a: DMatrix::zeros(0, 0),
            jac_b: DMatrix::zeros(0, 0),
        })
    }

    pub fn init(&mut self, state: &RobotState, store: &PrimitiveStore, n_controls: usize) -> Result<(), StrataError> {
        for (name, kind) in [(&self.name_a, self.kind_a), (&self.name_b, self.kind_b)] {
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
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn row_types(&self) -> &[RowType] {
        &self.row_types
    }

    /// Primitive names this task binds, for dependency registration.
    #[must_use]
    pub fn bound_primitives(&self) -> Vec<&str> {
        vec![&self.name_a, &self.name_b]
    }

    pub fn update(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        e: &mut DVector<Scalar>,
        j: &mut DMatrix<Scalar>,
    ) -> Result<(), StrataError> {
        let prim_a = resolve(store, &self.name_a, self.kind_a)?;
        let prim_b = resolve(store, &self.name_b, self.kind_b)?;
        let seg_a = state.tree.resolve_frame(&prim_a.frame_id)?;
        let seg_b = state.tree.resolve_frame(&prim_b.frame_id)?;
        let pose_b = state.tree.segment_pose(&state.q, seg_b);

        // A-side attachment point (point coordinates or sphere center).
        let (local_a, radius_a) = match &prim_a.shape {
            PrimitiveShape::Point(p) => (p.p, 0.0),
            PrimitiveShape::Sphere(s) => (s.center, s.radius),
            _ => unreachable!("pair support checked at parse"),
        };
        let pa = state
            .tree
            .frame_jacobian_into(&state.q, seg_a, &local_a, &mut self.jac_a);

        if self.rows == 3 {
            // point-point: vector error.
            let PrimitiveShape::Point(pb_shape) = &prim_b.shape else {
                unreachable!("pair support checked at parse");
            };
            let pb = state
                .tree
                .frame_jacobian_into(&state.q, seg_b, &pb_shape.p, &mut self.jac_b);
            let diff = pa.coords - pb.coords;
            for row in 0..3 {
                e[row] = diff[row];
                for col in 0..j.ncols() {
                    j[(row, col)] = self.jac_a[(row, col)] - self.jac_b[(row, col)];
                }
            }
            return Ok(());
        }

        // Scalar pairs: signed distance, gradient and B-side material
        // point in B's frame coordinates.
        let surface = match &prim_b.shape {
            PrimitiveShape::Plane(plane) => {
                let n_w = pose_b.rotation * plane.normal.into_inner();
                let anchor_w = pose_b * Point3::from(plane.normal.into_inner() * plane.offset);
                let dist = n_w.dot(&pa.coords) - n_w.dot(&anchor_w.coords);
                let foot_w = pa - n_w * dist;
                Some(ScalarRow {
                    distance: dist,
                    grad: n_w,
                    cp_local: pose_b.inverse_transform_point(&foot_w),
                })
            }
            PrimitiveShape::Sphere(sphere) => {
                let c_w = pose_b * sphere.center;
                let diff = pa.coords - c_w.coords;
                let rho = diff.norm();
                (rho > DEGENERATE_DISTANCE).then(|| ScalarRow {
                    distance: rho - sphere.radius,
                    grad: diff / rho,
                    cp_local: sphere.center,
                })
            }
            PrimitiveShape::Line(line) => {
                axis_row(&pose_b, &pa, &line.origin, line.direction.as_ref(), 0.0)
            }
            PrimitiveShape::Cylinder(cyl) => {
                axis_row(&pose_b, &pa, &cyl.origin, cyl.direction.as_ref(), cyl.radius)
            }
            PrimitiveShape::Box(boxed) => box_row(&pose_b, &pa, boxed),
            _ => unreachable!("pair support checked at parse"),
        };

        match surface {
            Some(row) => {
                state
                    .tree
                    .frame_jacobian_into(&state.q, seg_b, &row.cp_local, &mut self.jac_b);
                e[0] = row.distance - radius_a;
                for col in 0..j.ncols() {
                    let rel = Vector3::new(
                        self.jac_a[(0, col)] - self.jac_b[(0, col)],
                        self.jac_a[(1, col)] - self.jac_b[(1, col)],
                        self.jac_a[(2, col)] - self.jac_b[(2, col)],
                    );
                    j[(0, col)] = row.grad.dot(&rel);
                }
            }
            None => {
                // Coincident geometry: no direction to push along.
                debug!(
                    task_a = %self.name_a,
                    task_b = %self.name_b,
                    "projection degenerate this tick"
                );
                e[0] = 0.0;
                j.fill(0.0);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        DVector::zeros(self.rows)
    }
}

/// Scalar-row geometry against one B-side shape.
struct ScalarRow {
    distance: Scalar,
    /// Unit gradient of the distance with respect to the A-side point.
    grad: Vector3<Scalar>,
    /// Material point of B (in B's frame) the distance is measured to.
    cp_local: Point3<Scalar>,
}

/// Distance from a point to an axis (line or infinite cylinder wall).
fn axis_row(
    pose_b: &Isometry3<Scalar>,
    pa: &Point3<Scalar>,
    origin_local: &Point3<Scalar>,
    dir_local: &Vector3<Scalar>,
    radius: Scalar,
) -> Option<ScalarRow> {
    let o_w = pose_b * origin_local;
    let d_w = pose_b.rotation * dir_local;
    let v = pa.coords - o_w.coords;
    let along = v.dot(&d_w);
    let perp = v - d_w * along;
    let rho = perp.norm();
    (rho > DEGENERATE_DISTANCE).then(|| ScalarRow {
        distance: rho - radius,
        grad: perp / rho,
        cp_local: origin_local + dir_local * along,
    })
}

/// Signed distance from a point to an oriented box (negative inside).
fn box_row(
    pose_b: &Isometry3<Scalar>,
    pa: &Point3<Scalar>,
    boxed: &BoxShape,
) -> Option<ScalarRow> {
    let box_pose = Isometry3::from_parts(boxed.center.coords.into(), boxed.rotation);
    let world_to_box = (pose_b * box_pose).inverse();
    let pl = world_to_box * pa;
    let half = boxed.extents / 2.0;

    let clamped = Point3::new(
        pl.x.clamp(-half.x, half.x),
        pl.y.clamp(-half.y, half.y),
        pl.z.clamp(-half.z, half.z),
    );

    let (distance, grad_local, cp_box) = if clamped != pl {
        // Outside: distance to the clamped surface point.
        let diff = pl - clamped;
        let rho = diff.norm();
        if rho <= DEGENERATE_DISTANCE {
            return None;
        }
        (rho, diff / rho, clamped)
    } else {
        // Inside: negative distance to the nearest face.
        let margins = [half.x - pl.x.abs(), half.y - pl.y.abs(), half.z - pl.z.abs()];
        let (axis, &margin) = margins
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .expect("three margins");
        let sign = if pl[axis] >= 0.0 { 1.0 } else { -1.0 };
        let mut grad = Vector3::zeros();
        grad[axis] = sign;
        let mut cp = pl;
        cp[axis] = sign * half[axis];
        (-margin, grad, cp)
    };

    let rot_world = pose_b.rotation * boxed.rotation;
    Some(ScalarRow {
        distance,
        grad: rot_world * grad_local,
        cp_local: box_pose * cp_box,
    })
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

/// Split the `"a = b"` binding parameter.
pub(crate) fn parse_binding(text: &str) -> Result<(String, String), ConfigError> {
    let mut parts = text.splitn(2, '=');
    let a = parts.next().map(str::trim).unwrap_or_default();
    let b = parts.next().map(str::trim).unwrap_or_default();
    if a.is_empty() || b.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "primitive binding".into(),
            message: format!("expected 'name_a = name_b', got '{text}'"),
        });
    }
    Ok((a.to_string(), b.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
