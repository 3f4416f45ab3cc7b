//! Primitive shapes, their wire records and parameter parsing.
//!
//! Shape parameters cross the command surface as a flat `Vec<f64>`.
//! Arities are fixed per kind; directions and normals are normalized on
//! ingest, so a round trip through [`PrimitiveRecord`] returns the
//! normalized form.

use nalgebra::{Point3, UnitQuaternion, UnitVector3, Vector3};
use serde::{Deserialize, Serialize};

use strata_core::Scalar;
use strata_core::error::ConfigError;

// ---------------------------------------------------------------------------
// PrimitiveKind
// ---------------------------------------------------------------------------

/// Tag identifying a primitive's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Point,
    Line,
    Plane,
    Sphere,
    Cylinder,
    Box,
}

impl PrimitiveKind {
    /// Wire name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Plane => "plane",
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Box => "box",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "point" => Ok(Self::Point),
            "line" => Ok(Self::Line),
            "plane" => Ok(Self::Plane),
            "sphere" => Ok(Self::Sphere),
            "cylinder" => Ok(Self::Cylinder),
            "box" => Ok(Self::Box),
            other => Err(ConfigError::InvalidValue {
                field: "primitive kind".into(),
                message: format!("unknown kind '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// A point at `p` in the attachment frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointShape {
    pub p: Point3<Scalar>,
}

/// An infinite line through `origin` along `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub direction: UnitVector3<Scalar>,
    pub origin: Point3<Scalar>,
}

/// The plane `normal · x = offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneShape {
    pub normal: UnitVector3<Scalar>,
    pub offset: Scalar,
}

/// A sphere of `radius` centered at `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereShape {
    pub center: Point3<Scalar>,
    pub radius: Scalar,
}

/// A cylinder whose axis starts at `origin` along `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderShape {
    pub direction: UnitVector3<Scalar>,
    pub origin: Point3<Scalar>,
    pub radius: Scalar,
    pub height: Scalar,
}

/// An oriented box with half-extent vector `extents / 2` about `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    pub center: Point3<Scalar>,
    /// Full edge lengths along the box's local axes.
    pub extents: Vector3<Scalar>,
    pub rotation: UnitQuaternion<Scalar>,
}

/// Tagged union over the supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveShape {
    Point(PointShape),
    Line(LineShape),
    Plane(PlaneShape),
    Sphere(SphereShape),
    Cylinder(CylinderShape),
    Box(BoxShape),
}

impl PrimitiveShape {
    /// Kind tag of this shape.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Point(_) => PrimitiveKind::Point,
            Self::Line(_) => PrimitiveKind::Line,
            Self::Plane(_) => PrimitiveKind::Plane,
            Self::Sphere(_) => PrimitiveKind::Sphere,
            Self::Cylinder(_) => PrimitiveKind::Cylinder,
            Self::Box(_) => PrimitiveKind::Box,
        }
    }

    /// Parse the flat parameter vector for `kind`.
    ///
    /// Arities: point 3, line 6 (direction, origin), plane 4 (normal,
    /// offset), sphere 4 (center, radius), cylinder 8 (direction,
    /// origin, radius, height), box 6 (center, extents) or 9 (plus
    /// roll-pitch-yaw).
    pub fn parse(kind: PrimitiveKind, params: &[Scalar]) -> Result<Self, ConfigError> {
        let arity_err = |expected: usize| ConfigError::WrongArity {
            what: kind.name(),
            expected,
            got: params.len(),
        };
        match kind {
            PrimitiveKind::Point => {
                if params.len() != 3 {
                    return Err(arity_err(3));
                }
                Ok(Self::Point(PointShape {
                    p: Point3::new(params[0], params[1], params[2]),
                }))
            }
            PrimitiveKind::Line => {
                if params.len() != 6 {
                    return Err(arity_err(6));
                }
                Ok(Self::Line(LineShape {
                    direction: unit(params[0], params[1], params[2], "line direction")?,
                    origin: Point3::new(params[3], params[4], params[5]),
                }))
            }
            PrimitiveKind::Plane => {
                if params.len() != 4 {
                    return Err(arity_err(4));
                }
                Ok(Self::Plane(PlaneShape {
                    normal: unit(params[0], params[1], params[2], "plane normal")?,
                    offset: params[3],
                }))
            }
            PrimitiveKind::Sphere => {
                if params.len() != 4 {
                    return Err(arity_err(4));
                }
                Ok(Self::Sphere(SphereShape {
                    center: Point3::new(params[0], params[1], params[2]),
                    radius: params[3],
                }))
            }
            PrimitiveKind::Cylinder => {
                if params.len() != 8 {
                    return Err(arity_err(8));
                }
                Ok(Self::Cylinder(CylinderShape {
                    direction: unit(params[0], params[1], params[2], "cylinder axis")?,
                    origin: Point3::new(params[3], params[4], params[5]),
                    radius: params[6],
                    height: params[7],
                }))
            }
            PrimitiveKind::Box => {
                if params.len() != 6 && params.len() != 9 {
                    return Err(arity_err(6));
                }
                let rotation = if params.len() == 9 {
                    UnitQuaternion::from_euler_angles(params[6], params[7], params[8])
                } else {
                    UnitQuaternion::identity()
                };
                Ok(Self::Box(BoxShape {
                    center: Point3::new(params[0], params[1], params[2]),
                    extents: Vector3::new(params[3], params[4], params[5]),
                    rotation,
                }))
            }
        }
    }

    /// Flatten back to the wire parameter vector.
    #[must_use]
    pub fn parameters(&self) -> Vec<Scalar> {
        match self {
            Self::Point(s) => vec![s.p.x, s.p.y, s.p.z],
            Self::Line(s) => vec![
                s.direction.x,
                s.direction.y,
                s.direction.z,
                s.origin.x,
                s.origin.y,
                s.origin.z,
            ],
            Self::Plane(s) => vec![s.normal.x, s.normal.y, s.normal.z, s.offset],
            Self::Sphere(s) => vec![s.center.x, s.center.y, s.center.z, s.radius],
            Self::Cylinder(s) => vec![
                s.direction.x,
                s.direction.y,
                s.direction.z,
                s.origin.x,
                s.origin.y,
                s.origin.z,
                s.radius,
                s.height,
            ],
            Self::Box(s) => {
                let (roll, pitch, yaw) = s.rotation.euler_angles();
                vec![
                    s.center.x, s.center.y, s.center.z, s.extents.x, s.extents.y, s.extents.z,
                    roll, pitch, yaw,
                ]
            }
        }
    }
}

fn unit(x: Scalar, y: Scalar, z: Scalar, what: &str) -> Result<UnitVector3<Scalar>, ConfigError> {
    let v = Vector3::new(x, y, z);
    if v.norm() < 1e-12 {
        return Err(ConfigError::InvalidValue {
            field: what.into(),
            message: "zero-length vector".into(),
        });
    }
    Ok(UnitVector3::new_normalize(v))
}

// ---------------------------------------------------------------------------
// Primitive and PrimitiveRecord
// ---------------------------------------------------------------------------

/// A named primitive attached to a frame of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub name: String,
    /// Segment name the shape is expressed in. Resolved against the
    /// tree at task init, not at insertion.
    pub frame_id: String,
    pub visible: bool,
    pub color: [Scalar; 4],
    pub shape: PrimitiveShape,
}

impl Primitive {
    /// Kind tag of the shape.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        self.shape.kind()
    }

    pub fn as_point(&self) -> Option<&PointShape> {
        match &self.shape {
            PrimitiveShape::Point(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineShape> {
        match &self.shape {
            PrimitiveShape::Line(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_plane(&self) -> Option<&PlaneShape> {
        match &self.shape {
            PrimitiveShape::Plane(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sphere(&self) -> Option<&SphereShape> {
        match &self.shape {
            PrimitiveShape::Sphere(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_cylinder(&self) -> Option<&CylinderShape> {
        match &self.shape {
            PrimitiveShape::Cylinder(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_box(&self) -> Option<&BoxShape> {
        match &self.shape {
            PrimitiveShape::Box(s) => Some(s),
            _ => None,
        }
    }

    /// Build from a wire record.
    pub fn from_record(record: &PrimitiveRecord) -> Result<Self, ConfigError> {
        Ok(Self {
            name: record.name.clone(),
            frame_id: record.frame_id.clone(),
            visible: record.visible,
            color: record.color,
            shape: PrimitiveShape::parse(record.kind, &record.parameters)?,
        })
    }

    /// Flatten to the wire record.
    #[must_use]
    pub fn to_record(&self) -> PrimitiveRecord {
        PrimitiveRecord {
            name: self.name.clone(),
            kind: self.kind(),
            frame_id: self.frame_id.clone(),
            visible: self.visible,
            color: self.color,
            parameters: self.shape.parameters(),
        }
    }
}

/// Wire/preload form of a primitive; what `set_primitive` carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveRecord {
    pub name: String,
    pub kind: PrimitiveKind,
    pub frame_id: String,
    pub visible: bool,
    pub color: [Scalar; 4],
    pub parameters: Vec<Scalar>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kind_names_roundtrip() {
        for kind in [
            PrimitiveKind::Point,
            PrimitiveKind::Line,
            PrimitiveKind::Plane,
            PrimitiveKind::Sphere,
            PrimitiveKind::Cylinder,
            PrimitiveKind::Box,
        ] {
            assert_eq!(PrimitiveKind::parse(kind.name()).unwrap(), kind);
        }
        assert!(PrimitiveKind::parse("cube").is_err());
    }

    #[test]
    fn parse_point() {
        let shape = PrimitiveShape::parse(PrimitiveKind::Point, &[0.1, 0.2, 0.3]).unwrap();
        let PrimitiveShape::Point(p) = &shape else {
            panic!("expected point");
        };
        assert_relative_eq!(p.p.x, 0.1);
        assert_eq!(shape.parameters(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn parse_point_wrong_arity() {
        let err = PrimitiveShape::parse(PrimitiveKind::Point, &[0.1]).unwrap_err();
        assert!(matches!(err, ConfigError::WrongArity { expected: 3, got: 1, .. }));
    }

    #[test]
    fn parse_line_normalizes_direction() {
        let shape =
            PrimitiveShape::parse(PrimitiveKind::Line, &[0.0, 0.0, 2.0, 1.0, 0.0, 0.0]).unwrap();
        let PrimitiveShape::Line(l) = &shape else {
            panic!("expected line");
        };
        assert_relative_eq!(l.direction.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(l.origin.x, 1.0);
    }

    #[test]
    fn parse_zero_direction_rejected() {
        let err =
            PrimitiveShape::parse(PrimitiveKind::Line, &[0.0; 6]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn parse_plane_and_sphere() {
        let plane =
            PrimitiveShape::parse(PrimitiveKind::Plane, &[0.0, 0.0, 1.0, 0.5]).unwrap();
        assert_eq!(plane.kind(), PrimitiveKind::Plane);
        let sphere =
            PrimitiveShape::parse(PrimitiveKind::Sphere, &[1.0, 2.0, 3.0, 0.25]).unwrap();
        assert_eq!(sphere.parameters(), vec![1.0, 2.0, 3.0, 0.25]);
    }

    #[test]
    fn parse_cylinder() {
        let shape = PrimitiveShape::parse(
            PrimitiveKind::Cylinder,
            &[0.0, 1.0, 0.0, 0.1, 0.2, 0.3, 0.05, 1.5],
        )
        .unwrap();
        let PrimitiveShape::Cylinder(c) = &shape else {
            panic!("expected cylinder");
        };
        assert_relative_eq!(c.radius, 0.05);
        assert_relative_eq!(c.height, 1.5);
    }

    #[test]
    fn parse_box_without_rotation() {
        let shape =
            PrimitiveShape::parse(PrimitiveKind::Box, &[0.0, 0.0, 1.0, 0.2, 0.4, 0.6]).unwrap();
        let PrimitiveShape::Box(b) = &shape else {
            panic!("expected box");
        };
        assert_eq!(b.rotation, UnitQuaternion::identity());
        // Flattening always includes the rpy triple.
        assert_eq!(shape.parameters().len(), 9);
    }

    #[test]
    fn parse_box_with_rotation_roundtrips() {
        let params = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.3, -0.2, 0.1];
        let shape = PrimitiveShape::parse(PrimitiveKind::Box, &params).unwrap();
        let back = shape.parameters();
        for (a, b) in params.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn record_roundtrip_through_json() {
        let record = PrimitiveRecord {
            name: "ee_point".into(),
            kind: PrimitiveKind::Point,
            frame_id: "ee".into(),
            visible: true,
            color: [1.0, 0.0, 0.0, 1.0],
            parameters: vec![0.0, 0.1, -0.2],
        };
        let primitive = Primitive::from_record(&record).unwrap();
        let back = primitive.to_record();
        assert_eq!(record, back);

        let json = serde_json::to_string(&back).unwrap();
        let reparsed: PrimitiveRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reparsed);
    }

    #[test]
    fn typed_accessors() {
        let record = PrimitiveRecord {
            name: "s".into(),
            kind: PrimitiveKind::Sphere,
            frame_id: "world".into(),
            visible: false,
            color: [0.0; 4],
            parameters: vec![0.0, 0.0, 0.0, 1.0],
        };
        let primitive = Primitive::from_record(&record).unwrap();
        assert!(primitive.as_sphere().is_some());
        assert!(primitive.as_point().is_none());
        assert!(primitive.as_box().is_none());
    }
}
