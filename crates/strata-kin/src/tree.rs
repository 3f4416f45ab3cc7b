//! Kinematic tree: named segments connected by revolute, prismatic or
//! fixed joints.
//!
//! Each segment's frame is reached from its parent by the joint's
//! static origin transform followed by the joint motion. Moving joints
//! carry a dense `q_nr` index into the position/velocity vectors;
//! the indices are stable for the life of the tree.

use std::collections::HashMap;

use nalgebra::{
    DMatrix, DVector, Isometry3, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3,
};

use strata_core::Scalar;
use strata_core::error::BindingError;

// ---------------------------------------------------------------------------
// Joints and segments
// ---------------------------------------------------------------------------

/// Kind of motion a joint allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKind {
    /// Rotation about `axis`.
    Revolute,
    /// Translation along `axis`.
    Prismatic,
    /// No relative motion.
    Fixed,
}

impl JointKind {
    /// Whether this joint contributes a degree of freedom.
    #[must_use]
    pub const fn is_moving(self) -> bool {
        !matches!(self, Self::Fixed)
    }
}

/// The joint connecting a segment to its parent.
#[derive(Debug, Clone)]
pub struct TreeJoint {
    /// Joint name (unique among joints).
    pub name: String,
    pub kind: JointKind,
    /// Motion axis in the joint's local frame. Ignored for fixed joints.
    pub axis: UnitVector3<Scalar>,
    /// Static transform from the parent segment frame to this joint frame.
    pub origin: Isometry3<Scalar>,
    /// Index into `q`/`qdot` for moving joints, `None` for fixed ones.
    pub q_nr: Option<usize>,
}

/// A named frame in the tree.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment (frame) name, unique in the tree.
    pub name: String,
    /// Index of the parent segment; `None` for the root.
    pub parent: Option<usize>,
    /// Joint connecting this segment to its parent; `None` for the root.
    pub joint: Option<TreeJoint>,
}

// ---------------------------------------------------------------------------
// KinematicTree
// ---------------------------------------------------------------------------

/// A kinematic tree with stable name and `q_nr` lookups.
#[derive(Debug, Clone)]
pub struct KinematicTree {
    segments: Vec<Segment>,
    segment_index: HashMap<String, usize>,
    n_joints: usize,
}

impl KinematicTree {
    /// Number of moving joints (the length of `q` and `qdot`).
    #[must_use]
    pub const fn n_joints(&self) -> usize {
        self.n_joints
    }

    /// All segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Index of the segment named `name`.
    #[must_use]
    pub fn segment_index(&self, name: &str) -> Option<usize> {
        self.segment_index.get(name).copied()
    }

    /// Resolve a frame name, yielding a [`BindingError`] on failure.
    pub fn resolve_frame(&self, name: &str) -> Result<usize, BindingError> {
        self.segment_index(name)
            .ok_or_else(|| BindingError::FrameNotInTree(name.to_string()))
    }

    /// Look up a joint by name.
    #[must_use]
    pub fn joint(&self, name: &str) -> Option<&TreeJoint> {
        self.segments
            .iter()
            .filter_map(|s| s.joint.as_ref())
            .find(|j| j.name == name)
    }

    /// `q_nr` of the named joint, or a [`BindingError`] if the joint is
    /// unknown or fixed.
    pub fn q_nr_of_joint(&self, name: &str) -> Result<usize, BindingError> {
        self.joint(name)
            .and_then(|j| j.q_nr)
            .ok_or_else(|| BindingError::UnknownJoint(name.to_string()))
    }

    /// `q_nr` of the nearest moving joint on the root path of `segment`.
    ///
    /// `None` means the segment is rigidly attached to the root (e.g. a
    /// world-fixed obstacle frame).
    #[must_use]
    pub fn q_nr_of_segment(&self, segment: usize) -> Option<usize> {
        let mut current = Some(segment);
        while let Some(i) = current {
            let seg = &self.segments[i];
            if let Some(joint) = &seg.joint {
                if let Some(q_nr) = joint.q_nr {
                    return Some(q_nr);
                }
            }
            current = seg.parent;
        }
        None
    }

    /// Segment indices from the root down to `segment`, inclusive.
    fn root_path(&self, segment: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = Some(segment);
        while let Some(i) = current {
            path.push(i);
            current = self.segments[i].parent;
        }
        path.reverse();
        path
    }

    /// Pose of `segment`'s frame in the root frame at configuration `q`.
    ///
    /// # Panics
    ///
    /// Panics if `q.len() != self.n_joints()` or `segment` is out of
    /// bounds.
    #[must_use]
    pub fn segment_pose(&self, q: &DVector<Scalar>, segment: usize) -> Isometry3<Scalar> {
        assert_eq!(q.len(), self.n_joints, "q.len() must equal n_joints");

        let mut transform = Isometry3::identity();
        for i in self.root_path(segment) {
            if let Some(joint) = &self.segments[i].joint {
                transform *= joint.origin;
                if let Some(q_nr) = joint.q_nr {
                    transform *= joint_transform(&joint.axis, joint.kind, q[q_nr]);
                }
            }
        }
        transform
    }

    /// Geometric Jacobian of a point rigidly attached to `segment`.
    ///
    /// Returns the world position of the attachment point and writes the
    /// 6×n Jacobian into `jac`: rows 0–2 are the linear velocity of the
    /// point, rows 3–5 the angular velocity of the frame. Columns of
    /// joints not on the root path are zero.
    ///
    /// # Panics
    ///
    /// Panics if `jac` is not 6×n or `q.len() != n_joints`.
    pub fn frame_jacobian_into(
        &self,
        q: &DVector<Scalar>,
        segment: usize,
        point_in_frame: &Point3<Scalar>,
        jac: &mut DMatrix<Scalar>,
    ) -> Point3<Scalar> {
        assert_eq!(q.len(), self.n_joints);
        assert_eq!(jac.nrows(), 6);
        assert_eq!(jac.ncols(), self.n_joints);
        jac.fill(0.0);

        // First pass: accumulate the pose, recording each moving joint's
        // world axis and origin just before its own motion is applied.
        let mut transform = Isometry3::identity();
        let mut columns: Vec<(usize, Vector3<Scalar>, Vector3<Scalar>, JointKind)> = Vec::new();
        for i in self.root_path(segment) {
            if let Some(joint) = &self.segments[i].joint {
                transform *= joint.origin;
                if let Some(q_nr) = joint.q_nr {
                    let axis_w = transform.rotation * joint.axis.into_inner();
                    let origin_w = transform.translation.vector;
                    columns.push((q_nr, axis_w, origin_w, joint.kind));
                    transform *= joint_transform(&joint.axis, joint.kind, q[q_nr]);
                }
            }
        }
        let point_w = transform * point_in_frame;

        for (q_nr, axis_w, origin_w, kind) in columns {
            match kind {
                JointKind::Revolute => {
                    let lever = point_w.coords - origin_w;
                    let lin = axis_w.cross(&lever);
                    jac[(0, q_nr)] = lin.x;
                    jac[(1, q_nr)] = lin.y;
                    jac[(2, q_nr)] = lin.z;
                    jac[(3, q_nr)] = axis_w.x;
                    jac[(4, q_nr)] = axis_w.y;
                    jac[(5, q_nr)] = axis_w.z;
                }
                JointKind::Prismatic => {
                    jac[(0, q_nr)] = axis_w.x;
                    jac[(1, q_nr)] = axis_w.y;
                    jac[(2, q_nr)] = axis_w.z;
                }
                JointKind::Fixed => {}
            }
        }
        point_w
    }

    /// Allocating convenience wrapper around
    /// [`frame_jacobian_into`](Self::frame_jacobian_into).
    #[must_use]
    pub fn frame_jacobian(
        &self,
        q: &DVector<Scalar>,
        segment: usize,
        point_in_frame: &Point3<Scalar>,
    ) -> (Point3<Scalar>, DMatrix<Scalar>) {
        let mut jac = DMatrix::zeros(6, self.n_joints);
        let point_w = self.frame_jacobian_into(q, segment, point_in_frame, &mut jac);
        (point_w, jac)
    }
}

/// Transform contributed by a single joint at position `position`.
fn joint_transform(
    axis: &UnitVector3<Scalar>,
    kind: JointKind,
    position: Scalar,
) -> Isometry3<Scalar> {
    match kind {
        JointKind::Revolute => Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(axis, position),
        ),
        JointKind::Prismatic => Isometry3::from_parts(
            Translation3::from(axis.into_inner() * position),
            UnitQuaternion::identity(),
        ),
        JointKind::Fixed => Isometry3::identity(),
    }
}

// ---------------------------------------------------------------------------
// TreeBuilder
// ---------------------------------------------------------------------------

/// Programmatic tree construction, mostly for tests and synthetic rigs.
///
/// Moving joints are numbered in insertion order.
#[derive(Debug)]
pub struct TreeBuilder {
    segments: Vec<Segment>,
    segment_index: HashMap<String, usize>,
    n_joints: usize,
}

impl TreeBuilder {
    /// Start a tree whose root frame is named `root`.
    #[must_use]
    pub fn new(root: &str) -> Self {
        let mut segment_index = HashMap::new();
        segment_index.insert(root.to_string(), 0);
        Self {
            segments: vec![Segment {
                name: root.to_string(),
                parent: None,
                joint: None,
            }],
            segment_index,
            n_joints: 0,
        }
    }

    fn push(
        &mut self,
        joint_name: &str,
        child: &str,
        parent: &str,
        kind: JointKind,
        axis: Vector3<Scalar>,
        origin_xyz: [Scalar; 3],
    ) -> &mut Self {
        let parent_idx = *self
            .segment_index
            .get(parent)
            .unwrap_or_else(|| panic!("unknown parent segment '{parent}'"));
        let q_nr = kind.is_moving().then(|| {
            let n = self.n_joints;
            self.n_joints += 1;
            n
        });
        let idx = self.segments.len();
        self.segments.push(Segment {
            name: child.to_string(),
            parent: Some(parent_idx),
            joint: Some(TreeJoint {
                name: joint_name.to_string(),
                kind,
                axis: UnitVector3::new_normalize(axis),
                origin: Isometry3::from_parts(
                    Translation3::new(origin_xyz[0], origin_xyz[1], origin_xyz[2]),
                    UnitQuaternion::identity(),
                ),
                q_nr,
            }),
        });
        assert!(
            self.segment_index.insert(child.to_string(), idx).is_none(),
            "duplicate segment name '{child}'"
        );
        self
    }

    /// Add a revolute joint `joint_name` from `parent` to a new segment
    /// `child`.
    pub fn revolute(
        &mut self,
        joint_name: &str,
        child: &str,
        parent: &str,
        axis: Vector3<Scalar>,
        origin_xyz: [Scalar; 3],
    ) -> &mut Self {
        self.push(joint_name, child, parent, JointKind::Revolute, axis, origin_xyz)
    }

    /// Add a prismatic joint.
    pub fn prismatic(
        &mut self,
        joint_name: &str,
        child: &str,
        parent: &str,
        axis: Vector3<Scalar>,
        origin_xyz: [Scalar; 3],
    ) -> &mut Self {
        self.push(joint_name, child, parent, JointKind::Prismatic, axis, origin_xyz)
    }

    /// Add a fixed joint.
    pub fn fixed(
        &mut self,
        joint_name: &str,
        child: &str,
        parent: &str,
        origin_xyz: [Scalar; 3],
    ) -> &mut Self {
        self.push(
            joint_name,
            child,
            parent,
            JointKind::Fixed,
            Vector3::z(),
            origin_xyz,
        )
    }

    /// Finish the tree.
    #[must_use]
    pub fn build(&mut self) -> KinematicTree {
        KinematicTree {
            segments: std::mem::take(&mut self.segments),
            segment_index: std::mem::take(&mut self.segment_index),
            n_joints: self.n_joints,
        }
    }
}

/// Assemble a tree from already-validated parts. Used by the URDF loader.
pub(crate) fn tree_from_parts(segments: Vec<Segment>, n_joints: usize) -> KinematicTree {
    let segment_index = segments
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.clone(), i))
        .collect();
    KinematicTree {
        segments,
        segment_index,
        n_joints,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
