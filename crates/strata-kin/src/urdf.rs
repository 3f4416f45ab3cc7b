//! URDF loading via `urdf-rs`.
//!
//! Converts a URDF robot description into a [`KinematicTree`]. Only the
//! kinematic skeleton is kept: link frames, joint origins, axes and
//! kinds. Inertials, visuals and collision geometry are ignored — the
//! controller's geometry lives in the primitive store instead.

use std::collections::HashMap;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use strata_core::error::ConfigError;

use crate::tree::{JointKind, KinematicTree, Segment, TreeJoint, tree_from_parts};

/// Parse a URDF XML string into a [`KinematicTree`].
///
/// Moving joints are numbered `0..n` in their URDF declaration order;
/// `q`/`qdot` indices follow that numbering. Floating, planar and
/// spherical joints are not representable and fail with a
/// [`ConfigError`].
pub fn from_urdf_str(xml: &str) -> Result<KinematicTree, ConfigError> {
    let robot = urdf_rs::read_from_string(xml)
        .map_err(|e| ConfigError::RobotDescription(e.to_string()))?;

    // Dense q_nr numbering over moving joints, in declaration order.
    let mut q_nr_map: HashMap<&str, usize> = HashMap::new();
    for joint in &robot.joints {
        if convert_kind(&joint.joint_type)?.is_moving() {
            let next = q_nr_map.len();
            q_nr_map.insert(joint.name.as_str(), next);
        }
    }

    // Root link: the one that is never a child of any joint.
    let child_links: Vec<&str> = robot.joints.iter().map(|j| j.child.link.as_str()).collect();
    let root_link = robot
        .links
        .iter()
        .map(|l| l.name.as_str())
        .find(|name| !child_links.contains(name))
        .ok_or_else(|| ConfigError::RobotDescription("no root link found".into()))?;

    // Joints grouped by parent link, declaration order preserved.
    let mut by_parent: HashMap<&str, Vec<&urdf_rs::Joint>> = HashMap::new();
    for joint in &robot.joints {
        by_parent
            .entry(joint.parent.link.as_str())
            .or_default()
            .push(joint);
    }

    let mut segments = vec![Segment {
        name: root_link.to_string(),
        parent: None,
        joint: None,
    }];

    // Depth-first expansion from the root keeps parents ahead of children.
    let mut stack = vec![(root_link, 0usize)];
    while let Some((link, parent_idx)) = stack.pop() {
        for joint in by_parent.get(link).into_iter().flatten() {
            let kind = convert_kind(&joint.joint_type)?;
            let idx = segments.len();
            segments.push(Segment {
                name: joint.child.link.clone(),
                parent: Some(parent_idx),
                joint: Some(TreeJoint {
                    name: joint.name.clone(),
                    kind,
                    axis: convert_axis(&joint.axis.xyz),
                    origin: convert_origin(&joint.origin),
                    q_nr: q_nr_map.get(joint.name.as_str()).copied(),
                }),
            });
            stack.push((joint.child.link.as_str(), idx));
        }
    }

    if segments.len() != robot.links.len() {
        return Err(ConfigError::RobotDescription(format!(
            "{} of {} links are not connected to the root",
            robot.links.len() - segments.len(),
            robot.links.len()
        )));
    }

    Ok(tree_from_parts(segments, q_nr_map.len()))
}

fn convert_kind(kind: &urdf_rs::JointType) -> Result<JointKind, ConfigError> {
    match kind {
        urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => Ok(JointKind::Revolute),
        urdf_rs::JointType::Prismatic => Ok(JointKind::Prismatic),
        urdf_rs::JointType::Fixed => Ok(JointKind::Fixed),
        other => Err(ConfigError::RobotDescription(format!(
            "unsupported joint type {other:?}"
        ))),
    }
}

fn convert_axis(xyz: &[f64; 3]) -> UnitVector3<f64> {
    UnitVector3::new_normalize(Vector3::new(xyz[0], xyz[1], xyz[2]))
}

fn convert_origin(pose: &urdf_rs::Pose) -> Isometry3<f64> {
    let xyz: &[f64; 3] = &pose.xyz;
    let rpy: &[f64; 3] = &pose.rpy;
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
