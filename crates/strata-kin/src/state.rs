//! Per-tick robot state snapshot.

use std::sync::Arc;

use nalgebra::DVector;

use strata_core::{Scalar, error::DimensionError, time::CtrlTime};

use crate::tree::KinematicTree;

/// Immutable snapshot of the robot handed to the controller each tick.
///
/// The tree is shared; positions and velocities are indexed by the
/// tree's `q_nr` numbering.
#[derive(Debug, Clone)]
pub struct RobotState {
    /// Tick timestamp.
    pub t: CtrlTime,
    /// The kinematic tree frames resolve against.
    pub tree: Arc<KinematicTree>,
    /// Joint positions, indexed by `q_nr`.
    pub q: DVector<Scalar>,
    /// Joint velocities, same indexing.
    pub qdot: DVector<Scalar>,
}

impl RobotState {
    /// Build a state snapshot, checking the size invariant
    /// `q.len() == qdot.len() == tree.n_joints()`.
    pub fn new(
        t: CtrlTime,
        tree: Arc<KinematicTree>,
        q: DVector<Scalar>,
        qdot: DVector<Scalar>,
    ) -> Result<Self, DimensionError> {
        if q.len() != tree.n_joints() || qdot.len() != tree.n_joints() {
            return Err(DimensionError::StateSize {
                q: q.len(),
                qdot: qdot.len(),
                dof: tree.n_joints(),
            });
        }
        Ok(Self { t, tree, q, qdot })
    }

    /// A state at time zero with all joints at rest in the zero pose.
    #[must_use]
    pub fn zeros(tree: Arc<KinematicTree>) -> Self {
        let n = tree.n_joints();
        Self {
            t: CtrlTime::new(),
            tree,
            q: DVector::zeros(n),
            qdot: DVector::zeros(n),
        }
    }

    /// Number of moving joints.
    #[must_use]
    pub fn n_joints(&self) -> usize {
        self.tree.n_joints()
    }
}
