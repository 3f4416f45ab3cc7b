//! Kinematic tree model for the Strata controller.
//!
//! Provides the tree of named segments and joints that task functions
//! resolve frames against, forward kinematics, frame Jacobians with
//! reference-point shift, URDF loading, and the pseudoinverse /
//! damped-least-squares utilities used by the solver tests.

pub mod math;
pub mod state;
pub mod tree;
pub mod urdf;

pub use math::{dls, pinv};
pub use state::RobotState;
pub use tree::{JointKind, KinematicTree, Segment, TreeBuilder, TreeJoint};
pub use urdf::from_urdf_str;
