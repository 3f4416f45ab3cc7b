//! Task engine for the Strata controller.
//!
//! A task turns the robot state into `(e, J, row types)` plus a desired
//! error rate `ė*`. The function catalogue covers configuration-space
//! tasks (full pose, joint subsets, joint limits), geometric
//! projection and alignment between store primitives, and SDF-based
//! obstacle avoidance. The dynamics catalogue maps task values to
//! desired rates. [`Task`] composes one of each with priority and flag
//! metadata.

pub mod alignment;
pub mod avoid_sdf;
pub mod dynamics;
pub mod function;
pub mod full_pose;
pub mod joint_config;
pub mod joint_limits;
pub mod oracle;
pub mod projection;
pub mod task;

pub use dynamics::TaskDynamics;
pub use function::TaskFunction;
pub use oracle::{DistanceOracle, PointObstacleOracle};
pub use task::{Task, TaskInitError, TaskSpec};
