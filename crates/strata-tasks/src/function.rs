//! Task function dispatch.
//!
//! One tagged enum over the function catalogue instead of a class
//! hierarchy: the set of kinds is closed and small, and pair dispatch
//! for the geometric tasks happens inside the variants.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use strata_core::{Scalar, error::{ConfigError, StrataError}, types::RowType};
use strata_geom::PrimitiveStore;
use strata_kin::RobotState;

use crate::alignment::Alignment;
use crate::avoid_sdf::AvoidCollisionsSdf;
use crate::full_pose::FullPose;
use crate::joint_config::JointConfiguration;
use crate::joint_limits::JointLimits;
use crate::oracle::DistanceOracle;
use crate::projection::Projection;

/// Tagged union over the task function catalogue.
#[derive(Debug, Clone)]
pub enum TaskFunction {
    FullPose(FullPose),
    JointConfiguration(JointConfiguration),
    JointLimits(JointLimits),
    GeometricProjection(Projection),
    GeometricAlignment(Alignment),
    AvoidCollisionsSdf(AvoidCollisionsSdf),
}

impl TaskFunction {
    /// Build a function from its wire type name and `def_params`.
    pub fn parse(
        task_type: &str,
        def_params: &[String],
        oracle: Option<&Arc<dyn DistanceOracle>>,
    ) -> Result<Self, StrataError> {
        match task_type {
            "FullPose" => Ok(Self::FullPose(FullPose::parse(def_params)?)),
            "JointConfiguration" => Ok(Self::JointConfiguration(JointConfiguration::parse(
                def_params,
            )?)),
            "JointLimits" => Ok(Self::JointLimits(JointLimits::parse(def_params)?)),
            "GeometricProjection" => {
                Ok(Self::GeometricProjection(Projection::parse(def_params)?))
            }
            "GeometricAlignment" => Ok(Self::GeometricAlignment(Alignment::parse(def_params)?)),
            "AvoidCollisionsSDF" => Ok(Self::AvoidCollisionsSdf(AvoidCollisionsSdf::parse(
                def_params, oracle,
            )?)),
            other => Err(ConfigError::UnknownTaskType(other.to_string()).into()),
        }
    }

    /// Wire name of this function.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::FullPose(_) => "FullPose",
            Self::JointConfiguration(_) => "JointConfiguration",
            Self::JointLimits(_) => "JointLimits",
            Self::GeometricProjection(_) => "GeometricProjection",
            Self::GeometricAlignment(_) => "GeometricAlignment",
            Self::AvoidCollisionsSdf(_) => "AvoidCollisionsSDF",
        }
    }

    /// Resolve bindings and latch the row count.
    pub fn init(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        n_controls: usize,
    ) -> Result<(), StrataError> {
        match self {
            Self::FullPose(f) => f.init(state, n_controls),
            Self::JointConfiguration(f) => f.init(state, n_controls),
            Self::JointLimits(f) => f.init(state, n_controls),
            Self::GeometricProjection(f) => f.init(state, store, n_controls),
            Self::GeometricAlignment(f) => f.init(state, store, n_controls),
            Self::AvoidCollisionsSdf(f) => f.init(state, store, n_controls),
        }
    }

    /// Row count, constant after init.
    #[must_use]
    pub fn rows(&self) -> usize {
        match self {
            Self::FullPose(f) => f.rows(),
            Self::JointConfiguration(f) => f.rows(),
            Self::JointLimits(f) => f.rows(),
            Self::GeometricProjection(f) => f.rows(),
            Self::GeometricAlignment(f) => f.rows(),
            Self::AvoidCollisionsSdf(f) => f.rows(),
        }
    }

    /// Constraint sense per row, constant after init.
    #[must_use]
    pub fn row_types(&self) -> &[RowType] {
        match self {
            Self::FullPose(f) => f.row_types(),
            Self::JointConfiguration(f) => f.row_types(),
            Self::JointLimits(f) => f.row_types(),
            Self::GeometricProjection(f) => f.row_types(),
            Self::GeometricAlignment(f) => f.row_types(),
            Self::AvoidCollisionsSdf(f) => f.row_types(),
        }
    }

    /// Refresh `e` and `J` from the robot state.
    pub fn update(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
        e: &mut DVector<Scalar>,
        j: &mut DMatrix<Scalar>,
    ) -> Result<(), StrataError> {
        match self {
            Self::FullPose(f) => f.update(state, store, e, j),
            Self::JointConfiguration(f) => f.update(state, store, e, j),
            Self::JointLimits(f) => f.update(state, store, e, j),
            Self::GeometricProjection(f) => f.update(state, store, e, j),
            Self::GeometricAlignment(f) => f.update(state, store, e, j),
            Self::AvoidCollisionsSdf(f) => f.update(state, store, e, j),
        }
    }

    /// Task value once the goal is reached.
    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        match self {
            Self::FullPose(f) => f.final_state(),
            Self::JointConfiguration(f) => f.final_state(),
            Self::JointLimits(f) => f.final_state(),
            Self::GeometricProjection(f) => f.final_state(),
            Self::GeometricAlignment(f) => f.final_state(),
            Self::AvoidCollisionsSdf(f) => f.final_state(),
        }
    }

    /// Primitive names this function binds, for dependency tracking.
    #[must_use]
    pub fn bound_primitives(&self) -> Vec<&str> {
        match self {
            Self::GeometricProjection(f) => f.bound_primitives(),
            Self::GeometricAlignment(f) => f.bound_primitives(),
            Self::AvoidCollisionsSdf(f) => f.bound_primitives(),
            _ => Vec::new(),
        }
    }

    /// Task-defined summary scalars for monitoring.
    #[must_use]
    pub fn performance_measures(&self, e: &DVector<Scalar>) -> Vec<Scalar> {
        match self {
            Self::FullPose(_) | Self::JointConfiguration(_) | Self::GeometricProjection(_) => {
                vec![e.norm()]
            }
            Self::GeometricAlignment(f) => vec![f.angle_from_error(e[0])],
            Self::JointLimits(_) | Self::AvoidCollisionsSdf(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parse_dispatches_on_type_name() {
        let f = TaskFunction::parse("FullPose", &params(&["0.0", "0.0"]), None).unwrap();
        assert_eq!(f.type_name(), "FullPose");
        let f = TaskFunction::parse(
            "GeometricProjection",
            &params(&["point", "plane", "a = b"]),
            None,
        )
        .unwrap();
        assert_eq!(f.type_name(), "GeometricProjection");
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = TaskFunction::parse("FulPose", &params(&["0.0"]), None).unwrap_err();
        assert!(err.to_string().contains("FulPose"));
    }
}
