//! The task composite: function + dynamics + metadata.
//!
//! `Task::build` runs the five-step init sequence — function build,
//! function init, dynamics build, dynamics init, dimension check —
//! and reports which step failed with a stable negative status code.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use strata_core::{
    Scalar,
    error::{ConfigError, DimensionError, StrataError},
    types::RowType,
};
use strata_geom::PrimitiveStore;
use strata_kin::RobotState;

use crate::dynamics::TaskDynamics;
use crate::function::TaskFunction;
use crate::oracle::DistanceOracle;

// ---------------------------------------------------------------------------
// TaskSpec
// ---------------------------------------------------------------------------

/// Everything needed to build or upsert a task; the wire form of
/// `set_task`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    pub task_type: String,
    pub priority: u32,
    pub visible: bool,
    pub active: bool,
    pub monitored: bool,
    pub def_params: Vec<String>,
    /// `dyn_params[0]` is the dynamics type name; empty means
    /// `FirstOrder` with unit gain (or the forced `JntLimits` pairing
    /// for a joint-limit task).
    pub dyn_params: Vec<String>,
}

// ---------------------------------------------------------------------------
// TaskInitError
// ---------------------------------------------------------------------------

/// Which step of the init sequence failed.
#[derive(Debug, Error)]
pub enum TaskInitError {
    #[error("building task function: {0}")]
    FunctionBuild(#[source] StrataError),

    #[error("initializing task function: {0}")]
    FunctionInit(#[source] StrataError),

    #[error("building task dynamics: {0}")]
    DynamicsBuild(#[source] StrataError),

    #[error("initializing task dynamics: {0}")]
    DynamicsInit(#[source] StrataError),

    #[error("task dimension check: {0}")]
    Dimension(#[source] StrataError),
}

impl TaskInitError {
    /// Stable negative status code, 1–5 by init step.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::FunctionBuild(_) => -1,
            Self::FunctionInit(_) => -2,
            Self::DynamicsBuild(_) => -3,
            Self::DynamicsInit(_) => -4,
            Self::Dimension(_) => -5,
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A live task owned by the manager.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    priority: u32,
    visible: bool,
    active: bool,
    monitored: bool,
    function: TaskFunction,
    dynamics: TaskDynamics,
    e: DVector<Scalar>,
    j: DMatrix<Scalar>,
    e_dot_star: DVector<Scalar>,
    row_types: Vec<RowType>,
    performance_measures: Vec<Scalar>,
}

impl Task {
    /// Build a task from its spec against the current robot state.
    pub fn build(
        spec: &TaskSpec,
        state: &RobotState,
        store: &PrimitiveStore,
        n_controls: usize,
        oracle: Option<&Arc<dyn DistanceOracle>>,
    ) -> Result<Self, TaskInitError> {
        let mut function = TaskFunction::parse(&spec.task_type, &spec.def_params, oracle)
            .map_err(TaskInitError::FunctionBuild)?;

        function
            .init(state, store, n_controls)
            .map_err(TaskInitError::FunctionInit)?;

        let m = function.rows();
        let mut e = DVector::zeros(m);
        let mut j = DMatrix::zeros(m, n_controls);
        function
            .update(state, store, &mut e, &mut j)
            .map_err(TaskInitError::FunctionInit)?;
        let e_initial = e.clone();
        let e_final = function.final_state();

        let dyn_params = effective_dyn_params(spec, &function).map_err(TaskInitError::DynamicsBuild)?;
        let mut dynamics =
            TaskDynamics::parse(&dyn_params).map_err(TaskInitError::DynamicsBuild)?;
        check_pairing(&function, &dynamics).map_err(TaskInitError::DynamicsBuild)?;

        dynamics
            .init(state, &e_initial, &e_final)
            .map_err(TaskInitError::DynamicsInit)?;
        let mut e_dot_star = DVector::zeros(m);
        dynamics
            .update(state, &e, &j, &mut e_dot_star)
            .map_err(TaskInitError::DynamicsInit)?;

        let row_types = function.row_types().to_vec();
        if e.len() != j.nrows() || e.len() != e_dot_star.len() || e.len() != row_types.len() {
            return Err(TaskInitError::Dimension(
                DimensionError::RowMismatch {
                    e: e.len(),
                    j: j.nrows(),
                    e_dot: e_dot_star.len(),
                    types: row_types.len(),
                }
                .into(),
            ));
        }
        if j.ncols() != n_controls {
            return Err(TaskInitError::Dimension(
                DimensionError::ColumnMismatch {
                    expected: n_controls,
                    got: j.ncols(),
                }
                .into(),
            ));
        }

        Ok(Self {
            name: spec.name.clone(),
            priority: spec.priority,
            visible: spec.visible,
            active: spec.active,
            monitored: spec.monitored,
            function,
            dynamics,
            e,
            j,
            e_dot_star,
            row_types,
            performance_measures: Vec::new(),
        })
    }

    /// Refresh `(e, J)` and `ė*` for this tick. A transient failure
    /// leaves the buffers as they were; the caller skips the stage.
    pub fn update(
        &mut self,
        state: &RobotState,
        store: &PrimitiveStore,
    ) -> Result<(), StrataError> {
        self.function
            .update(state, store, &mut self.e, &mut self.j)?;
        self.dynamics
            .update(state, &self.e, &self.j, &mut self.e_dot_star)
    }

    /// Recompute the performance measures from the last task value.
    pub fn monitor(&mut self) {
        self.performance_measures = self.function.performance_measures(&self.e);
    }

    // -- Accessors --

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    #[must_use]
    pub const fn visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[must_use]
    pub const fn monitored(&self) -> bool {
        self.monitored
    }

    pub fn set_monitored(&mut self, monitored: bool) {
        self.monitored = monitored;
    }

    #[must_use]
    pub fn task_type(&self) -> &'static str {
        self.function.type_name()
    }

    #[must_use]
    pub fn value(&self) -> &DVector<Scalar> {
        &self.e
    }

    #[must_use]
    pub fn jacobian(&self) -> &DMatrix<Scalar> {
        &self.j
    }

    #[must_use]
    pub fn desired_rate(&self) -> &DVector<Scalar> {
        &self.e_dot_star
    }

    #[must_use]
    pub fn row_types(&self) -> &[RowType] {
        &self.row_types
    }

    #[must_use]
    pub fn performance_measures(&self) -> &[Scalar] {
        &self.performance_measures
    }

    /// Primitive names this task binds.
    #[must_use]
    pub fn bound_primitives(&self) -> Vec<&str> {
        self.function.bound_primitives()
    }
}

/// Dynamics parameters after defaulting rules: an explicit choice wins,
/// a joint-limit function forces `JntLimits`, everything else defaults
/// to first-order unit-gain decay.
fn effective_dyn_params(
    spec: &TaskSpec,
    function: &TaskFunction,
) -> Result<Vec<String>, StrataError> {
    if !spec.dyn_params.is_empty() {
        return Ok(spec.dyn_params.clone());
    }
    if let TaskFunction::JointLimits(limits) = function {
        return Ok(vec![
            "JntLimits".to_string(),
            limits.dq_max.to_string(),
            "1.0".to_string(),
        ]);
    }
    Ok(vec!["FirstOrder".to_string(), "1.0".to_string()])
}

/// The joint-limit function and the `JntLimits` dynamics only work as
/// a pair.
fn check_pairing(function: &TaskFunction, dynamics: &TaskDynamics) -> Result<(), StrataError> {
    let limits_function = matches!(function, TaskFunction::JointLimits(_));
    let limits_dynamics = matches!(dynamics, TaskDynamics::JntLimits(_));
    if limits_function != limits_dynamics {
        return Err(ConfigError::InvalidValue {
            field: "dyn_params".into(),
            message: format!(
                "{} cannot drive {}; JointLimits pairs with JntLimits only",
                dynamics.type_name(),
                function.type_name()
            ),
        }
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
