// strata-core: scalar alias, clock, error taxonomy and configuration
// for the Strata hierarchical task-priority controller.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

/// Scalar type used throughout the controller.
///
/// Task Jacobians are chained through several frames and then handed to
/// a QP back end; `f64` keeps the conditioning headroom.
pub type Scalar = f64;

pub mod prelude {
    pub use crate::{
        Scalar,
        config::{ControllerConfig, JointLimitEntry, MonitoringConfig, PrimitiveEntry, TaskEntry},
        error::{
            BindingError, ConfigError, DimensionError, OracleError, SolverError, StrataError,
        },
        time::CtrlTime,
        types::RowType,
    };
}
