use thiserror::Error;

/// Top-level error type for the Strata controller.
#[derive(Debug, Error)]
pub enum StrataError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("dimension error: {0}")]
    Dimension(#[from] DimensionError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Malformed parameters, unknown type names, wrong arity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown task function type '{0}'")]
    UnknownTaskType(String),

    #[error("unknown task dynamics type '{0}'")]
    UnknownDynamicsType(String),

    #[error("{what} requires {expected} parameters, got {got}")]
    WrongArity {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("could not parse '{text}' as a number for {what}")]
    BadNumber { what: &'static str, text: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("robot description: {0}")]
    RobotDescription(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A name failed to resolve against the live tree, store or task map.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("no geometric primitive named '{0}'")]
    UnknownPrimitive(String),

    #[error("primitive '{name}' is a {found}, expected a {expected}")]
    PrimitiveKindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("frame '{0}' is not a segment of the kinematic tree")]
    FrameNotInTree(String),

    #[error("no joint named '{0}' in the kinematic tree")]
    UnknownJoint(String),

    #[error("no task named '{0}'")]
    UnknownTask(String),

    #[error("{op} is not defined for primitive pair ({a}, {b})")]
    UnsupportedPair {
        op: &'static str,
        a: String,
        b: String,
    },

    #[error("primitive '{0}' is not attached to the manipulator")]
    NotOnManipulator(String),
}

/// Post-init rank/size invariants violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DimensionError {
    #[error("task rows disagree: e has {e}, J has {j}, e-dot-star has {e_dot}, {types} row types")]
    RowMismatch {
        e: usize,
        j: usize,
        e_dot: usize,
        types: usize,
    },

    #[error("Jacobian has {got} columns, expected {expected} controls")]
    ColumnMismatch { expected: usize, got: usize },

    #[error("robot state has {q} positions and {qdot} velocities for {dof} joints")]
    StateSize { q: usize, qdot: usize, dof: usize },
}

/// An external dependency (e.g. the SDF map) is temporarily unavailable.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("distance oracle unavailable: {0}")]
    Unavailable(String),

    #[error("distance oracle returned an invalid gradient for query point {0}")]
    InvalidGradient(usize),
}

/// The hierarchical QP could not produce a usable command.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("highest priority level {priority} is infeasible (residual {residual:.3e})")]
    Infeasible { priority: u32, residual: f64 },

    #[error("QP back end failed: {0}")]
    Backend(String),

    #[error("solve called with no stages")]
    NoStages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strata_error_from_config() {
        let err = ConfigError::UnknownTaskType("FulPose".into());
        let top: StrataError = err.into();
        assert!(matches!(top, StrataError::Config(_)));
        assert!(top.to_string().contains("FulPose"));
    }

    #[test]
    fn strata_error_from_binding() {
        let err = BindingError::UnknownPrimitive("ee_point".into());
        let top: StrataError = err.into();
        assert!(matches!(top, StrataError::Binding(_)));
        assert!(top.to_string().contains("ee_point"));
    }

    #[test]
    fn strata_error_from_solver() {
        let err = SolverError::Infeasible {
            priority: 1,
            residual: 0.5,
        };
        let top: StrataError = err.into();
        assert!(matches!(top, StrataError::Solver(_)));
    }

    #[test]
    fn config_error_display_messages() {
        assert_eq!(
            ConfigError::WrongArity {
                what: "FullPose",
                expected: 6,
                got: 2
            }
            .to_string(),
            "FullPose requires 6 parameters, got 2"
        );
        assert_eq!(
            ConfigError::BadNumber {
                what: "lambda",
                text: "fast".into()
            }
            .to_string(),
            "could not parse 'fast' as a number for lambda"
        );
        assert_eq!(
            ConfigError::MissingField("joints".into()).to_string(),
            "missing required field: joints"
        );
    }

    #[test]
    fn binding_error_display_messages() {
        assert_eq!(
            BindingError::PrimitiveKindMismatch {
                name: "p".into(),
                expected: "point",
                found: "sphere"
            }
            .to_string(),
            "primitive 'p' is a sphere, expected a point"
        );
        assert_eq!(
            BindingError::FrameNotInTree("gripper".into()).to_string(),
            "frame 'gripper' is not a segment of the kinematic tree"
        );
        assert_eq!(
            BindingError::UnsupportedPair {
                op: "projection",
                a: "line".into(),
                b: "box".into()
            }
            .to_string(),
            "projection is not defined for primitive pair (line, box)"
        );
    }

    #[test]
    fn dimension_error_is_copy() {
        let err = DimensionError::ColumnMismatch {
            expected: 7,
            got: 6,
        };
        let err2 = err;
        assert_eq!(err, err2);
    }

    #[test]
    fn solver_error_display_messages() {
        let err = SolverError::Infeasible {
            priority: 1,
            residual: 1.25e-2,
        };
        assert_eq!(
            err.to_string(),
            "highest priority level 1 is infeasible (residual 1.250e-2)"
        );
        assert_eq!(
            SolverError::NoStages.to_string(),
            "solve called with no stages"
        );
    }
}
