//! Task dynamics: strategies producing the desired error rate `ė*`.

use nalgebra::{DMatrix, DVector};

use strata_core::{
    Scalar,
    error::{ConfigError, DimensionError, StrataError},
    time::CtrlTime,
};
use strata_kin::RobotState;

// ---------------------------------------------------------------------------
// Concrete dynamics
// ---------------------------------------------------------------------------

/// Exponential decay `ė* = −λ·e`.
#[derive(Debug, Clone)]
pub struct FirstOrder {
    pub lambda: Scalar,
}

/// Minimal-jerk rate profile from `e_initial` to zero over a horizon,
/// then first-order decay for station keeping.
#[derive(Debug, Clone)]
pub struct MinimalJerk {
    pub horizon: Scalar,
    pub lambda: Scalar,
    start: CtrlTime,
    e_initial: DVector<Scalar>,
}

/// Paired with the 4-row joint-limits function: rows 0/1 are hard
/// velocity caps, rows 2/3 push back from the position limits.
#[derive(Debug, Clone)]
pub struct JntLimits {
    pub dq_max: Scalar,
    pub gain: Scalar,
}

/// Tagged union over the dynamics catalogue.
#[derive(Debug, Clone)]
pub enum TaskDynamics {
    FirstOrder(FirstOrder),
    MinimalJerk(MinimalJerk),
    JntLimits(JntLimits),
}

impl TaskDynamics {
    /// Parse `dyn_params`; the first element is the dynamics type name,
    /// the rest its numeric parameters.
    pub fn parse(dyn_params: &[String]) -> Result<Self, StrataError> {
        let kind = dyn_params
            .first()
            .ok_or_else(|| ConfigError::MissingField("dyn_params[0]".into()))?;
        match kind.as_str() {
            "FirstOrder" => {
                expect_arity("FirstOrder", dyn_params, 2)?;
                Ok(Self::FirstOrder(FirstOrder {
                    lambda: number("lambda", &dyn_params[1])?,
                }))
            }
            "MinimalJerk" => {
                expect_arity("MinimalJerk", dyn_params, 3)?;
                Ok(Self::MinimalJerk(MinimalJerk {
                    horizon: number("horizon", &dyn_params[1])?,
                    lambda: number("lambda", &dyn_params[2])?,
                    start: CtrlTime::new(),
                    e_initial: DVector::zeros(0),
                }))
            }
            "JntLimits" => {
                expect_arity("JntLimits", dyn_params, 3)?;
                Ok(Self::JntLimits(JntLimits {
                    dq_max: number("dq_max", &dyn_params[1])?,
                    gain: number("gain", &dyn_params[2])?,
                }))
            }
            other => Err(ConfigError::UnknownDynamicsType(other.to_string()).into()),
        }
    }

    /// Wire name of this dynamics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::FirstOrder(_) => "FirstOrder",
            Self::MinimalJerk(_) => "MinimalJerk",
            Self::JntLimits(_) => "JntLimits",
        }
    }

    /// Latch initial/final task values and the start time.
    pub fn init(
        &mut self,
        state: &RobotState,
        e_initial: &DVector<Scalar>,
        _e_final: &DVector<Scalar>,
    ) -> Result<(), StrataError> {
        match self {
            Self::FirstOrder(_) => Ok(()),
            Self::MinimalJerk(d) => {
                if d.horizon <= 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "horizon".into(),
                        message: format!("must be positive, got {}", d.horizon),
                    }
                    .into());
                }
                d.start = state.t;
                d.e_initial = e_initial.clone();
                Ok(())
            }
            Self::JntLimits(_) => {
                if e_initial.len() != 4 {
                    return Err(DimensionError::RowMismatch {
                        e: e_initial.len(),
                        j: e_initial.len(),
                        e_dot: 4,
                        types: 4,
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    /// Compute `ė*` into `out`.
    pub fn update(
        &mut self,
        state: &RobotState,
        e: &DVector<Scalar>,
        _j: &DMatrix<Scalar>,
        out: &mut DVector<Scalar>,
    ) -> Result<(), StrataError> {
        match self {
            Self::FirstOrder(d) => {
                out.copy_from(e);
                *out *= -d.lambda;
                Ok(())
            }
            Self::MinimalJerk(d) => {
                let elapsed = state.t.elapsed_since(d.start).as_secs_f64();
                let tau = elapsed / d.horizon;
                if tau < 1.0 {
                    // Rate of the minimal-jerk position profile.
                    let shape = 30.0 * tau.powi(2) - 60.0 * tau.powi(3) + 30.0 * tau.powi(4);
                    out.copy_from(&d.e_initial);
                    *out *= -shape / d.horizon;
                } else {
                    out.copy_from(e);
                    *out *= -d.lambda;
                }
                Ok(())
            }
            Self::JntLimits(d) => {
                out[0] = -d.dq_max;
                out[1] = d.dq_max;
                out[2] = -d.gain * e[2];
                out[3] = -d.gain * e[3];
                Ok(())
            }
        }
    }
}

fn expect_arity(
    what: &'static str,
    params: &[String],
    expected: usize,
) -> Result<(), ConfigError> {
    if params.len() == expected {
        Ok(())
    } else {
        Err(ConfigError::WrongArity {
            what,
            expected,
            got: params.len(),
        })
    }
}

fn number(what: &'static str, text: &str) -> Result<Scalar, ConfigError> {
    text.parse().map_err(|_| ConfigError::BadNumber {
        what,
        text: text.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::sync::Arc;
    use strata_kin::TreeBuilder;

    fn params(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn dummy_state() -> RobotState {
        RobotState::zeros(Arc::new(
            TreeBuilder::new("world")
                .revolute("j1", "arm", "world", Vector3::z(), [0.0; 3])
                .build(),
        ))
    }

    #[test]
    fn parse_first_order() {
        let dyn_ = TaskDynamics::parse(&params(&["FirstOrder", "2.5"])).unwrap();
        assert_eq!(dyn_.type_name(), "FirstOrder");
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = TaskDynamics::parse(&params(&["SecondOrder", "1.0"])).unwrap_err();
        assert!(err.to_string().contains("SecondOrder"));
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        assert!(TaskDynamics::parse(&params(&["FirstOrder"])).is_err());
        assert!(TaskDynamics::parse(&params(&["MinimalJerk", "1.0"])).is_err());
        assert!(TaskDynamics::parse(&params(&["JntLimits", "0.2"])).is_err());
    }

    #[test]
    fn parse_rejects_bad_number() {
        let err = TaskDynamics::parse(&params(&["FirstOrder", "fast"])).unwrap_err();
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn first_order_decays_toward_zero() {
        let mut dyn_ = TaskDynamics::parse(&params(&["FirstOrder", "2.0"])).unwrap();
        let state = dummy_state();
        let e = DVector::from_vec(vec![0.5, -1.0]);
        let j = DMatrix::zeros(2, 1);
        dyn_.init(&state, &e, &DVector::zeros(2)).unwrap();
        let mut out = DVector::zeros(2);
        dyn_.update(&state, &e, &j, &mut out).unwrap();
        assert_relative_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 2.0);
    }

    #[test]
    fn minimal_jerk_profile_shape() {
        let mut dyn_ = TaskDynamics::parse(&params(&["MinimalJerk", "2.0", "1.0"])).unwrap();
        let mut state = dummy_state();
        let e0 = DVector::from_vec(vec![1.0]);
        dyn_.init(&state, &e0, &DVector::zeros(1)).unwrap();
        let j = DMatrix::zeros(1, 1);
        let mut out = DVector::zeros(1);

        // At the start and end of the horizon the rate is zero.
        dyn_.update(&state, &e0, &j, &mut out).unwrap();
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-12);

        // Mid-horizon (tau = 0.5) the rate peaks at -15/8 * e0 / T.
        state.t.advance_secs(1.0);
        dyn_.update(&state, &e0, &j, &mut out).unwrap();
        assert_relative_eq!(out[0], -15.0 / 8.0 / 2.0, epsilon = 1e-9);

        // Past the horizon it falls back to first-order decay.
        state.t.advance_secs(2.0);
        let e = DVector::from_vec(vec![0.1]);
        dyn_.update(&state, &e, &j, &mut out).unwrap();
        assert_relative_eq!(out[0], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn minimal_jerk_rejects_bad_horizon() {
        let mut dyn_ = TaskDynamics::parse(&params(&["MinimalJerk", "0.0", "1.0"])).unwrap();
        let state = dummy_state();
        assert!(dyn_
            .init(&state, &DVector::zeros(1), &DVector::zeros(1))
            .is_err());
    }

    #[test]
    fn jnt_limits_rows() {
        let mut dyn_ = TaskDynamics::parse(&params(&["JntLimits", "0.2", "1.5"])).unwrap();
        let state = dummy_state();
        let e = DVector::from_vec(vec![0.0, 0.0, 0.4, -0.6]);
        dyn_.init(&state, &e, &DVector::zeros(4)).unwrap();
        let j = DMatrix::zeros(4, 1);
        let mut out = DVector::zeros(4);
        dyn_.update(&state, &e, &j, &mut out).unwrap();
        assert_relative_eq!(out[0], -0.2);
        assert_relative_eq!(out[1], 0.2);
        assert_relative_eq!(out[2], -0.6);
        assert_relative_eq!(out[3], 0.9);
    }

    #[test]
    fn jnt_limits_requires_four_rows() {
        let mut dyn_ = TaskDynamics::parse(&params(&["JntLimits", "0.2", "1.0"])).unwrap();
        let state = dummy_state();
        assert!(dyn_
            .init(&state, &DVector::zeros(2), &DVector::zeros(2))
            .is_err());
    }
}
