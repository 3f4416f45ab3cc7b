//! Joint-limit task: four rows on one joint.
//!
//! Rows 0 and 1 are rate rows (the paired `JntLimits` dynamics turns
//! them into hard velocity caps `±dq_max`); rows 2 and 3 carry the
//! position errors `q − q_min` and `q − q_max` that the dynamics turns
//! into tapering pushback bounds near the limits.

use nalgebra::{DMatrix, DVector};

use strata_core::{
    Scalar,
    error::{ConfigError, StrataError},
    types::RowType,
};
use strata_geom::PrimitiveStore;
use strata_kin::RobotState;

#[derive(Debug, Clone)]
pub struct JointLimits {
    joint: String,
    pub q_min: Scalar,
    pub q_max: Scalar,
    pub dq_max: Scalar,
    q_nr: usize,
    row_types: [RowType; 4],
}

impl JointLimits {
    /// Parse `(joint_name, q_min, q_max, dq_max)`.
    pub fn parse(def_params: &[String]) -> Result<Self, StrataError> {
        if def_params.len() != 4 {
            return Err(ConfigError::WrongArity {
                what: "JointLimits",
                expected: 4,
                got: def_params.len(),
            }
            .into());
        }
        let number = |what: &'static str, text: &String| -> Result<Scalar, ConfigError> {
            text.parse().map_err(|_| ConfigError::BadNumber {
                what,
                text: text.clone(),
            })
        };
        let q_min = number("q_min", &def_params[1])?;
        let q_max = number("q_max", &def_params[2])?;
        let dq_max = number("dq_max", &def_params[3])?;
        if q_min >= q_max {
            return Err(ConfigError::InvalidValue {
                field: "q_min/q_max".into(),
                message: format!("q_min {q_min} >= q_max {q_max}"),
            }
            .into());
        }
        if dq_max <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "dq_max".into(),
                message: format!("must be positive, got {dq_max}"),
            }
            .into());
        }
        Ok(Self {
            joint: def_params[0].clone(),
            q_min,
            q_max,
            dq_max,
            q_nr: usize::MAX,
            row_types: [RowType::Geq, RowType::Leq, RowType::Geq, RowType::Leq],
        })
    }

    pub fn init(&mut self, state: &RobotState, _n_controls: usize) -> Result<(), StrataError> {
        self.q_nr = state.tree.q_nr_of_joint(&self.joint)?;
        Ok(())
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        4
    }

    #[must_use]
    pub fn row_types(&self) -> &[RowType] {
        &self.row_types
    }

    pub fn update(
        &mut self,
        state: &RobotState,
        _store: &PrimitiveStore,
        e: &mut DVector<Scalar>,
        j: &mut DMatrix<Scalar>,
    ) -> Result<(), StrataError> {
        let q = state.q[self.q_nr];
        // Rate rows carry no position error of their own.
        e[0] = 0.0;
        e[1] = 0.0;
        e[2] = q - self.q_min;
        e[3] = q - self.q_max;
        j.fill(0.0);
        for row in 0..4 {
            j[(row, self.q_nr)] = 1.0;
        }
        Ok(())
    }

    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        DVector::zeros(4)
    }
}
