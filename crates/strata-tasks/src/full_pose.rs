//! Full configuration-space pose task: `e = q − q*`, `J = I`.
//!
//! Fully constrains the robot; no redundancy is left for lower
//! priorities.

use nalgebra::{DMatrix, DVector};

use strata_core::{
    Scalar,
    error::{ConfigError, StrataError},
    types::RowType,
};
use strata_geom::PrimitiveStore;
use strata_kin::RobotState;

#[derive(Debug, Clone)]
pub struct FullPose {
    desired: DVector<Scalar>,
    row_types: Vec<RowType>,
}

impl FullPose {
    /// Parse one desired value per controllable joint.
    pub fn parse(def_params: &[String]) -> Result<Self, StrataError> {
        let mut desired = Vec::with_capacity(def_params.len());
        for text in def_params {
            desired.push(text.parse().map_err(|_| ConfigError::BadNumber {
                what: "desired joint value",
                text: text.clone(),
            })?);
        }
        Ok(Self {
            desired: DVector::from_vec(desired),
            row_types: Vec::new(),
        })
    }

    pub fn init(&mut self, _state: &RobotState, n_controls: usize) -> Result<(), StrataError> {
        if self.desired.len() != n_controls {
            return Err(ConfigError::WrongArity {
                what: "FullPose",
                expected: n_controls,
                got: self.desired.len(),
            }
            .into());
        }
        self.row_types = vec![RowType::Eq; n_controls];
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.desired.len()
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
        e.copy_from(&state.q);
        *e -= &self.desired;
        j.fill(0.0);
        j.fill_diagonal(1.0);
        Ok(())
    }

    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        DVector::zeros(self.rows())
    }
}
