//! Joint-subset configuration task: `FullPose` over a named joint list.

use nalgebra::{DMatrix, DVector};

use strata_core::{
    Scalar,
    error::{ConfigError, StrataError},
    types::RowType,
};
use strata_geom::PrimitiveStore;
use strata_kin::RobotState;

#[derive(Debug, Clone)]
pub struct JointConfiguration {
    /// `(joint name, desired value)` pairs as parsed.
    entries: Vec<(String, Scalar)>,
    /// Resolved `q_nr` per entry, filled at init.
    q_nrs: Vec<usize>,
    row_types: Vec<RowType>,
}

impl JointConfiguration {
    /// Parse alternating `joint_name, value` parameters.
    pub fn parse(def_params: &[String]) -> Result<Self, StrataError> {
        if def_params.is_empty() || def_params.len() % 2 != 0 {
            let expected = if def_params.is_empty() {
                2
            } else {
                def_params.len() + 1
            };
            return Err(ConfigError::WrongArity {
                what: "JointConfiguration",
                expected,
                got: def_params.len(),
            }
            .into());
        }
        let mut entries = Vec::with_capacity(def_params.len() / 2);
        for pair in def_params.chunks_exact(2) {
            let value = pair[1].parse().map_err(|_| ConfigError::BadNumber {
                what: "desired joint value",
                text: pair[1].clone(),
            })?;
            entries.push((pair[0].clone(), value));
        }
        Ok(Self {
            entries,
            q_nrs: Vec::new(),
            row_types: Vec::new(),
        })
    }

    pub fn init(&mut self, state: &RobotState, _n_controls: usize) -> Result<(), StrataError> {
        self.q_nrs = self
            .entries
            .iter()
            .map(|(name, _)| state.tree.q_nr_of_joint(name))
            .collect::<Result<_, _>>()?;
        self.row_types = vec![RowType::Eq; self.entries.len()];
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.entries.len()
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
        j.fill(0.0);
        for (row, (&q_nr, (_, desired))) in self.q_nrs.iter().zip(&self.entries).enumerate() {
            e[row] = state.q[q_nr] - desired;
            j[(row, q_nr)] = 1.0;
        }
        Ok(())
    }

    #[must_use]
    pub fn final_state(&self) -> DVector<Scalar> {
        DVector::zeros(self.rows())
    }
}
