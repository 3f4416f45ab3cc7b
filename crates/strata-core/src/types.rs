use serde::{Deserialize, Serialize};

/// Constraint sense of one task row.
///
/// Equality rows are tracked (`J·u = ė*`), inequality rows bound the
/// task rate from one side (`J·u ≤ ė*` / `J·u ≥ ė*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowType {
    /// `J·u = ė*`.
    Eq,
    /// Upper bound: `J·u ≤ ė*`.
    Leq,
    /// Lower bound: `J·u ≥ ė*`.
    Geq,
}

impl RowType {
    /// Wire encoding: `0` equality, `-1` upper bound, `+1` lower bound.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Eq => 0,
            Self::Leq => -1,
            Self::Geq => 1,
        }
    }

    /// Decode the wire encoding.
    #[must_use]
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Self::Eq),
            -1 => Some(Self::Leq),
            1 => Some(Self::Geq),
            _ => None,
        }
    }
}
