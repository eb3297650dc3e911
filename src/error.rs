//! Error types for the de-bufferization pass.

use derive_more::{Display, Error};
use itertools::Itertools;
use tensor_ir::rewrite::IllegalOp;
use tensor_ir::validation::ValidationError;

pub type DebufResult<T> = Result<T, DebufError>;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum DebufError {
    /// Buffer operations survived the conversion.
    #[display("{} operation(s) could not be converted: {}", ops.len(), ops.iter().join("; "))]
    Legalization {
        #[error(not(source))]
        ops: Vec<IllegalOp>,
    },

    /// The converted module is structurally broken.
    #[display("converted module failed validation: {}", errors.iter().join("; "))]
    Verification {
        #[error(not(source))]
        errors: Vec<ValidationError>,
    },
}

impl DebufError {
    /// Operations left behind, when the conversion did not finish.
    pub fn illegal_ops(&self) -> &[IllegalOp] {
        match self {
            DebufError::Legalization { ops } => ops,
            DebufError::Verification { .. } => &[],
        }
    }
}
