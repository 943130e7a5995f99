use thiserror::Error;

use crate::overlay::AxisBox;

/// Why a single block was not drawn. Never fatal to the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),

    #[error("could not fit text into box {0}, box may be too small")]
    NoLayoutFound(AxisBox),
}

/// Why one wrap attempt at one font size was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WrapFailure {
    #[error("a single word is wider than the box")]
    Width,

    #[error("more lines are needed than the box height allows")]
    Height,
}
