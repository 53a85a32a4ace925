use thiserror::Error;

use crate::parse::ParseError;
use crate::{BuildError, DispatchError};

/// Unified error type covering parsing, compilation, dispatch, and I/O.
///
/// Returned by convenience methods like
/// [`RuleSetBuilder::from_file()`](crate::RuleSetBuilder::from_file).
#[derive(Debug, Error)]
pub enum RuleTreeError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
