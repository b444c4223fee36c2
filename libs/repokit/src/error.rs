use sea_orm::DbErr;
use thiserror::Error;

/// Library-local result type.
pub type RepoResult<T> = Result<T, RepoError>;

/// Everything a repository call can fail with.
///
/// Argument errors are raised before any statement reaches the database.
/// Database errors are passed through untouched in [`RepoError::Db`].
#[derive(Debug, Error)]
pub enum RepoError {
    /// A required entity was absent.
    #[error("invalid argument `{0}`: a value is required")]
    InvalidArgument(&'static str),

    /// A pagination argument violated its bounds.
    #[error("argument `{name}` is out of range ({value}): {reason}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        reason: &'static str,
    },

    /// A delete matched no row.
    #[error("no `{table}` row matched the given key")]
    NotFound { table: String },

    /// The caller's cancellation token fired before the call completed.
    #[error("operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl RepoError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RepoError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. })
    }

    /// True for errors raised by argument validation, before any I/O.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            RepoError::InvalidArgument(_) | RepoError::OutOfRange { .. }
        )
    }
}
