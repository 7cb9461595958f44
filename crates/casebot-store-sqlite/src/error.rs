//! Error type for `casebot-store-sqlite`.

use casebot_core::{case_number::CaseNumber, store::RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] casebot_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("column decode error: {0}")]
  Decode(String),

  /// The UNIQUE constraint on `cases.case_number` refused an insert.
  #[error("case number {0} is already taken")]
  DuplicateCaseNumber(CaseNumber),
}

impl RepositoryError for Error {
  fn is_duplicate_case_number(&self) -> bool { matches!(self, Self::DuplicateCaseNumber(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
