//! Error types for `casebot-core`.

use thiserror::Error;

use crate::step::Step;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown crime category: {0:?}")]
  UnknownCategory(String),

  #[error("unknown case status: {0:?}")]
  UnknownStatus(String),

  #[error("malformed case number: {0:?}")]
  MalformedCaseNumber(String),

  #[error("malformed phone number: {0:?}")]
  MalformedPhoneNumber(String),

  #[error("dialogue is missing an answer for step {0}")]
  MissingAnswer(Step),

  #[error("answer for step {0} has the wrong kind")]
  AnswerKind(Step),

  #[error("dialogue cursor {0} is past the last step")]
  DialogueOverrun(usize),

  #[error("no unused case number after {0} attempts")]
  CaseNumbersExhausted(u32),

  #[error("case not found: {0}")]
  CaseNotFound(String),

  #[error("repository error: {0}")]
  Repository(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
