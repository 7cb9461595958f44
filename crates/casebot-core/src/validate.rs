//! Field validators: pure checks of one raw text input against the kind of
//! value a dialogue step expects.
//!
//! A validator never looks at other answers; consistency between fields is
//! the job of [`cross_check`](crate::cross_check).

use std::num::IntErrorKind;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::CrimeCategory;

// ─── Answers ─────────────────────────────────────────────────────────────────

/// A validated value, as recorded in the conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
  Integer(i64),
  Date(NaiveDate),
  Text(String),
  Crime(CrimeCategory),
}

impl Answer {
  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Self::Integer(v) => Some(*v),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<NaiveDate> {
    match self {
      Self::Date(d) => Some(*d),
      _ => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(t) => Some(t),
      _ => None,
    }
  }

  pub fn as_crime(&self) -> Option<CrimeCategory> {
    match self {
      Self::Crime(c) => Some(*c),
      _ => None,
    }
  }
}

impl std::fmt::Display for Answer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Integer(v) => write!(f, "{v}"),
      Self::Date(d) => write!(f, "{}", d.format("%d/%m/%Y")),
      Self::Text(t) => f.write_str(t),
      Self::Crime(c) => write!(f, "{c}"),
    }
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a raw input was refused. The `Display` text is shown to the reporter,
/// so every variant names what was expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("this answer cannot be empty")]
  Empty,

  #[error("that is not a number; reply with digits only, between {min} and {max}")]
  NotANumber { min: i64, max: i64 },

  #[error("the number must be between {min} and {max}")]
  OutOfRange { min: i64, max: i64 },

  #[error("the date must be written as DD/MM/YYYY, for example 15/05/1984")]
  DateFormat,

  #[error("that day does not exist in the calendar; use DD/MM/YYYY")]
  NotACalendarDate,

  #[error("the date {} is in the future", .0.format("%d/%m/%Y"))]
  FutureDate(NaiveDate),
}

// ─── Validators ──────────────────────────────────────────────────────────────

/// The input kind a step accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
  /// An integer within inclusive bounds.
  IntegerInRange { min: i64, max: i64 },
  /// A past-or-today date in `DD/MM/YYYY`.
  DateInFormat,
  /// Any non-empty text after trimming.
  FreeText,
  /// Free text classified into a [`CrimeCategory`]; never fails.
  CrimeChoice,
}

impl Validator {
  /// Validate `raw` as of `today`. Surrounding whitespace is ignored.
  pub fn validate(&self, raw: &str, today: NaiveDate) -> Result<Answer, ValidationError> {
    let input = raw.trim();
    match *self {
      Self::IntegerInRange { min, max } => integer_in_range(input, min, max),
      Self::DateInFormat => date_in_format(input, today),
      Self::FreeText => {
        if input.is_empty() {
          Err(ValidationError::Empty)
        } else {
          Ok(Answer::Text(input.to_owned()))
        }
      }
      Self::CrimeChoice => Ok(Answer::Crime(CrimeCategory::classify(input))),
    }
  }
}

fn integer_in_range(input: &str, min: i64, max: i64) -> Result<Answer, ValidationError> {
  let value: i64 = input.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
      ValidationError::OutOfRange { min, max }
    }
    _ => ValidationError::NotANumber { min, max },
  })?;

  if (min..=max).contains(&value) {
    Ok(Answer::Integer(value))
  } else {
    Err(ValidationError::OutOfRange { min, max })
  }
}

fn date_in_format(input: &str, today: NaiveDate) -> Result<Answer, ValidationError> {
  let parts: Vec<&str> = input.split('/').collect();
  let [day, month, year] = parts.as_slice() else {
    return Err(ValidationError::DateFormat);
  };

  let digits = |part: &str, len: usize| {
    part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
  };
  if !digits(*day, 2) || !digits(*month, 2) || !digits(*year, 4) {
    return Err(ValidationError::DateFormat);
  }

  // All three groups are short digit runs, so these parses cannot fail.
  let (Ok(d), Ok(m), Ok(y)) = (day.parse(), month.parse(), year.parse()) else {
    return Err(ValidationError::DateFormat);
  };

  let date = NaiveDate::from_ymd_opt(y, m, d).ok_or(ValidationError::NotACalendarDate)?;
  if date > today {
    return Err(ValidationError::FutureDate(date));
  }
  Ok(Answer::Date(date))
}
