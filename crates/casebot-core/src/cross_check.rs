//! Consistency checks between two already-validated answers.
//!
//! Only one pairing exists: the stated age against the age implied by the
//! birth date. It runs when the birth date arrives; the age answer is never
//! revisited afterwards.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::{conversation::ConversationState, step::Step, validate::Answer};

/// Largest accepted gap, in years, between stated and computed age.
pub const AGE_TOLERANCE: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossCheck {
  /// The candidate birth date must agree with the recorded [`Step::Age`].
  AgeMatchesBirthDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
  "you said you are {stated_age}, but that birth date means you are \
   {computed_age}; please send your birth date again as DD/MM/YYYY"
)]
pub struct CrossCheckError {
  pub stated_age:   i64,
  pub computed_age: i64,
}

impl CrossCheck {
  /// Check `candidate` against what `state` already holds. A missing or
  /// differently-typed counterpart is treated as nothing to contradict.
  pub fn check(
    &self,
    state: &ConversationState,
    candidate: &Answer,
    today: NaiveDate,
  ) -> Result<(), CrossCheckError> {
    match self {
      Self::AgeMatchesBirthDate => {
        let stated = state.answer(Step::Age).and_then(Answer::as_integer);
        match (stated, candidate.as_date()) {
          (Some(stated), Some(birth)) => check_age(stated, birth, today),
          _ => Ok(()),
        }
      }
    }
  }
}

/// Completed years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i64 {
  let mut years = i64::from(today.year() - birth.year());
  if (today.month(), today.day()) < (birth.month(), birth.day()) {
    years -= 1;
  }
  years
}

pub fn check_age(
  stated_age: i64,
  birth: NaiveDate,
  today: NaiveDate,
) -> Result<(), CrossCheckError> {
  let computed_age = age_on(birth, today);
  if (computed_age - stated_age).abs() <= AGE_TOLERANCE {
    Ok(())
  } else {
    Err(CrossCheckError { stated_age, computed_age })
  }
}
