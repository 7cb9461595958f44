//! Human-facing case numbers: `CASE-<YYYYMMDD>-<NNNN>`.
//!
//! The four-digit suffix is random, so two commits on the same day can draw
//! the same number. Uniqueness is enforced by the repository, and case commit
//! regenerates on a reported collision.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const PREFIX: &str = "CASE-";
const SUFFIX_SPACE: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseNumber(String);

impl CaseNumber {
  /// Draw a fresh case number dated `date`.
  pub fn generate(date: NaiveDate, rng: &mut impl RngCore) -> Self {
    let suffix = rng.next_u32() % SUFFIX_SPACE;
    Self(format!("{PREFIX}{}-{suffix:04}", date.format("%Y%m%d")))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for CaseNumber {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let malformed = || Error::MalformedCaseNumber(s.to_owned());
    let rest = s.strip_prefix(PREFIX).ok_or_else(malformed)?;
    let (date, suffix) = rest.split_once('-').ok_or_else(malformed)?;

    let all_digits = |part: &str, len: usize| {
      part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
    };
    if !all_digits(date, 8) || !all_digits(suffix, 4) {
      return Err(malformed());
    }
    NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| malformed())?;

    Ok(Self(s.to_owned()))
  }
}

impl TryFrom<String> for CaseNumber {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<CaseNumber> for String {
  fn from(n: CaseNumber) -> Self { n.0 }
}

impl fmt::Display for CaseNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
