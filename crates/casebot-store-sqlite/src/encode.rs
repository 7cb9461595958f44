//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! Calendar dates are `YYYY-MM-DD`. Enumerations use their snake_case names.
//! UUIDs are stored as hyphenated lowercase strings.

use casebot_core::{
  case_number::CaseNumber,
  model::{Case, CaseStatus, CrimeCategory, Message, ReportedNumber, User, UserProfile},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

pub fn decode_category(s: &str) -> Result<CrimeCategory> {
  s.parse()
    .map_err(|_| casebot_core::Error::UnknownCategory(s.to_owned()).into())
}

pub fn decode_status(s: &str) -> Result<CaseStatus> {
  s.parse()
    .map_err(|_| casebot_core::Error::UnknownStatus(s.to_owned()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, identity, handle, full_name, id_number, age, \
                                birth_date, address, profession, phone_number, \
                                created_at, updated_at";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:      String,
  pub identity:     String,
  pub handle:       Option<String>,
  pub full_name:    String,
  pub id_number:    String,
  pub age:          i64,
  pub birth_date:   String,
  pub address:      String,
  pub profession:   String,
  pub phone_number: String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawUser {
  /// Map a row selected with [`USER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      identity:     row.get(1)?,
      handle:       row.get(2)?,
      full_name:    row.get(3)?,
      id_number:    row.get(4)?,
      age:          row.get(5)?,
      birth_date:   row.get(6)?,
      address:      row.get(7)?,
      profession:   row.get(8)?,
      phone_number: row.get(9)?,
      created_at:   row.get(10)?,
      updated_at:   row.get(11)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    let age = u8::try_from(self.age)
      .map_err(|_| Error::Decode(format!("age out of range: {}", self.age)))?;
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      identity:   self.identity,
      handle:     self.handle,
      profile:    UserProfile {
        full_name: self.full_name,
        id_number: self.id_number,
        age,
        birth_date: decode_date(&self.birth_date)?,
        address: self.address,
        profession: self.profession,
        phone_number: self.phone_number,
      },
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const CASE_COLUMNS: &str = "case_id, case_number, user_id, category, status, \
                                description, incident_at, created_at, updated_at";

/// Raw strings read directly from a `cases` row.
pub struct RawCase {
  pub case_id:     String,
  pub case_number: String,
  pub user_id:     String,
  pub category:    String,
  pub status:      String,
  pub description: String,
  pub incident_at: String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawCase {
  /// Map a row selected with [`CASE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:     row.get(0)?,
      case_number: row.get(1)?,
      user_id:     row.get(2)?,
      category:    row.get(3)?,
      status:      row.get(4)?,
      description: row.get(5)?,
      incident_at: row.get(6)?,
      created_at:  row.get(7)?,
      updated_at:  row.get(8)?,
    })
  }

  pub fn into_case(self) -> Result<Case> {
    Ok(Case {
      case_id:     decode_uuid(&self.case_id)?,
      case_number: self.case_number.parse::<CaseNumber>()?,
      user_id:     decode_uuid(&self.user_id)?,
      category:    decode_category(&self.category)?,
      status:      decode_status(&self.status)?,
      description: self.description,
      incident_at: decode_dt(&self.incident_at)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const MESSAGE_COLUMNS: &str =
  "message_id, case_id, sender_id, body, from_operator, created_at";

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:    String,
  pub case_id:       String,
  pub sender_id:     Option<String>,
  pub body:          String,
  pub from_operator: bool,
  pub created_at:    String,
}

impl RawMessage {
  /// Map a row selected with [`MESSAGE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:    row.get(0)?,
      case_id:       row.get(1)?,
      sender_id:     row.get(2)?,
      body:          row.get(3)?,
      from_operator: row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:    decode_uuid(&self.message_id)?,
      case_id:       decode_uuid(&self.case_id)?,
      sender_id:     self.sender_id.as_deref().map(decode_uuid).transpose()?,
      body:          self.body,
      from_operator: self.from_operator,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const REPORTED_NUMBER_COLUMNS: &str = "number, report_count, updated_at";

/// Raw values read directly from a `reported_numbers` row.
pub struct RawReportedNumber {
  pub number:       String,
  pub report_count: u32,
  pub updated_at:   String,
}

impl RawReportedNumber {
  /// Map a row selected with [`REPORTED_NUMBER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      number:       row.get(0)?,
      report_count: row.get(1)?,
      updated_at:   row.get(2)?,
    })
  }

  pub fn into_reported_number(self) -> Result<ReportedNumber> {
    Ok(ReportedNumber {
      number:       self.number,
      report_count: self.report_count,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = DateTime::from_timestamp(1_736_510_400, 0).unwrap();
    let b = DateTime::from_timestamp(1_736_510_400, 500_000_000).unwrap();
    let c = DateTime::from_timestamp(1_736_510_401, 0).unwrap();
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec, "{ea} {eb} {ec}");
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_enum_strings_are_errors() {
    assert!(decode_category("ransomware").is_err());
    assert!(decode_status("archived").is_err());
    assert_eq!(decode_status("in_progress").unwrap(), CaseStatus::InProgress);
    assert_eq!(decode_category("email_hack").unwrap(), CrimeCategory::EmailHack);
  }
}
