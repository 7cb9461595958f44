//! Durable records produced by the intake engine: users, cases and the
//! message thread attached to each case.
//!
//! Records are created by the store; the `New*` inputs carry only what the
//! caller decides; identifiers and timestamps are assigned on insert.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::case_number::CaseNumber;

// ─── Identity ────────────────────────────────────────────────────────────────

/// An external channel participant.
///
/// `external_id` is opaque and channel-specific; it is the key for both the
/// session store and the user upsert. The handle is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
  pub external_id: String,
  pub handle:      Option<String>,
}

impl Identity {
  pub fn new(external_id: impl Into<String>) -> Self {
    Self { external_id: external_id.into(), handle: None }
  }

  pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
    self.handle = Some(handle.into());
    self
  }
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Closed set of crime categories a case can be filed under.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CrimeCategory {
  Phishing,
  WhatsappHack,
  EmailHack,
  Extortion,
  Other,
}

/// Keyword table for [`CrimeCategory::classify`]; first match wins.
const CATEGORY_KEYWORDS: &[(&str, CrimeCategory)] = &[
  ("phishing", CrimeCategory::Phishing),
  ("whatsapp", CrimeCategory::WhatsappHack),
  ("email", CrimeCategory::EmailHack),
  ("extorsion", CrimeCategory::Extortion),
  ("extorsión", CrimeCategory::Extortion),
  ("extortion", CrimeCategory::Extortion),
];

impl CrimeCategory {
  /// Map free text to a category by case-insensitive substring match.
  /// Text matching no keyword falls back to [`CrimeCategory::Other`].
  pub fn classify(text: &str) -> Self {
    let lowered = text.to_lowercase();
    CATEGORY_KEYWORDS
      .iter()
      .find(|(keyword, _)| lowered.contains(keyword))
      .map(|(_, category)| *category)
      .unwrap_or(Self::Other)
  }
}

/// Lifecycle status of a case as worked by operators.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseStatus {
  #[default]
  New,
  InProgress,
  /// Filed with the authorities.
  Reported,
  Resolved,
  /// Terminal. Stray reporter messages are no longer routed to the case.
  Closed,
}

impl CaseStatus {
  pub fn is_open(&self) -> bool { !matches!(self, Self::Closed) }
}

// ─── User ────────────────────────────────────────────────────────────────────

/// Personal data collected by one dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub full_name:    String,
  pub id_number:    String,
  pub age:          u8,
  pub birth_date:   NaiveDate,
  pub address:      String,
  pub profession:   String,
  pub phone_number: String,
}

/// The durable user record, one per [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub identity:   String,
  pub handle:     Option<String>,
  pub profile:    UserProfile,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

// ─── Case ────────────────────────────────────────────────────────────────────

/// Input for [`CaseRepository::create_case`](crate::store::CaseRepository::create_case).
#[derive(Debug, Clone)]
pub struct NewCase {
  pub case_number: CaseNumber,
  pub user_id:     Uuid,
  pub category:    CrimeCategory,
  pub description: String,
  pub incident_at: DateTime<Utc>,
  pub created_at:  DateTime<Utc>,
}

/// Everything one completed dialogue writes, for
/// [`CaseRepository::commit_intake`](crate::store::CaseRepository::commit_intake).
///
/// `at` is the commit instant: the user's `updated_at` and the case's
/// incident and creation time.
#[derive(Debug, Clone)]
pub struct IntakeCommit {
  pub identity:    Identity,
  pub profile:     UserProfile,
  pub case_number: CaseNumber,
  pub category:    CrimeCategory,
  pub description: String,
  pub at:          DateTime<Utc>,
}

/// A reported incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
  pub case_id:     Uuid,
  pub case_number: CaseNumber,
  pub user_id:     Uuid,
  pub category:    CrimeCategory,
  pub status:      CaseStatus,
  pub description: String,
  pub incident_at: DateTime<Utc>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// Input for [`CaseRepository::append_message`](crate::store::CaseRepository::append_message).
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub case_id:       Uuid,
  /// `None` for system-authored messages.
  pub sender_id:     Option<Uuid>,
  pub body:          String,
  pub from_operator: bool,
  pub created_at:    DateTime<Utc>,
}

/// One entry of a case's append-only thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:    Uuid,
  pub case_id:       Uuid,
  pub sender_id:     Option<Uuid>,
  pub body:          String,
  pub from_operator: bool,
  pub created_at:    DateTime<Utc>,
}

// ─── Reported numbers ────────────────────────────────────────────────────────

/// How often a phone number has been reported as used in a crime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedNumber {
  pub number:       String,
  pub report_count: u32,
  pub updated_at:   DateTime<Utc>,
}

/// Reduce a phone number to its digits, keeping a leading `+`. Spaces,
/// dashes, dots and parentheses are dropped; any other character, or no
/// digits at all, makes it `None`.
pub fn normalize_phone(raw: &str) -> Option<String> {
  let raw = raw.trim();
  let (plus, rest) = match raw.strip_prefix('+') {
    Some(rest) => ("+", rest),
    None => ("", raw),
  };
  let mut digits = String::with_capacity(rest.len() + 1);
  digits.push_str(plus);
  for c in rest.chars() {
    match c {
      '0'..='9' => digits.push(c),
      ' ' | '-' | '.' | '(' | ')' => {}
      _ => return None,
    }
  }
  (digits.len() > plus.len()).then_some(digits)
}
