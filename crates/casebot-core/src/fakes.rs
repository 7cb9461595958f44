//! In-memory repository and notifier for exercising the intake service.

use std::sync::{
  Mutex,
  atomic::{AtomicBool, AtomicU32, Ordering},
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  case_number::CaseNumber,
  model::{
    Case, CaseStatus, Identity, IntakeCommit, Message, NewCase, NewMessage, ReportedNumber, User,
    UserProfile,
  },
  notify::Notifier,
  store::{CaseRepository, RepositoryError},
};

#[derive(Debug, Error)]
pub enum FakeError {
  #[error("repository unavailable")]
  Unavailable,
  #[error("duplicate case number {0}")]
  DuplicateCaseNumber(CaseNumber),
}

impl RepositoryError for FakeError {
  fn is_duplicate_case_number(&self) -> bool { matches!(self, Self::DuplicateCaseNumber(_)) }
}

#[derive(Default)]
struct Tables {
  users:    Vec<User>,
  cases:    Vec<Case>,
  messages: Vec<Message>,
  numbers:  Vec<ReportedNumber>,
}

impl Tables {
  fn upsert(&mut self, identity: &Identity, profile: UserProfile, at: DateTime<Utc>) -> User {
    if let Some(user) = self.users.iter_mut().find(|u| u.identity == identity.external_id) {
      user.profile = profile;
      if identity.handle.is_some() {
        user.handle = identity.handle.clone();
      }
      user.updated_at = at;
      return user.clone();
    }
    let user = User {
      user_id:    Uuid::new_v4(),
      identity:   identity.external_id.clone(),
      handle:     identity.handle.clone(),
      profile,
      created_at: at,
      updated_at: at,
    };
    self.users.push(user.clone());
    user
  }

  fn insert_case(&mut self, input: NewCase) -> Result<Case, FakeError> {
    if self.cases.iter().any(|c| c.case_number == input.case_number) {
      return Err(FakeError::DuplicateCaseNumber(input.case_number));
    }
    let case = Case {
      case_id:     Uuid::new_v4(),
      case_number: input.case_number,
      user_id:     input.user_id,
      category:    input.category,
      status:      CaseStatus::New,
      description: input.description,
      incident_at: input.incident_at,
      created_at:  input.created_at,
      updated_at:  input.created_at,
    };
    self.cases.push(case.clone());
    Ok(case)
  }
}

#[derive(Default)]
pub struct MemoryRepository {
  tables:         Mutex<Tables>,
  fail_upserts:   AtomicBool,
  reject_numbers: AtomicU32,
}

impl MemoryRepository {
  pub fn users(&self) -> Vec<User> { self.tables.lock().unwrap().users.clone() }

  pub fn cases(&self) -> Vec<Case> { self.tables.lock().unwrap().cases.clone() }

  pub fn messages(&self) -> Vec<Message> { self.tables.lock().unwrap().messages.clone() }

  pub fn fail_upserts(&self, fail: bool) { self.fail_upserts.store(fail, Ordering::SeqCst) }

  /// Report the next `n` case inserts as case-number collisions.
  pub fn reject_case_numbers(&self, n: u32) { self.reject_numbers.store(n, Ordering::SeqCst) }

  fn take_rejection(&self) -> bool {
    self
      .reject_numbers
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
  }
}

impl CaseRepository for MemoryRepository {
  type Error = FakeError;

  async fn find_user_by_identity(&self, identity: &str) -> Result<Option<User>, FakeError> {
    let tables = self.tables.lock().unwrap();
    Ok(tables.users.iter().find(|u| u.identity == identity).cloned())
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, FakeError> {
    let tables = self.tables.lock().unwrap();
    Ok(tables.users.iter().find(|u| u.user_id == user_id).cloned())
  }

  async fn upsert_user(
    &self,
    identity: &Identity,
    profile: UserProfile,
    at: DateTime<Utc>,
  ) -> Result<User, FakeError> {
    if self.fail_upserts.load(Ordering::SeqCst) {
      return Err(FakeError::Unavailable);
    }
    Ok(self.tables.lock().unwrap().upsert(identity, profile, at))
  }

  async fn create_case(&self, input: NewCase) -> Result<Case, FakeError> {
    if self.take_rejection() {
      return Err(FakeError::DuplicateCaseNumber(input.case_number));
    }
    self.tables.lock().unwrap().insert_case(input)
  }

  async fn commit_intake(&self, input: IntakeCommit) -> Result<(User, Case), FakeError> {
    if self.fail_upserts.load(Ordering::SeqCst) {
      return Err(FakeError::Unavailable);
    }
    let mut tables = self.tables.lock().unwrap();
    let before = tables.users.clone();
    let user = tables.upsert(&input.identity, input.profile, input.at);

    let new_case = NewCase {
      case_number: input.case_number,
      user_id:     user.user_id,
      category:    input.category,
      description: input.description,
      incident_at: input.at,
      created_at:  input.at,
    };
    let inserted = if self.take_rejection() {
      Err(FakeError::DuplicateCaseNumber(new_case.case_number))
    } else {
      tables.insert_case(new_case)
    };
    match inserted {
      Ok(case) => Ok((user, case)),
      Err(e) => {
        tables.users = before;
        Err(e)
      }
    }
  }

  async fn find_open_case_for_user(&self, user_id: Uuid) -> Result<Option<Case>, FakeError> {
    let tables = self.tables.lock().unwrap();
    Ok(
      tables
        .cases
        .iter()
        .rev()
        .find(|c| c.user_id == user_id && c.status.is_open())
        .cloned(),
    )
  }

  async fn find_case_by_number(&self, case_number: &CaseNumber) -> Result<Option<Case>, FakeError> {
    let tables = self.tables.lock().unwrap();
    Ok(tables.cases.iter().find(|c| &c.case_number == case_number).cloned())
  }

  async fn update_case_status(
    &self,
    case_id: Uuid,
    status: CaseStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Case>, FakeError> {
    let mut tables = self.tables.lock().unwrap();
    Ok(tables.cases.iter_mut().find(|c| c.case_id == case_id).map(|c| {
      c.status = status;
      c.updated_at = at;
      c.clone()
    }))
  }

  async fn append_message(&self, input: NewMessage) -> Result<Message, FakeError> {
    let message = Message {
      message_id:    Uuid::new_v4(),
      case_id:       input.case_id,
      sender_id:     input.sender_id,
      body:          input.body,
      from_operator: input.from_operator,
      created_at:    input.created_at,
    };
    self.tables.lock().unwrap().messages.push(message.clone());
    Ok(message)
  }

  async fn list_messages(&self, case_id: Uuid) -> Result<Vec<Message>, FakeError> {
    let tables = self.tables.lock().unwrap();
    Ok(tables.messages.iter().filter(|m| m.case_id == case_id).cloned().collect())
  }

  async fn find_reported_number(&self, number: &str) -> Result<Option<ReportedNumber>, FakeError> {
    let tables = self.tables.lock().unwrap();
    Ok(tables.numbers.iter().find(|n| n.number == number).cloned())
  }

  async fn record_reported_number(
    &self,
    number: &str,
    at: DateTime<Utc>,
  ) -> Result<ReportedNumber, FakeError> {
    let mut tables = self.tables.lock().unwrap();
    if let Some(row) = tables.numbers.iter_mut().find(|n| n.number == number) {
      row.report_count += 1;
      row.updated_at = at;
      return Ok(row.clone());
    }
    let row = ReportedNumber { number: number.to_owned(), report_count: 1, updated_at: at };
    tables.numbers.push(row.clone());
    Ok(row)
  }
}

// ─── Notifier ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("channel unreachable")]
pub struct Unreachable;

/// Records every delivered reply.
#[derive(Default)]
pub struct RecordingNotifier {
  sent:  Mutex<Vec<(String, String)>>,
  fail:  AtomicBool,
  stall: AtomicBool,
}

impl RecordingNotifier {
  pub fn fail(&self, fail: bool) { self.fail.store(fail, Ordering::SeqCst) }

  /// Make every send hang forever.
  pub fn stall(&self, stall: bool) { self.stall.store(stall, Ordering::SeqCst) }

  pub fn last_to(&self, identity: &str) -> Option<String> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .rev()
      .find(|(to, _)| to == identity)
      .map(|(_, text)| text.clone())
  }
}

impl Notifier for RecordingNotifier {
  type Error = Unreachable;

  async fn send(&self, identity: &str, text: &str) -> Result<(), Unreachable> {
    if self.stall.load(Ordering::SeqCst) {
      std::future::pending::<()>().await;
    }
    if self.fail.load(Ordering::SeqCst) {
      return Err(Unreachable);
    }
    self.sent.lock().unwrap().push((identity.to_owned(), text.to_owned()));
    Ok(())
  }
}
