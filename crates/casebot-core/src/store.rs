//! The `CaseRepository` trait: the persistence operations the intake engine
//! and the operator surface need.
//!
//! The trait is implemented by storage backends (e.g.
//! `casebot-store-sqlite`). Higher layers depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  case_number::CaseNumber,
  model::{
    Case, CaseStatus, Identity, IntakeCommit, Message, NewCase, NewMessage, ReportedNumber, User,
    UserProfile,
  },
};

/// Classification a backend error must expose to case commit.
pub trait RepositoryError: std::error::Error + Send + Sync + 'static {
  /// `true` when an insert was refused only because the case number is
  /// already taken. Case commit regenerates the number and retries.
  fn is_duplicate_case_number(&self) -> bool;
}

/// Abstraction over a case store backend.
///
/// Users are keyed by identity, never by name. Messages are append-only.
/// Every timestamp a backend stores is passed in by the caller.
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait CaseRepository: Send + Sync {
  type Error: RepositoryError;

  // ── Users ─────────────────────────────────────────────────────────────

  fn find_user_by_identity<'a>(
    &'a self,
    identity: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Create the user for `identity`, or overwrite the personal fields of the
  /// existing one and set its `updated_at` to `at`. The user id never
  /// changes.
  fn upsert_user<'a>(
    &'a self,
    identity: &'a Identity,
    profile: UserProfile,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + 'a;

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Insert a case with status [`CaseStatus::New`]. Fails with an error for
  /// which [`RepositoryError::is_duplicate_case_number`] holds if the number
  /// is taken.
  fn create_case(
    &self,
    input: NewCase,
  ) -> impl Future<Output = Result<Case, Self::Error>> + Send + '_;

  /// [`upsert_user`](Self::upsert_user) then [`create_case`](Self::create_case)
  /// as one transaction. If the case insert fails, the user row is left as it
  /// was before the call, including on a duplicate case number.
  fn commit_intake(
    &self,
    input: IntakeCommit,
  ) -> impl Future<Output = Result<(User, Case), Self::Error>> + Send + '_;

  /// The most recently created case of `user_id` whose status is not
  /// [`CaseStatus::Closed`].
  fn find_open_case_for_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + '_;

  fn find_case_by_number<'a>(
    &'a self,
    case_number: &'a CaseNumber,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + 'a;

  /// Returns `None` if the case does not exist.
  fn update_case_status(
    &self,
    case_id: Uuid,
    status: CaseStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Case>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  fn append_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// The thread of `case_id` in creation order.
  fn list_messages(
    &self,
    case_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  // ── Reported numbers ──────────────────────────────────────────────────

  /// `None` if `number` was never reported.
  fn find_reported_number<'a>(
    &'a self,
    number: &'a str,
  ) -> impl Future<Output = Result<Option<ReportedNumber>, Self::Error>> + Send + 'a;

  /// Add one report for `number`, creating its row on the first.
  fn record_reported_number<'a>(
    &'a self,
    number: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<ReportedNumber, Self::Error>> + Send + 'a;
}
