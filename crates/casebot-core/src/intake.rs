//! [`IntakeService`]: the message router and case commit wired around the
//! state machine, the session store, a repository and a notifier.
//!
//! Every inbound message for an identity is handled while holding that
//! identity's session lock, so a reporter's messages are processed one at a
//! time and in arrival order. Replies are sent under that lock too, so each
//! send is bounded by the service's reply timeout.

use std::{sync::Arc, time::Duration};

use rand_core::OsRng;
use serde::Serialize;

use crate::{
  Error, Result,
  case_number::CaseNumber,
  clock::{Clock, SystemClock},
  machine::{IntakeMachine, IntakeRecord, Transition},
  model::{
    Case, CaseStatus, Identity, IntakeCommit, Message, NewMessage, ReportedNumber,
    normalize_phone,
  },
  notify::Notifier,
  session::{SessionGuard, SessionStore},
  step::Step,
  store::{CaseRepository, RepositoryError},
};

/// How many case numbers commit draws before giving up.
pub const MAX_CASE_NUMBER_ATTEMPTS: u32 = 5;

/// How long one reply may take before it is abandoned.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

const GREETING: &str = "Hello! I am your digital security assistant. \
                        Send /new_case to report an incident.";
const HELP: &str = "Available commands:\n\
                    /start - Welcome message\n\
                    /new_case - Report a crime\n\
                    /cancel - Cancel the report in progress\n\
                    /check_number <number> - How often a phone number was reported\n\
                    /help - Show this list";
const CHECK_NUMBER_USAGE: &str = "Send /check_number followed by the phone number, \
                                  for example /check_number +573001234567.";
const CANCELLED: &str = "Report cancelled. You can start again with /new_case.";
const NOTHING_TO_CANCEL: &str = "There is no report in progress. Send /new_case to start one.";
const COMMIT_FAILED: &str = "Sorry, there was an error saving your report. \
                             Please try again later with /new_case.";
const ROUTING_FAILED: &str = "Sorry, we could not process your message right now. \
                              Please try again later.";

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Start,
  NewCase,
  Help,
  Cancel,
  /// Look up a phone number; carries the rest of the line, if any.
  CheckNumber(Option<String>),
  Unknown,
}

impl Command {
  /// Recognise a `/command` token, ignoring a trailing `@botname`. Only
  /// `/check_number` keeps its argument. Returns `None` for ordinary text.
  pub fn parse(text: &str) -> Option<Self> {
    let rest = text.trim().strip_prefix('/')?.trim_start();
    let (token, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if token.is_empty() {
      return None;
    }
    let name = token.split('@').next().unwrap_or(token).to_lowercase();
    Some(match name.as_str() {
      "start" => Self::Start,
      "new_case" | "nuevo_caso" => Self::NewCase,
      "help" => Self::Help,
      "cancel" => Self::Cancel,
      "check_number" | "consultar" => {
        let arg = arg.trim();
        Self::CheckNumber((!arg.is_empty()).then(|| arg.to_owned()))
      }
      _ => Self::Unknown,
    })
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What handling one inbound message did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Greeted,
  Help,
  DialogueStarted,
  Advanced { step: Step },
  Reprompted { step: Step },
  Committed { case_number: CaseNumber },
  /// Declined at confirmation or `/cancel`.
  Cancelled,
  /// Commit failed; the dialogue was closed as cancelled.
  CommitFailed,
  NothingToCancel,
  AppendedToCase { case_number: CaseNumber },
  /// Answered a `/check_number` lookup.
  NumberChecked { number: String, reports: u32 },
  /// `/check_number` without a usable phone number.
  NumberRejected,
  /// No dialogue and no open case; answered with the greeting.
  Unhandled,
  /// A repository lookup failed while routing.
  RoutingFailed,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct IntakeService<R, N> {
  repo:          Arc<R>,
  notifier:      Arc<N>,
  sessions:      SessionStore,
  machine:       IntakeMachine,
  clock:         Arc<dyn Clock>,
  reply_timeout: Duration,
}

fn repo_err<E: RepositoryError>(e: E) -> Error { Error::Repository(Box::new(e)) }

fn confirmation(case: &Case) -> String {
  format!(
    "Report saved. Your case number is {}.\n\nAn advisor has been notified \
     and may contact you here soon. Send /new_case to report another incident.",
    case.case_number
  )
}

impl<R, N> IntakeService<R, N>
where
  R: CaseRepository,
  N: Notifier,
{
  pub fn new(repo: Arc<R>, notifier: Arc<N>) -> Self {
    Self {
      repo,
      notifier,
      sessions: SessionStore::new(),
      machine: IntakeMachine::default(),
      clock: Arc::new(SystemClock),
      reply_timeout: DEFAULT_REPLY_TIMEOUT,
    }
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
    self.reply_timeout = timeout;
    self
  }

  pub fn repository(&self) -> &Arc<R> { &self.repo }

  pub fn sessions(&self) -> &SessionStore { &self.sessions }

  pub fn clock(&self) -> &dyn Clock { self.clock.as_ref() }

  /// Send `text` to `identity`. A failed send, or one still pending after
  /// the reply timeout, is logged and otherwise ignored.
  pub async fn deliver(&self, identity: &str, text: &str) {
    match tokio::time::timeout(self.reply_timeout, self.notifier.send(identity, text)).await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => tracing::warn!(%identity, error = %e, "reply delivery failed"),
      Err(_) => {
        tracing::warn!(%identity, timeout = ?self.reply_timeout, "reply delivery timed out")
      }
    }
  }

  // ── Routing ─────────────────────────────────────────────────────────────

  /// Handle one inbound text from `identity`.
  pub async fn handle(&self, identity: &Identity, text: &str) -> Outcome {
    let mut session = self.sessions.lock(&identity.external_id).await;

    if let Some(command) = Command::parse(text) {
      return self.run_command(command, &mut session).await;
    }
    if session.is_active() {
      return self.continue_dialogue(identity, &mut session, text).await;
    }
    self.route_to_case(identity, text).await
  }

  async fn run_command(&self, command: Command, session: &mut SessionGuard) -> Outcome {
    let identity = session.identity().to_owned();
    match command {
      Command::Start => {
        self.deliver(&identity, GREETING).await;
        Outcome::Greeted
      }
      Command::NewCase => {
        if session.is_active() {
          tracing::info!(%identity, "open dialogue discarded by a new start");
        }
        session.start(self.clock.now());
        tracing::info!(%identity, "dialogue started");
        self.deliver(&identity, self.machine.opening_prompt()).await;
        Outcome::DialogueStarted
      }
      Command::Help | Command::Unknown => {
        self.deliver(&identity, HELP).await;
        Outcome::Help
      }
      Command::Cancel => {
        if session.end().is_some() {
          tracing::info!(%identity, "dialogue cancelled by command");
          self.deliver(&identity, CANCELLED).await;
          Outcome::Cancelled
        } else {
          self.deliver(&identity, NOTHING_TO_CANCEL).await;
          Outcome::NothingToCancel
        }
      }
      Command::CheckNumber(arg) => self.check_number(&identity, arg.as_deref()).await,
    }
  }

  /// Answer a `/check_number` lookup. An open dialogue is left where it was.
  async fn check_number(&self, identity: &str, arg: Option<&str>) -> Outcome {
    let Some(number) = arg.and_then(normalize_phone) else {
      self.deliver(identity, CHECK_NUMBER_USAGE).await;
      return Outcome::NumberRejected;
    };
    match self.repo.find_reported_number(&number).await {
      Ok(found) => {
        let reports = found.map_or(0, |row| row.report_count);
        let reply = match reports {
          0 => format!("{number}: no reports."),
          1 => format!("{number}: reported 1 time."),
          n => format!("{number}: reported {n} times."),
        };
        self.deliver(identity, &reply).await;
        Outcome::NumberChecked { number, reports }
      }
      Err(e) => {
        tracing::error!(%identity, error = %e, "reported number lookup failed");
        self.deliver(identity, ROUTING_FAILED).await;
        Outcome::RoutingFailed
      }
    }
  }

  async fn continue_dialogue(
    &self,
    identity: &Identity,
    session: &mut SessionGuard,
    text: &str,
  ) -> Outcome {
    let id = identity.external_id.as_str();
    let today = self.clock.today();
    let Some(state) = session.get_mut(self.clock.now()) else {
      return self.route_to_case(identity, text).await;
    };

    let transition = match self.machine.advance(state, text, today) {
      Ok(t) => t,
      Err(e) => {
        session.end();
        tracing::error!(identity = %id, error = %e, "dialogue state is inconsistent");
        self.deliver(id, COMMIT_FAILED).await;
        return Outcome::CommitFailed;
      }
    };

    match transition {
      Transition::Advanced { step, prompt } => {
        self.deliver(id, &prompt).await;
        Outcome::Advanced { step }
      }
      Transition::Reprompt { step, message } => {
        tracing::debug!(identity = %id, %step, "input refused");
        self.deliver(id, &message).await;
        Outcome::Reprompted { step }
      }
      Transition::Declined => {
        session.end();
        tracing::info!(identity = %id, "dialogue declined at confirmation");
        self.deliver(id, CANCELLED).await;
        Outcome::Cancelled
      }
      Transition::Confirmed(record) => {
        session.end();
        match self.commit(identity, record).await {
          Ok(case) => {
            tracing::info!(identity = %id, case_number = %case.case_number, "case committed");
            self.deliver(id, &confirmation(&case)).await;
            Outcome::Committed { case_number: case.case_number }
          }
          Err(e) => {
            tracing::error!(identity = %id, error = %e, "case commit failed");
            self.deliver(id, COMMIT_FAILED).await;
            Outcome::CommitFailed
          }
        }
      }
    }
  }

  /// Append free text outside a dialogue to the sender's open case, if any.
  async fn route_to_case(&self, identity: &Identity, text: &str) -> Outcome {
    let id = identity.external_id.as_str();
    match self.append_to_open_case(identity, text).await {
      Ok(Some(case_number)) => {
        tracing::debug!(identity = %id, %case_number, "message appended to case");
        Outcome::AppendedToCase { case_number }
      }
      Ok(None) => {
        self.deliver(id, GREETING).await;
        Outcome::Unhandled
      }
      Err(e) => {
        tracing::error!(identity = %id, error = %e, "routing lookup failed");
        self.deliver(id, ROUTING_FAILED).await;
        Outcome::RoutingFailed
      }
    }
  }

  async fn append_to_open_case(
    &self,
    identity: &Identity,
    text: &str,
  ) -> Result<Option<CaseNumber>> {
    let Some(user) = self
      .repo
      .find_user_by_identity(&identity.external_id)
      .await
      .map_err(repo_err)?
    else {
      return Ok(None);
    };
    let Some(case) = self
      .repo
      .find_open_case_for_user(user.user_id)
      .await
      .map_err(repo_err)?
    else {
      return Ok(None);
    };

    self
      .repo
      .append_message(NewMessage {
        case_id:       case.case_id,
        sender_id:     Some(user.user_id),
        body:          text.to_owned(),
        from_operator: false,
        created_at:    self.clock.now(),
      })
      .await
      .map_err(repo_err)?;
    Ok(Some(case.case_number))
  }

  // ── Commit ──────────────────────────────────────────────────────────────

  /// Upsert the reporter and create their case in one repository
  /// transaction.
  ///
  /// Either both rows are written or neither is. A case-number collision
  /// draws a new number, up to [`MAX_CASE_NUMBER_ATTEMPTS`] times.
  pub async fn commit(&self, identity: &Identity, record: IntakeRecord) -> Result<Case> {
    let now = self.clock.now();
    for attempt in 1..=MAX_CASE_NUMBER_ATTEMPTS {
      let case_number = CaseNumber::generate(now.date_naive(), &mut OsRng);
      let input = IntakeCommit {
        identity:    identity.clone(),
        profile:     record.profile.clone(),
        case_number: case_number.clone(),
        category:    record.category,
        description: record.description.clone(),
        at:          now,
      };
      match self.repo.commit_intake(input).await {
        Ok((_, case)) => return Ok(case),
        Err(e) if e.is_duplicate_case_number() => {
          tracing::warn!(%case_number, attempt, "case number already taken");
        }
        Err(e) => return Err(repo_err(e)),
      }
    }
    Err(Error::CaseNumbersExhausted(MAX_CASE_NUMBER_ATTEMPTS))
  }

  // ── Operator side ───────────────────────────────────────────────────────

  /// Append an operator-authored message to a case and forward it to the
  /// reporter.
  pub async fn operator_reply(&self, case_number: &CaseNumber, body: &str) -> Result<Message> {
    let case = self
      .repo
      .find_case_by_number(case_number)
      .await
      .map_err(repo_err)?
      .ok_or_else(|| Error::CaseNotFound(case_number.to_string()))?;

    let message = self
      .repo
      .append_message(NewMessage {
        case_id:       case.case_id,
        sender_id:     None,
        body:          body.to_owned(),
        from_operator: true,
        created_at:    self.clock.now(),
      })
      .await
      .map_err(repo_err)?;

    match self.repo.get_user(case.user_id).await.map_err(repo_err)? {
      Some(user) => self.deliver(&user.identity, body).await,
      None => tracing::warn!(%case_number, "case has no reporter to notify"),
    }
    Ok(message)
  }

  pub async fn set_case_status(&self, case_number: &CaseNumber, status: CaseStatus) -> Result<Case> {
    let case = self
      .repo
      .find_case_by_number(case_number)
      .await
      .map_err(repo_err)?
      .ok_or_else(|| Error::CaseNotFound(case_number.to_string()))?;

    let updated = self
      .repo
      .update_case_status(case.case_id, status, self.clock.now())
      .await
      .map_err(repo_err)?
      .ok_or_else(|| Error::CaseNotFound(case_number.to_string()))?;
    tracing::info!(%case_number, %status, "case status changed");
    Ok(updated)
  }

  /// Count one more report of the phone number `raw`.
  pub async fn report_number(&self, raw: &str) -> Result<ReportedNumber> {
    let number = normalize_phone(raw).ok_or_else(|| Error::MalformedPhoneNumber(raw.to_owned()))?;
    let row = self
      .repo
      .record_reported_number(&number, self.clock.now())
      .await
      .map_err(repo_err)?;
    tracing::info!(number = %row.number, reports = row.report_count, "phone number reported");
    Ok(row)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, NaiveDate, Utc};

  use super::*;
  use crate::{
    clock::FixedClock,
    fakes::{MemoryRepository, RecordingNotifier},
    model::CrimeCategory,
  };

  type Service = IntakeService<MemoryRepository, RecordingNotifier>;

  fn now() -> DateTime<Utc> { DateTime::from_timestamp(1_736_510_400, 0).unwrap() } // 2025-01-10T12:00Z

  fn service() -> Service {
    IntakeService::new(
      Arc::new(MemoryRepository::default()),
      Arc::new(RecordingNotifier::default()),
    )
    .with_clock(FixedClock(now()))
  }

  fn u1() -> Identity { Identity::new("U1").with_handle("jane") }

  const ANSWERS: &[&str] = &[
    "Phishing",
    "Jane Doe",
    "12345",
    "40",
    "15/05/1984",
    "Main St",
    "Engineer",
    "+1000",
    "Lost funds via fake bank email",
  ];

  async fn run_to_confirm(svc: &Service, who: &Identity) {
    assert_eq!(svc.handle(who, "/new_case").await, Outcome::DialogueStarted);
    for answer in ANSWERS {
      let outcome = svc.handle(who, answer).await;
      assert!(matches!(outcome, Outcome::Advanced { .. }), "{answer:?}: {outcome:?}");
    }
  }

  fn case_number_in(text: &str) -> Option<CaseNumber> {
    let start = text.find("CASE-")?;
    text.get(start..start + 18)?.parse().ok()
  }

  // ── Scenarios ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn full_dialogue_commits_one_case() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;

    let outcome = svc.handle(&u1(), "si").await;
    let Outcome::Committed { case_number } = outcome else { panic!("{outcome:?}") };
    assert!(case_number.as_str().starts_with("CASE-20250110-"));

    let repo = svc.repository();
    let cases = repo.cases();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].category, CrimeCategory::Phishing);
    assert_eq!(cases[0].description, "Lost funds via fake bank email");
    assert_eq!(cases[0].status, CaseStatus::New);
    assert_eq!(cases[0].incident_at, now());

    let users = repo.users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].identity, "U1");
    assert_eq!(users[0].handle.as_deref(), Some("jane"));
    assert_eq!(users[0].profile.age, 40);
    assert_eq!(users[0].profile.phone_number, "+1000");

    let reply = svc.notifier.last_to("U1").unwrap();
    assert_eq!(case_number_in(&reply), Some(case_number));
    assert!(svc.sessions().get("U1").await.is_none());
  }

  #[tokio::test]
  async fn inconsistent_birth_date_is_reprompted() {
    let svc = service();
    svc.handle(&u1(), "/new_case").await;
    for answer in &ANSWERS[..4] {
      svc.handle(&u1(), answer).await;
    }

    let outcome = svc.handle(&u1(), "01/01/1995").await;
    assert_eq!(outcome, Outcome::Reprompted { step: Step::BirthDate });
    let reply = svc.notifier.last_to("U1").unwrap();
    assert!(reply.contains("40"), "{reply}");
    assert_eq!(svc.sessions().get("U1").await.unwrap().cursor(), 4);
  }

  #[tokio::test]
  async fn second_dialogue_updates_user_and_adds_case() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    svc.handle(&u1(), "si").await;

    svc.handle(&u1(), "/new_case").await;
    for answer in ANSWERS {
      let answer = if *answer == "Main St" { "Second Ave" } else { answer };
      svc.handle(&u1(), answer).await;
    }
    assert!(matches!(svc.handle(&u1(), "SI").await, Outcome::Committed { .. }));

    let users = svc.repository().users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].profile.address, "Second Ave");
    assert_eq!(svc.repository().cases().len(), 2);
  }

  #[tokio::test]
  async fn declining_touches_nothing() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;

    assert_eq!(svc.handle(&u1(), "no").await, Outcome::Cancelled);
    assert!(svc.repository().cases().is_empty());
    assert!(svc.repository().users().is_empty());
    assert!(svc.sessions().get("U1").await.is_none());
  }

  #[tokio::test]
  async fn restart_discards_partial_answers() {
    let svc = service();
    svc.handle(&u1(), "/new_case").await;
    svc.handle(&u1(), "Extortion").await;
    svc.handle(&u1(), "Someone Else").await;

    svc.handle(&u1(), "/new_case").await;
    let state = svc.sessions().get("U1").await.unwrap();
    assert_eq!(state.cursor(), 0);
    assert!(state.answers().is_empty());

    for answer in ANSWERS {
      svc.handle(&u1(), answer).await;
    }
    svc.handle(&u1(), "si").await;
    let cases = svc.repository().cases();
    assert_eq!(cases[0].category, CrimeCategory::Phishing);
    assert_eq!(svc.repository().users()[0].profile.full_name, "Jane Doe");
  }

  #[tokio::test]
  async fn cancel_command_ends_dialogue() {
    let svc = service();
    svc.handle(&u1(), "/new_case").await;
    svc.handle(&u1(), "Phishing").await;
    assert_eq!(svc.handle(&u1(), "/cancel").await, Outcome::Cancelled);
    assert!(svc.sessions().get("U1").await.is_none());
    assert_eq!(svc.handle(&u1(), "/cancel").await, Outcome::NothingToCancel);
  }

  #[tokio::test]
  async fn help_and_unknown_commands() {
    let svc = service();
    assert_eq!(svc.handle(&u1(), "/help").await, Outcome::Help);
    assert_eq!(svc.handle(&u1(), "/whatever").await, Outcome::Help);
    assert_eq!(svc.handle(&u1(), "/start").await, Outcome::Greeted);
    assert!(svc.notifier.last_to("U1").unwrap().contains("/new_case"));
  }

  // ── Routing ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn stray_message_without_case_is_unhandled() {
    let svc = service();
    assert_eq!(svc.handle(&u1(), "hello?").await, Outcome::Unhandled);
    assert!(svc.repository().messages().is_empty());
    assert!(svc.notifier.last_to("U1").unwrap().contains("/new_case"));
  }

  #[tokio::test]
  async fn stray_message_goes_to_open_case() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    let Outcome::Committed { case_number } = svc.handle(&u1(), "si").await else { panic!() };

    let outcome = svc.handle(&u1(), "I have more screenshots").await;
    assert_eq!(outcome, Outcome::AppendedToCase { case_number });

    let messages = svc.repository().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "I have more screenshots");
    assert!(!messages[0].from_operator);
    assert_eq!(messages[0].sender_id, Some(svc.repository().users()[0].user_id));
  }

  #[tokio::test]
  async fn closed_case_receives_nothing() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    let Outcome::Committed { case_number } = svc.handle(&u1(), "si").await else { panic!() };
    svc.set_case_status(&case_number, CaseStatus::Closed).await.unwrap();

    assert_eq!(svc.handle(&u1(), "anyone there?").await, Outcome::Unhandled);
    assert!(svc.repository().messages().is_empty());
  }

  #[tokio::test]
  async fn stray_message_picks_most_recent_open_case() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    svc.handle(&u1(), "si").await;
    run_to_confirm(&svc, &u1()).await;
    let Outcome::Committed { case_number: newest } = svc.handle(&u1(), "si").await else {
      panic!()
    };

    let outcome = svc.handle(&u1(), "update").await;
    assert_eq!(outcome, Outcome::AppendedToCase { case_number: newest });
  }

  // ── Failure handling ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn failed_upsert_creates_no_case_and_clears_session() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    svc.repository().fail_upserts(true);

    assert_eq!(svc.handle(&u1(), "si").await, Outcome::CommitFailed);
    assert!(svc.repository().cases().is_empty());
    assert!(svc.sessions().get("U1").await.is_none());
    assert!(svc.notifier.last_to("U1").unwrap().contains("error saving"));
  }

  #[tokio::test]
  async fn case_number_collision_is_retried() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    svc.repository().reject_case_numbers(MAX_CASE_NUMBER_ATTEMPTS - 1);

    assert!(matches!(svc.handle(&u1(), "si").await, Outcome::Committed { .. }));
    assert_eq!(svc.repository().cases().len(), 1);
  }

  #[tokio::test]
  async fn exhausted_case_numbers_fail_the_commit() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    svc.repository().reject_case_numbers(MAX_CASE_NUMBER_ATTEMPTS);

    assert_eq!(svc.handle(&u1(), "si").await, Outcome::CommitFailed);
    assert!(svc.repository().cases().is_empty());
    assert!(svc.repository().users().is_empty());
    assert!(svc.sessions().get("U1").await.is_none());
  }

  #[tokio::test]
  async fn failed_commit_keeps_previous_profile() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    svc.handle(&u1(), "si").await;

    svc.handle(&u1(), "/new_case").await;
    for answer in ANSWERS {
      let answer = if *answer == "Main St" { "Second Ave" } else { answer };
      svc.handle(&u1(), answer).await;
    }
    svc.repository().reject_case_numbers(MAX_CASE_NUMBER_ATTEMPTS);
    assert_eq!(svc.handle(&u1(), "si").await, Outcome::CommitFailed);

    let users = svc.repository().users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].profile.address, "Main St");
    assert_eq!(svc.repository().cases().len(), 1);
  }

  #[tokio::test]
  async fn notifier_failure_does_not_affect_dialogue() {
    let svc = service();
    svc.notifier.fail(true);
    run_to_confirm(&svc, &u1()).await;
    assert!(matches!(svc.handle(&u1(), "si").await, Outcome::Committed { .. }));
  }

  #[tokio::test]
  async fn stalled_notifier_does_not_hold_the_dialogue() {
    let svc = service().with_reply_timeout(Duration::from_millis(20));
    svc.notifier.stall(true);

    let run = async {
      run_to_confirm(&svc, &u1()).await;
      svc.handle(&u1(), "si").await
    };
    let outcome = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap();
    assert!(matches!(outcome, Outcome::Committed { .. }));
    assert_eq!(svc.repository().cases().len(), 1);
  }

  #[tokio::test]
  async fn stored_timestamps_come_from_the_clock() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    let Outcome::Committed { case_number } = svc.handle(&u1(), "si").await else { panic!() };
    svc.handle(&u1(), "more details").await;
    svc.operator_reply(&case_number, "noted").await.unwrap();
    let case = svc.set_case_status(&case_number, CaseStatus::InProgress).await.unwrap();

    let repo = svc.repository();
    let user = &repo.users()[0];
    assert_eq!((user.created_at, user.updated_at), (now(), now()));
    assert_eq!((case.created_at, case.updated_at), (now(), now()));
    assert!(repo.messages().iter().all(|m| m.created_at == now()));
  }

  #[tokio::test]
  async fn identities_do_not_share_dialogues() {
    let svc = service();
    let u2 = Identity::new("U2");
    svc.handle(&u1(), "/new_case").await;
    svc.handle(&u1(), "Phishing").await;

    assert_eq!(svc.handle(&u2, "Phishing").await, Outcome::Unhandled);
    assert_eq!(svc.sessions().get("U1").await.unwrap().cursor(), 1);
  }

  #[tokio::test]
  async fn concurrent_identities_commit_independently() {
    let svc = Arc::new(service());
    let mut tasks = Vec::new();
    for n in 0..8 {
      let svc = Arc::clone(&svc);
      tasks.push(tokio::spawn(async move {
        let who = Identity::new(format!("user-{n}"));
        run_to_confirm(&svc, &who).await;
        svc.handle(&who, "si").await
      }));
    }
    for task in tasks {
      assert!(matches!(task.await.unwrap(), Outcome::Committed { .. }));
    }
    assert_eq!(svc.repository().users().len(), 8);
    assert_eq!(svc.repository().cases().len(), 8);
  }

  // ── Operator side ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn operator_reply_is_stored_and_forwarded() {
    let svc = service();
    run_to_confirm(&svc, &u1()).await;
    let Outcome::Committed { case_number } = svc.handle(&u1(), "si").await else { panic!() };

    let message = svc.operator_reply(&case_number, "We are on it.").await.unwrap();
    assert!(message.from_operator);
    assert_eq!(message.sender_id, None);
    assert_eq!(svc.notifier.last_to("U1").as_deref(), Some("We are on it."));
  }

  // ── Reported numbers ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn check_number_counts_reports() {
    let svc = service();
    let outcome = svc.handle(&u1(), "/check_number +57 300 123 4567").await;
    assert_eq!(outcome, Outcome::NumberChecked { number: "+573001234567".into(), reports: 0 });
    assert!(svc.notifier.last_to("U1").unwrap().contains("no reports"));

    svc.report_number("+573001234567").await.unwrap();
    let row = svc.report_number("+57 (300) 123-4567").await.unwrap();
    assert_eq!(row.report_count, 2);
    assert_eq!(row.updated_at, now());

    let outcome = svc.handle(&u1(), "/consultar +573001234567").await;
    assert_eq!(outcome, Outcome::NumberChecked { number: "+573001234567".into(), reports: 2 });
    assert!(svc.notifier.last_to("U1").unwrap().contains("reported 2 times"));
  }

  #[tokio::test]
  async fn check_number_needs_a_number() {
    let svc = service();
    assert_eq!(svc.handle(&u1(), "/check_number").await, Outcome::NumberRejected);
    assert_eq!(svc.handle(&u1(), "/check_number abc").await, Outcome::NumberRejected);
    assert!(svc.notifier.last_to("U1").unwrap().contains("/check_number"));

    let err = svc.report_number("not a phone").await.unwrap_err();
    assert!(matches!(err, Error::MalformedPhoneNumber(_)));
  }

  #[tokio::test]
  async fn check_number_leaves_dialogue_in_place() {
    let svc = service();
    svc.handle(&u1(), "/new_case").await;
    svc.handle(&u1(), "Phishing").await;

    assert!(matches!(svc.handle(&u1(), "/check_number 555").await, Outcome::NumberChecked { .. }));
    assert_eq!(svc.sessions().get("U1").await.unwrap().cursor(), 1);
  }

  #[tokio::test]
  async fn operator_reply_to_unknown_case() {
    let svc = service();
    let number = CaseNumber::generate(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &mut OsRng);
    let err = svc.operator_reply(&number, "hi").await.unwrap_err();
    assert!(matches!(err, Error::CaseNotFound(_)));
  }

  #[test]
  fn command_parsing() {
    assert_eq!(Command::parse("/new_case"), Some(Command::NewCase));
    assert_eq!(Command::parse("  /NEW_CASE@casebot extra"), Some(Command::NewCase));
    assert_eq!(Command::parse("/nuevo_caso"), Some(Command::NewCase));
    assert_eq!(Command::parse("/cancel"), Some(Command::Cancel));
    assert_eq!(Command::parse("/"), None);
    assert_eq!(Command::parse("/foo"), Some(Command::Unknown));
    assert_eq!(Command::parse("new_case"), None);
    assert_eq!(Command::parse("si"), None);
    assert_eq!(Command::parse("/check_number"), Some(Command::CheckNumber(None)));
    assert_eq!(
      Command::parse("/check_number@casebot  +57 300 "),
      Some(Command::CheckNumber(Some("+57 300".into())))
    );
  }

  #[test]
  fn fixed_clock_date() {
    assert_eq!(FixedClock(now()).today(), NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
  }
}
