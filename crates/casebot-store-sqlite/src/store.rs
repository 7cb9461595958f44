//! [`SqliteStore`]: the SQLite implementation of [`CaseRepository`].

use std::path::Path;

use casebot_core::{
  case_number::CaseNumber,
  model::{
    Case, CaseStatus, Identity, IntakeCommit, Message, NewCase, NewMessage, ReportedNumber, User,
    UserProfile,
  },
  store::CaseRepository,
};
use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension as _, types::Type};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CASE_COLUMNS, MESSAGE_COLUMNS, REPORTED_NUMBER_COLUMNS, RawCase, RawMessage,
    RawReportedNumber, RawUser, USER_COLUMNS, encode_date, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A case repository backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// `true` if `e` is the UNIQUE violation on `cases.case_number`.
fn is_case_number_conflict(e: &rusqlite::Error) -> bool {
  match e {
    rusqlite::Error::SqliteFailure(err, Some(msg)) => {
      err.code == ErrorCode::ConstraintViolation && msg.contains("cases.case_number")
    }
    _ => false,
  }
}

/// Parse a UUID column inside a connection closure.
fn uuid_column(s: &str) -> rusqlite::Result<Uuid> {
  Uuid::parse_str(s)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn new_case_row(input: NewCase) -> Case {
  Case {
    case_id:     Uuid::new_v4(),
    case_number: input.case_number,
    user_id:     input.user_id,
    category:    input.category,
    status:      CaseStatus::New,
    description: input.description,
    incident_at: input.incident_at,
    created_at:  input.created_at,
    updated_at:  input.created_at,
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────
//
// Shared by the single-operation methods and `commit_intake`, which runs them
// on one transaction.

fn upsert_user_on(
  conn: &rusqlite::Connection,
  identity: &Identity,
  profile: &UserProfile,
  at: DateTime<Utc>,
) -> rusqlite::Result<RawUser> {
  conn.execute(
    "INSERT INTO users (
       user_id, identity, handle, full_name, id_number, age, birth_date,
       address, profession, phone_number, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
     ON CONFLICT (identity) DO UPDATE SET
       handle       = COALESCE(excluded.handle, users.handle),
       full_name    = excluded.full_name,
       id_number    = excluded.id_number,
       age          = excluded.age,
       birth_date   = excluded.birth_date,
       address      = excluded.address,
       profession   = excluded.profession,
       phone_number = excluded.phone_number,
       updated_at   = excluded.updated_at",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      identity.external_id,
      identity.handle,
      profile.full_name,
      profile.id_number,
      profile.age,
      encode_date(profile.birth_date),
      profile.address,
      profile.profession,
      profile.phone_number,
      encode_dt(at),
    ],
  )?;
  conn.query_row(
    &format!("SELECT {USER_COLUMNS} FROM users WHERE identity = ?1"),
    rusqlite::params![identity.external_id],
    RawUser::from_row,
  )
}

/// `Ok(false)` if the case number is already taken.
fn insert_case_on(conn: &rusqlite::Connection, case: &Case) -> rusqlite::Result<bool> {
  let result = conn.execute(
    "INSERT INTO cases (
       case_id, case_number, user_id, category, status,
       description, incident_at, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(case.case_id),
      case.case_number.as_str(),
      encode_uuid(case.user_id),
      case.category.as_ref(),
      case.status.as_ref(),
      case.description,
      encode_dt(case.incident_at),
      encode_dt(case.created_at),
      encode_dt(case.updated_at),
    ],
  );
  match result {
    Ok(_) => Ok(true),
    Err(e) if is_case_number_conflict(&e) => Ok(false),
    Err(e) => Err(e),
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn case_where(&self, clause: &'static str, param: String) -> Result<Option<Case>> {
    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE {clause}");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![param], RawCase::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCase::into_case).transpose()
  }
}

// ─── CaseRepository impl ─────────────────────────────────────────────────────

impl CaseRepository for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn find_user_by_identity(&self, identity: &str) -> Result<Option<User>> {
    let identity = identity.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE identity = ?1"),
              rusqlite::params![identity],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn upsert_user(
    &self,
    identity: &Identity,
    profile: UserProfile,
    at: DateTime<Utc>,
  ) -> Result<User> {
    let identity = identity.clone();

    let raw: RawUser = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = upsert_user_on(&tx, &identity, &profile, at)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_user()
  }

  // ── Cases ─────────────────────────────────────────────────────────────────

  async fn create_case(&self, input: NewCase) -> Result<Case> {
    let case = new_case_row(input);

    let inserted: bool = {
      let case = case.clone();
      self
        .conn
        .call(move |conn| Ok(insert_case_on(conn, &case)?))
        .await?
    };

    if !inserted {
      return Err(Error::DuplicateCaseNumber(case.case_number));
    }
    Ok(case)
  }

  async fn commit_intake(&self, input: IntakeCommit) -> Result<(User, Case)> {
    let taken = input.case_number.clone();

    // A transaction dropped without `commit` rolls back, so a refused case
    // insert also undoes the upsert.
    let committed: Option<(RawUser, Case)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = upsert_user_on(&tx, &input.identity, &input.profile, input.at)?;
        let case = new_case_row(NewCase {
          case_number: input.case_number,
          user_id:     uuid_column(&raw.user_id)?,
          category:    input.category,
          description: input.description,
          incident_at: input.at,
          created_at:  input.at,
        });
        if !insert_case_on(&tx, &case)? {
          return Ok(None);
        }
        tx.commit()?;
        Ok(Some((raw, case)))
      })
      .await?;

    let (raw, case) = committed.ok_or(Error::DuplicateCaseNumber(taken))?;
    Ok((raw.into_user()?, case))
  }

  async fn find_open_case_for_user(&self, user_id: Uuid) -> Result<Option<Case>> {
    let status = CaseStatus::Closed.as_ref().to_owned();
    let user_str = encode_uuid(user_id);

    let raw: Option<RawCase> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CASE_COLUMNS} FROM cases
                 WHERE user_id = ?1 AND status != ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
              ),
              rusqlite::params![user_str, status],
              RawCase::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCase::into_case).transpose()
  }

  async fn find_case_by_number(&self, case_number: &CaseNumber) -> Result<Option<Case>> {
    self
      .case_where("case_number = ?1", case_number.as_str().to_owned())
      .await
  }

  async fn update_case_status(
    &self,
    case_id: Uuid,
    status: CaseStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Case>> {
    let id_str     = encode_uuid(case_id);
    let status_str = status.as_ref().to_owned();
    let at_str     = encode_dt(at);

    let changed = {
      let id_str = id_str.clone();
      self
        .conn
        .call(move |conn| {
          Ok(conn.execute(
            "UPDATE cases SET status = ?1, updated_at = ?2 WHERE case_id = ?3",
            rusqlite::params![status_str, at_str, id_str],
          )?)
        })
        .await?
    };

    if changed == 0 {
      return Ok(None);
    }
    self.case_where("case_id = ?1", id_str).await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn append_message(&self, input: NewMessage) -> Result<Message> {
    let message = Message {
      message_id:    Uuid::new_v4(),
      case_id:       input.case_id,
      sender_id:     input.sender_id,
      body:          input.body,
      from_operator: input.from_operator,
      created_at:    input.created_at,
    };

    let id_str     = encode_uuid(message.message_id);
    let case_str   = encode_uuid(message.case_id);
    let sender_str = message.sender_id.map(encode_uuid);
    let body       = message.body.clone();
    let operator   = message.from_operator;
    let at_str     = encode_dt(message.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (message_id, case_id, sender_id, body, from_operator, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, case_str, sender_str, body, operator, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(message)
  }

  async fn list_messages(&self, case_id: Uuid) -> Result<Vec<Message>> {
    let case_str = encode_uuid(case_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE case_id = ?1
           ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![case_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  // ── Reported numbers ──────────────────────────────────────────────────────

  async fn find_reported_number(&self, number: &str) -> Result<Option<ReportedNumber>> {
    let number = number.to_owned();

    let raw: Option<RawReportedNumber> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {REPORTED_NUMBER_COLUMNS} FROM reported_numbers WHERE number = ?1"
              ),
              rusqlite::params![number],
              RawReportedNumber::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReportedNumber::into_reported_number).transpose()
  }

  async fn record_reported_number(
    &self,
    number: &str,
    at: DateTime<Utc>,
  ) -> Result<ReportedNumber> {
    let number = number.to_owned();
    let at_str = encode_dt(at);

    let raw: RawReportedNumber = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO reported_numbers (number, report_count, updated_at)
             VALUES (?1, 1, ?2)
             ON CONFLICT (number) DO UPDATE SET
               report_count = reported_numbers.report_count + 1,
               updated_at   = excluded.updated_at
             RETURNING {REPORTED_NUMBER_COLUMNS}"
          ),
          rusqlite::params![number, at_str],
          RawReportedNumber::from_row,
        )?)
      })
      .await?;

    raw.into_reported_number()
  }
}
