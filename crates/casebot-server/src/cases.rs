//! Operator review endpoints under `/api/cases`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/api/cases/{case_number}` | Case plus its reporter |
//! | `GET`   | `/api/cases/{case_number}/messages` | Thread in creation order |
//! | `POST`  | `/api/cases/{case_number}/messages` | Body: `{"body":".."}`; forwarded to the reporter |
//! | `PATCH` | `/api/cases/{case_number}/status` | Body: `{"status":"in_progress"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use casebot_core::{
  case_number::CaseNumber,
  model::{Case, CaseStatus, Message, User},
  notify::Notifier,
  store::CaseRepository,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

fn parse_number(raw: &str) -> Result<CaseNumber, ApiError> { Ok(raw.parse::<CaseNumber>()?) }

async fn load_case<R: CaseRepository>(repo: &R, number: &CaseNumber) -> Result<Case, ApiError> {
  repo
    .find_case_by_number(number)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("case {number} not found")))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CaseView {
  #[serde(flatten)]
  pub case:     Case,
  pub reporter: Option<User>,
}

/// `GET /api/cases/{case_number}`
pub async fn get_one<R, N>(
  State(state): State<AppState<R, N>>,
  Path(number): Path<String>,
) -> Result<Json<CaseView>, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  let number = parse_number(&number)?;
  let repo = state.intake.repository();
  let case = load_case(repo.as_ref(), &number).await?;
  let reporter = repo.get_user(case.user_id).await.map_err(ApiError::store)?;
  Ok(Json(CaseView { case, reporter }))
}

// ─── Messages ────────────────────────────────────────────────────────────────

/// `GET /api/cases/{case_number}/messages`
pub async fn list_messages<R, N>(
  State(state): State<AppState<R, N>>,
  Path(number): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  let number = parse_number(&number)?;
  let repo = state.intake.repository();
  let case = load_case(repo.as_ref(), &number).await?;
  let thread = repo.list_messages(case.case_id).await.map_err(ApiError::store)?;
  Ok(Json(thread))
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
  pub body: String,
}

/// `POST /api/cases/{case_number}/messages`
pub async fn reply<R, N>(
  State(state): State<AppState<R, N>>,
  Path(number): Path<String>,
  Json(body): Json<ReplyBody>,
) -> Result<impl IntoResponse, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  let number = parse_number(&number)?;
  if body.body.trim().is_empty() {
    return Err(ApiError::BadRequest("message body must not be empty".into()));
  }
  let message = state.intake.operator_reply(&number, &body.body).await?;
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: CaseStatus,
}

/// `PATCH /api/cases/{case_number}/status`
pub async fn set_status<R, N>(
  State(state): State<AppState<R, N>>,
  Path(number): Path<String>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Case>, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  let number = parse_number(&number)?;
  let case = state.intake.set_case_status(&number, body.status).await?;
  Ok(Json(case))
}
