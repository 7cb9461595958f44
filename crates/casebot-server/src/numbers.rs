//! Operator endpoints for phone numbers reported as used in a crime.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/reported-numbers` | Body: `{"number":".."}`; adds one report |
//! | `GET`  | `/api/reported-numbers/{number}` | Count is `0` for unknown numbers |
//!
//! Numbers are normalized before lookup, so `+57 300-123` and `+57300123`
//! share a row.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use casebot_core::{model::normalize_phone, notify::Notifier, store::CaseRepository};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReportBody {
  pub number: String,
}

#[derive(Debug, Serialize)]
pub struct NumberView {
  pub number:       String,
  pub report_count: u32,
}

/// `POST /api/reported-numbers`
pub async fn report<R, N>(
  State(state): State<AppState<R, N>>,
  Json(body): Json<ReportBody>,
) -> Result<impl IntoResponse, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  let row = state.intake.report_number(&body.number).await?;
  let view = NumberView { number: row.number, report_count: row.report_count };
  Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/reported-numbers/{number}`
pub async fn get_one<R, N>(
  State(state): State<AppState<R, N>>,
  Path(raw): Path<String>,
) -> Result<Json<NumberView>, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  let number = normalize_phone(&raw)
    .ok_or_else(|| ApiError::BadRequest(format!("malformed phone number: {raw:?}")))?;
  let report_count = state
    .intake
    .repository()
    .find_reported_number(&number)
    .await
    .map_err(ApiError::store)?
    .map_or(0, |row| row.report_count);
  Ok(Json(NumberView { number, report_count }))
}
