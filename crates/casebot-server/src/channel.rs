//! Inbound channel webhook.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/channel/messages` | Body: `{"identity":"..","handle":"..","text":".."}` |
//!
//! The channel adapter posts every message a participant sends. Replies go
//! out through the configured notifier; the response body only reports what
//! the router did with the message.

use axum::{Json, extract::State};
use casebot_core::{
  intake::Outcome,
  model::Identity,
  notify::Notifier,
  store::CaseRepository,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
  pub identity: String,
  #[serde(default)]
  pub handle:   Option<String>,
  pub text:     String,
}

/// `POST /channel/messages`
pub async fn receive<R, N>(
  State(state): State<AppState<R, N>>,
  Json(body): Json<InboundMessage>,
) -> Result<Json<Outcome>, ApiError>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  if body.identity.trim().is_empty() {
    return Err(ApiError::BadRequest("identity must not be empty".into()));
  }

  let identity = Identity { external_id: body.identity, handle: body.handle };
  let outcome = state.intake.handle(&identity, &body.text).await;
  Ok(Json(outcome))
}
