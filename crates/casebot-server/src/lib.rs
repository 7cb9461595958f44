//! HTTP surface for casebot.
//!
//! Exposes an axum [`Router`] with the inbound channel webhook and the
//! operator review endpoints, backed by any [`CaseRepository`] and
//! [`Notifier`]. Operator auth and TLS are the deployment's responsibility.

pub mod cases;
pub mod channel;
pub mod error;
pub mod notify;
pub mod numbers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, patch, post},
};
use casebot_core::{intake::IntakeService, notify::Notifier, store::CaseRepository};
use chrono::TimeDelta;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use notify::NotifierKind;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CASEBOT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  #[serde(default = "default_idle_minutes")]
  pub session_idle_minutes: i64,
  #[serde(default)]
  pub notifier:             NotifierKind,
  #[serde(default)]
  pub notify_url:           Option<String>,
  #[serde(default = "default_reply_timeout_secs")]
  pub reply_timeout_secs:   u64,
}

fn default_idle_minutes() -> i64 { 30 }

fn default_reply_timeout_secs() -> u64 { 5 }

impl ServerConfig {
  pub fn session_idle(&self) -> TimeDelta { TimeDelta::minutes(self.session_idle_minutes) }

  /// How long a reply may hold up the reporter's next message.
  pub fn reply_timeout(&self) -> Duration { Duration::from_secs(self.reply_timeout_secs) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<R, N> {
  pub intake: Arc<IntakeService<R, N>>,
}

impl<R, N> Clone for AppState<R, N> {
  fn clone(&self) -> Self { Self { intake: Arc::clone(&self.intake) } }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the casebot [`Router`].
pub fn router<R, N>(state: AppState<R, N>) -> Router
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  Router::new()
    // Channel
    .route("/channel/messages", post(channel::receive::<R, N>))
    // Operator review
    .route("/api/cases/{case_number}", get(cases::get_one::<R, N>))
    .route(
      "/api/cases/{case_number}/messages",
      get(cases::list_messages::<R, N>).post(cases::reply::<R, N>),
    )
    .route("/api/cases/{case_number}/status", patch(cases::set_status::<R, N>))
    .route("/api/reported-numbers", post(numbers::report::<R, N>))
    .route("/api/reported-numbers/{number}", get(numbers::get_one::<R, N>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Session sweeper ─────────────────────────────────────────────────────────

/// Periodically drop dialogues idle for longer than `max_idle`.
pub fn spawn_session_sweeper<R, N>(
  intake: Arc<IntakeService<R, N>>,
  max_idle: TimeDelta,
  every: Duration,
) -> JoinHandle<()>
where
  R: CaseRepository + 'static,
  N: Notifier + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    loop {
      ticker.tick().await;
      let expired = intake.sessions().expire_idle(intake.clock().now(), max_idle);
      if expired > 0 {
        tracing::info!(expired, "idle dialogues expired");
      }
    }
  })
}
