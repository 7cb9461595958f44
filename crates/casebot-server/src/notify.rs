//! Outbound notifiers: how replies leave the server.
//!
//! [`LogNotifier`] only traces the reply, which is enough for local runs.
//! [`WebhookNotifier`] POSTs `{"identity": .., "text": ..}` to a channel
//! adapter. Neither retries; a failed send is the caller's to log.

use std::{convert::Infallible, time::Duration};

use casebot_core::notify::Notifier;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for one webhook request. Replies are sent while the
/// reporter's session is locked, and the intake service gives up on a reply
/// after its own `reply_timeout`, whichever comes first.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("webhook request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("the webhook notifier needs `notify_url`")]
  MissingUrl,
}

/// Which notifier the server is configured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
  #[default]
  Log,
  Webhook,
}

// ─── Log ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = Infallible;

  async fn send(&self, identity: &str, text: &str) -> Result<(), Infallible> {
    tracing::info!(%identity, %text, "reply");
    Ok(())
  }
}

// ─── Webhook ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Outbound<'a> {
  identity: &'a str,
  text:     &'a str,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: Client,
  url:    String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
    let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl Notifier for WebhookNotifier {
  type Error = NotifyError;

  async fn send(&self, identity: &str, text: &str) -> Result<(), NotifyError> {
    self
      .client
      .post(&self.url)
      .json(&Outbound { identity, text })
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}

// ─── Configured ──────────────────────────────────────────────────────────────

/// The notifier picked at startup from [`NotifierKind`].
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
  Log(LogNotifier),
  Webhook(WebhookNotifier),
}

impl ConfiguredNotifier {
  pub fn from_config(kind: NotifierKind, url: Option<&str>) -> Result<Self, NotifyError> {
    match kind {
      NotifierKind::Log => Ok(Self::Log(LogNotifier)),
      NotifierKind::Webhook => {
        let url = url.ok_or(NotifyError::MissingUrl)?;
        Ok(Self::Webhook(WebhookNotifier::new(url)?))
      }
    }
  }
}

impl Notifier for ConfiguredNotifier {
  type Error = NotifyError;

  async fn send(&self, identity: &str, text: &str) -> Result<(), NotifyError> {
    match self {
      Self::Log(n) => n.send(identity, text).await.map_err(|never| match never {}),
      Self::Webhook(n) => n.send(identity, text).await,
    }
  }
}
