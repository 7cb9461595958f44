//! Outbound replies to channel participants.

use std::future::Future;

/// Delivers a text to an identity on the channel.
///
/// Delivery is fire-and-forget from the dialogue's point of view: callers log
/// a failed send and carry on. Implementations must not retry internally,
/// since the send runs while the recipient's session is locked.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    identity: &'a str,
    text: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
