//! Core types and the conversational intake engine for casebot.
//!
//! Nothing here speaks HTTP or SQL. Persistence and the outbound channel are
//! reached through the [`store::CaseRepository`] and [`notify::Notifier`]
//! traits; the server crate supplies both.

// Trait methods spell out their `Send` futures; impls may use `async fn`.
#![allow(async_fn_in_trait)]

pub mod case_number;
pub mod clock;
pub mod conversation;
pub mod cross_check;
pub mod error;
pub mod intake;
pub mod machine;
pub mod model;
pub mod notify;
pub mod session;
pub mod step;
pub mod store;
pub mod validate;

pub use error::{Error, Result};

#[cfg(test)]
mod fakes;
