//! The in-flight state of one dialogue.

use serde::{Deserialize, Serialize};

use crate::{step::Step, validate::Answer};

/// Position in the step list plus the answers accepted so far.
///
/// An answer is only ever recorded after it passed its validator and any
/// cross-check, so `answers` holds validated values in step order and
/// `cursor == answers.len()` at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
  cursor:  usize,
  answers: Vec<(Step, Answer)>,
}

impl ConversationState {
  pub fn new() -> Self { Self::default() }

  /// Index into the step list of the step awaiting input.
  pub fn cursor(&self) -> usize { self.cursor }

  pub fn answer(&self, step: Step) -> Option<&Answer> {
    self
      .answers
      .iter()
      .find(|(s, _)| *s == step)
      .map(|(_, a)| a)
  }

  pub fn answers(&self) -> &[(Step, Answer)] { &self.answers }

  /// Store the answer for the current step and move to the next one.
  pub fn record(&mut self, step: Step, answer: Answer) {
    self.answers.push((step, answer));
    self.cursor += 1;
  }
}
