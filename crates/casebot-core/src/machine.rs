//! The intake state machine.
//!
//! [`IntakeMachine::advance`] is synchronous and side-effect free apart from
//! mutating the [`ConversationState`] it is given. Persisting the outcome and
//! replying to the reporter is the caller's job.

use chrono::NaiveDate;

use crate::{
  Error, Result,
  conversation::ConversationState,
  model::{CrimeCategory, UserProfile},
  step::{STANDARD_STEPS, Step, StepInput, StepSpec},
  validate::Answer,
};

/// Replies accepted as "yes" at the confirmation step, compared after
/// trimming and lowercasing.
pub const AFFIRMATIVE_TOKENS: &[&str] = &["si", "sí", "yes"];

/// Everything a completed dialogue hands to case commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRecord {
  pub category:    CrimeCategory,
  pub profile:     UserProfile,
  pub description: String,
}

impl IntakeRecord {
  pub fn from_state(state: &ConversationState) -> Result<Self> {
    let get = |step: Step| state.answer(step).ok_or(Error::MissingAnswer(step));
    let text = |step: Step| -> Result<String> {
      get(step)?
        .as_text()
        .map(str::to_owned)
        .ok_or(Error::AnswerKind(step))
    };

    let category = get(Step::CrimeType)?
      .as_crime()
      .ok_or(Error::AnswerKind(Step::CrimeType))?;
    let age = get(Step::Age)?
      .as_integer()
      .and_then(|a| u8::try_from(a).ok())
      .ok_or(Error::AnswerKind(Step::Age))?;
    let birth_date = get(Step::BirthDate)?
      .as_date()
      .ok_or(Error::AnswerKind(Step::BirthDate))?;

    Ok(Self {
      category,
      profile: UserProfile {
        full_name: text(Step::FullName)?,
        id_number: text(Step::IdNumber)?,
        age,
        birth_date,
        address: text(Step::Address)?,
        profession: text(Step::Profession)?,
        phone_number: text(Step::PhoneNumber)?,
      },
      description: text(Step::IncidentDescription)?,
    })
  }
}

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
  /// The input was recorded; `step` is now awaiting input.
  Advanced { step: Step, prompt: String },
  /// The input was refused and nothing was recorded.
  Reprompt { step: Step, message: String },
  /// Affirmative confirmation. The dialogue is over and must be committed.
  Confirmed(IntakeRecord),
  /// Anything else at confirmation. The dialogue is over with no effect.
  Declined,
}

#[derive(Debug, Clone, Copy)]
pub struct IntakeMachine {
  steps: &'static [StepSpec],
}

impl Default for IntakeMachine {
  fn default() -> Self { Self::new(STANDARD_STEPS) }
}

impl IntakeMachine {
  pub fn new(steps: &'static [StepSpec]) -> Self { Self { steps } }

  pub fn steps(&self) -> &'static [StepSpec] { self.steps }

  /// The step awaiting input in `state`, if any.
  pub fn current(&self, state: &ConversationState) -> Option<&'static StepSpec> {
    self.steps.get(state.cursor())
  }

  /// The prompt sent when a fresh dialogue starts.
  pub fn opening_prompt(&self) -> &'static str {
    self.steps.first().map(|s| s.prompt).unwrap_or_default()
  }

  pub fn advance(
    &self,
    state: &mut ConversationState,
    input: &str,
    today: NaiveDate,
  ) -> Result<Transition> {
    let spec = self
      .current(state)
      .ok_or(Error::DialogueOverrun(state.cursor()))?;

    let (validator, cross_check) = match spec.input {
      StepInput::Field { validator, cross_check } => (validator, cross_check),
      StepInput::Confirmation => {
        let token = input.trim().to_lowercase();
        return if AFFIRMATIVE_TOKENS.contains(&token.as_str()) {
          IntakeRecord::from_state(state).map(Transition::Confirmed)
        } else {
          Ok(Transition::Declined)
        };
      }
    };

    let answer = match validator.validate(input, today) {
      Ok(answer) => answer,
      Err(e) => {
        return Ok(Transition::Reprompt {
          step:    spec.step,
          message: format!("Sorry, {e}.\n\n{}", spec.prompt),
        });
      }
    };

    if let Some(check) = cross_check
      && let Err(e) = check.check(state, &answer, today)
    {
      return Ok(Transition::Reprompt {
        step:    spec.step,
        message: format!("Sorry, {e}."),
      });
    }

    tracing::debug!(step = %spec.step, "answer recorded");
    state.record(spec.step, answer);

    let next = self
      .current(state)
      .ok_or(Error::DialogueOverrun(state.cursor()))?;
    let prompt = match next.input {
      StepInput::Confirmation => format!("{}\n\n{}", self.summary(state), next.prompt),
      StepInput::Field { .. } => next.prompt.to_owned(),
    };
    Ok(Transition::Advanced { step: next.step, prompt })
  }

  /// A review of every recorded answer, one per line.
  pub fn summary(&self, state: &ConversationState) -> String {
    let mut out = String::from("Please review your report:\n");
    for (step, answer) in state.answers() {
      let label = self
        .steps
        .iter()
        .find(|s| s.step == *step)
        .map(|s| s.label)
        .unwrap_or_else(|| step.as_ref());
      out.push_str(&format!("\n{label}: {answer}"));
    }
    out
  }
}
