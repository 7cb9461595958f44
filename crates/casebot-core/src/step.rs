//! Step descriptors. The dialogue is this table walked by index; nothing
//! about the order lives in code.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{cross_check::CrossCheck, validate::Validator};

/// Name of a dialogue step.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
  CrimeType,
  FullName,
  IdNumber,
  Age,
  BirthDate,
  Address,
  Profession,
  PhoneNumber,
  IncidentDescription,
  Confirm,
}

/// What a step does with the text it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepInput {
  /// Validate and record a value, optionally cross-checked against an
  /// earlier answer.
  Field {
    validator:   Validator,
    cross_check: Option<CrossCheck>,
  },
  /// Yes/no gate that ends the dialogue.
  Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
  pub step:   Step,
  pub input:  StepInput,
  /// Shown when the dialogue arrives at this step.
  pub prompt: &'static str,
  /// Short name used in the confirmation summary.
  pub label:  &'static str,
}

const fn field(
  step: Step,
  validator: Validator,
  label: &'static str,
  prompt: &'static str,
) -> StepSpec {
  StepSpec {
    step,
    input: StepInput::Field { validator, cross_check: None },
    prompt,
    label,
  }
}

/// Bounds for the age step.
pub const AGE_RANGE: (i64, i64) = (1, 99);

/// The reporting dialogue, in order.
pub const STANDARD_STEPS: &[StepSpec] = &[
  field(
    Step::CrimeType,
    Validator::CrimeChoice,
    "Type",
    "Welcome to the cybercrime victim assistance service. I will help you \
     register your case safely.\n\nWhat kind of crime do you want to report? \
     (Phishing, WhatsApp hack, email hack, extortion, or other)",
  ),
  field(
    Step::FullName,
    Validator::FreeText,
    "Name",
    "Understood. Let's start with your personal details.\n\nPlease enter your \
     full name:",
  ),
  field(
    Step::IdNumber,
    Validator::FreeText,
    "ID number",
    "Thank you. Now enter your national ID or identification number:",
  ),
  field(
    Step::Age,
    Validator::IntegerInRange { min: AGE_RANGE.0, max: AGE_RANGE.1 },
    "Age",
    "How old are you? (numbers only)",
  ),
  StepSpec {
    step:   Step::BirthDate,
    input:  StepInput::Field {
      validator:   Validator::DateInFormat,
      cross_check: Some(CrossCheck::AgeMatchesBirthDate),
    },
    prompt: "What is your date of birth? (DD/MM/YYYY)",
    label:  "Birth date",
  },
  field(
    Step::Address,
    Validator::FreeText,
    "Address",
    "What is your home address?",
  ),
  field(
    Step::Profession,
    Validator::FreeText,
    "Profession",
    "What is your profession or occupation?",
  ),
  field(
    Step::PhoneNumber,
    Validator::FreeText,
    "Phone",
    "What phone number can an advisor reach you on?",
  ),
  field(
    Step::IncidentDescription,
    Validator::FreeText,
    "Description",
    "Finally, describe what happened in as much detail as you can:",
  ),
  StepSpec {
    step:   Step::Confirm,
    input:  StepInput::Confirmation,
    prompt: "Reply \"si\" to submit your report, or anything else to cancel it.",
    label:  "Confirm",
  },
];
