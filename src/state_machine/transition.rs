//! Pure stage transition function
//!
//! Given the same stage, identity, and action it always produces the same
//! result, with no I/O side effects. The session controller applies the
//! result and executes the effects.

use super::{Action, Effect, Identity, Stage, ValidationError};
use thiserror::Error;

/// Result of a stage transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_stage: Stage,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(stage: Stage) -> Self {
        Self {
            new_stage: stage,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Pure transition function.
///
/// Unmapped `(stage, action)` pairs are ignored: the result keeps the
/// current stage and carries no effects.
pub fn transition(
    stage: Stage,
    identity: &Identity,
    action: Action,
) -> Result<TransitionResult, TransitionError> {
    match (stage, action) {
        // Intake + Next -> Instructions, guarded by a complete identity
        (Stage::Intake, Action::Next) => {
            identity.validate()?;
            Ok(TransitionResult::new(Stage::Instructions))
        }

        (Stage::Instructions, Action::Next) => Ok(TransitionResult::new(Stage::ChatSession)),
        (Stage::Instructions, Action::Previous) => Ok(TransitionResult::new(Stage::Intake)),

        // ChatSession + Next -> Reflection, starting a fresh summary/save cycle
        (Stage::ChatSession, Action::Next) => Ok(TransitionResult::new(Stage::Reflection)
            .with_effect(Effect::ResetPersisted)
            .with_effect(Effect::SynthesizeFeedback)),
        (Stage::ChatSession, Action::Previous) => Ok(TransitionResult::new(Stage::Instructions)),

        // Reflection + Previous -> ChatSession; a later re-entry must not
        // show the stale summary
        (Stage::Reflection, Action::Previous) => Ok(TransitionResult::new(Stage::ChatSession)
            .with_effect(Effect::DiscardFeedbackSummary)
            .with_effect(Effect::ResetPersisted)),

        (Stage::Intake, Action::Previous) | (Stage::Reflection, Action::Next) => {
            Ok(TransitionResult::new(stage))
        }
    }
}
