//! Tutoring wizard state machine
//!
//! Implements the Elm Architecture pattern with pure stage transitions:
//! Intake -> Instructions -> ChatSession -> Reflection, with a one-step
//! "Previous" everywhere except Intake.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Action;
pub use state::{DocumentContext, Identity, SessionState, Stage, ValidationError};
pub use transition::{transition, TransitionError};
