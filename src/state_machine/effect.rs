//! Effects produced by stage transitions

/// Effects to be carried out after a stage transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a new summary/save cycle
    ResetPersisted,

    /// Drop the summary so the next Reflection entry regenerates it
    DiscardFeedbackSummary,

    /// Generate the feedback summary and hand it to persistence
    SynthesizeFeedback,
}
