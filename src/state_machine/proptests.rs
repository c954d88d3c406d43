//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Intake),
        Just(Stage::Instructions),
        Just(Stage::ChatSession),
        Just(Stage::Reflection),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Next), Just(Action::Previous)]
}

fn arb_field() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t\n]{1,4}",
        "[a-zA-Z0-9 ]{1,12}",
    ]
}

fn arb_identity() -> impl Strategy<Value = Identity> {
    (arb_field(), arb_field()).prop_map(|(id, name)| Identity::new(id, name))
}

/// The legal edges of the wizard
fn is_legal_edge(from: Stage, to: Stage) -> bool {
    from == to
        || matches!(
            (from, to),
            (Stage::Intake, Stage::Instructions)
                | (Stage::Instructions, Stage::ChatSession | Stage::Intake)
                | (Stage::ChatSession, Stage::Reflection | Stage::Instructions)
                | (Stage::Reflection, Stage::ChatSession)
        )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any action sequence only walks the legal edges
    #[test]
    fn prop_transitions_follow_edges(
        identity in arb_identity(),
        actions in proptest::collection::vec(arb_action(), 0..40),
    ) {
        let mut state = SessionState::new();
        state.set_identity(identity);
        for action in actions {
            let before = state.stage();
            match transition(before, state.identity(), action) {
                Ok(result) => {
                    prop_assert!(is_legal_edge(before, result.new_stage));
                    state.apply(result);
                }
                Err(TransitionError::Validation(_)) => {
                    prop_assert_eq!(before, Stage::Intake);
                    prop_assert_eq!(action, Action::Next);
                }
            }
            prop_assert!(Stage::ALL.contains(&state.stage()));
        }
    }

    /// Leaving Intake succeeds exactly when both identity fields are non-blank
    #[test]
    fn prop_intake_guard(identity in arb_identity()) {
        let result = transition(Stage::Intake, &identity, Action::Next);
        let complete = !identity.student_id.trim().is_empty()
            && !identity.student_name.trim().is_empty();
        prop_assert_eq!(result.is_ok(), complete);
        if let Ok(result) = result {
            prop_assert_eq!(result.new_stage, Stage::Instructions);
        }
    }

    /// Previous moves back exactly one step, never skipping
    #[test]
    fn prop_previous_is_one_step(stage in arb_stage(), identity in arb_identity()) {
        let result = transition(stage, &identity, Action::Previous).unwrap();
        let expected = if stage == Stage::Intake { 1 } else { stage.step() - 1 };
        prop_assert_eq!(result.new_stage.step(), expected);
    }

    /// Entering Reflection always starts a fresh summary/save cycle
    #[test]
    fn prop_reflection_entry_resets_cycle(
        summary in "[a-z ]{1,20}",
        persisted in any::<bool>(),
    ) {
        let mut state = SessionState::new();
        state.set_identity(Identity::new("42", "Ada"));
        for _ in 0..2 {
            let r = transition(state.stage(), state.identity(), Action::Next).unwrap();
            state.apply(r);
        }
        prop_assert_eq!(state.stage(), Stage::ChatSession);

        let enter = transition(state.stage(), state.identity(), Action::Next).unwrap();
        let pending = state.apply(enter);
        prop_assert_eq!(pending, vec![Effect::SynthesizeFeedback]);
        prop_assert!(!state.persisted());

        state.set_feedback_summary(summary);
        if persisted {
            state.mark_persisted();
        }

        let back = transition(state.stage(), state.identity(), Action::Previous).unwrap();
        let pending = state.apply(back);
        prop_assert!(pending.is_empty());
        prop_assert_eq!(state.feedback_summary(), None);
        prop_assert!(!state.persisted());
    }
}
