//! Navigation actions the student can take

use serde::{Deserialize, Serialize};

/// Wizard navigation buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Next,
    Previous,
}
