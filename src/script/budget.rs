//! Resource ceilings for snippet execution

use super::ScriptError;
use std::time::{Duration, Instant};

/// Steps between wall-clock checks
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Hard limits applied to a single snippet run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Work units: one per evaluated node plus one per array element touched
    pub max_steps: u64,
    pub max_array_len: usize,
    pub max_call_depth: usize,
    pub max_source_chars: usize,
    pub timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 5_000_000,
            max_array_len: 100_000,
            max_call_depth: 64,
            max_source_chars: 20_000,
            timeout: Duration::from_secs(5),
        }
    }
}

impl Limits {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Running tally against the limits
#[derive(Debug)]
pub struct Budget {
    limits: Limits,
    steps: u64,
    deadline: Instant,
    depth: usize,
}

impl Budget {
    pub fn new(limits: Limits) -> Self {
        let deadline = Instant::now() + limits.timeout;
        Self {
            limits,
            steps: 0,
            deadline,
            depth: 0,
        }
    }

    pub fn charge(&mut self, units: usize) -> Result<(), ScriptError> {
        let before = self.steps;
        self.steps = self.steps.saturating_add(units as u64);
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::Resource(format!(
                "step limit of {} exceeded",
                self.limits.max_steps
            )));
        }
        if before / CLOCK_CHECK_INTERVAL != self.steps / CLOCK_CHECK_INTERVAL
            && Instant::now() >= self.deadline
        {
            return Err(ScriptError::Timeout(self.limits.timeout));
        }
        Ok(())
    }

    pub fn check_len(&self, len: usize) -> Result<(), ScriptError> {
        if len > self.limits.max_array_len {
            return Err(ScriptError::Resource(format!(
                "array of {len} elements exceeds the limit of {}",
                self.limits.max_array_len
            )));
        }
        Ok(())
    }

    /// Strings share the element ceiling, counted in bytes
    pub fn check_text(&self, len: usize) -> Result<(), ScriptError> {
        if len > self.limits.max_array_len {
            return Err(ScriptError::Resource(format!(
                "string of {len} bytes exceeds the limit of {}",
                self.limits.max_array_len
            )));
        }
        Ok(())
    }

    pub fn enter_call(&mut self) -> Result<(), ScriptError> {
        if self.depth >= self.limits.max_call_depth {
            return Err(ScriptError::Recursion);
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
