// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Classified result category of one executed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The tool ran and failed, or was stopped by the timeout
    ToolError,
    /// The tool or the privilege prefix refused for lack of permission
    Denied,
    /// The target device or path does not exist
    NotFound,
    /// The tool could not be located or executed at all
    Invalid,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Captured result of an executed invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Process exit code; `None` when it never started, timed out, or died by signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

impl OperationResult {
    /// Result for an invocation whose program could not be run
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: message.into(),
            outcome: Outcome::Invalid,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_result_has_no_exit_code() {
        let result = OperationResult::invalid("btrfs: not found");
        assert_eq!(result.outcome, Outcome::Invalid);
        assert_eq!(result.exit_code, None);
        assert!(!result.is_success());
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::NotFound).expect("serialize outcome");
        assert_eq!(json, "\"not_found\"");
    }
}
