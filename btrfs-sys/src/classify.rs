// SPDX-License-Identifier: GPL-3.0-only

use btrfs_types::Outcome;

const DENIED_PATTERNS: &[&str] = &[
    "permission",
    "not permitted",
    "not authorized",
    "request dismissed",
];

const NOT_FOUND_PATTERNS: &[&str] = &[
    "no such file or directory",
    "not a block device",
    "no such device",
];

/// Classify a finished process by exit code and stderr.
///
/// Pure: the same inputs always yield the same outcome. Permission refusals
/// win over missing targets when stderr mentions both.
pub fn classify(exit_code: Option<i32>, stderr: &str) -> Outcome {
    if exit_code == Some(0) {
        return Outcome::Success;
    }

    let stderr = stderr.to_lowercase();
    if DENIED_PATTERNS.iter().any(|pattern| stderr.contains(pattern)) {
        Outcome::Denied
    } else if NOT_FOUND_PATTERNS
        .iter()
        .any(|pattern| stderr.contains(pattern))
    {
        Outcome::NotFound
    } else {
        Outcome::ToolError
    }
}
