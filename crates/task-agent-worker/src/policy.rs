use serde::{Deserialize, Serialize};

/// What the delivery loop does when a message cannot be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Stop the worker; the delivery stays unacknowledged and is redelivered
    Abort,
    /// Log, acknowledge, and move on to the next delivery
    SkipAndAck,
}

/// Failure handling, selected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub on_decode_error: ErrorAction,
    pub on_auth_error: ErrorAction,
    pub on_terminal_report_error: ErrorAction,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy {
            on_decode_error: ErrorAction::SkipAndAck,
            on_auth_error: ErrorAction::SkipAndAck,
            on_terminal_report_error: ErrorAction::Abort,
        }
    }
}

impl FailurePolicy {
    /// Fail fast on every error
    pub fn strict() -> Self {
        FailurePolicy {
            on_decode_error: ErrorAction::Abort,
            on_auth_error: ErrorAction::Abort,
            on_terminal_report_error: ErrorAction::Abort,
        }
    }

    /// Never stop the worker
    pub fn tolerant() -> Self {
        FailurePolicy {
            on_decode_error: ErrorAction::SkipAndAck,
            on_auth_error: ErrorAction::SkipAndAck,
            on_terminal_report_error: ErrorAction::SkipAndAck,
        }
    }
}

/// Named starting point for the policy, refined by the per-error flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyPreset {
    Default,
    Strict,
    Tolerant,
}

impl From<PolicyPreset> for FailurePolicy {
    fn from(preset: PolicyPreset) -> Self {
        match preset {
            PolicyPreset::Default => FailurePolicy::default(),
            PolicyPreset::Strict => FailurePolicy::strict(),
            PolicyPreset::Tolerant => FailurePolicy::tolerant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_presets() {
        let strict = FailurePolicy::from(PolicyPreset::Strict);
        assert_eq!(strict.on_decode_error, ErrorAction::Abort);
        assert_eq!(strict.on_auth_error, ErrorAction::Abort);

        let tolerant = FailurePolicy::from(PolicyPreset::Tolerant);
        assert_eq!(tolerant.on_terminal_report_error, ErrorAction::SkipAndAck);

        assert_eq!(FailurePolicy::from(PolicyPreset::Default), FailurePolicy::default());
        assert_eq!(
            PolicyPreset::from_str("tolerant", false).unwrap(),
            PolicyPreset::Tolerant
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let policy: FailurePolicy = serde_yaml::from_str("on_auth_error: abort").unwrap();

        assert_eq!(policy.on_auth_error, ErrorAction::Abort);
        assert_eq!(policy.on_decode_error, ErrorAction::SkipAndAck);
        assert_eq!(policy.on_terminal_report_error, ErrorAction::Abort);
    }
}
