//! Shutdown policy and stop triggers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What happens to outstanding work once a run is told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownPolicy {
    /// Stop dequeuing at once; pending work is abandoned.
    Cancel,
    /// Ignore the deadline and keep going until the queue drains.
    Finish,
    /// Refuse new exploratory work, drop the exploratory backlog,
    /// and stop once every must-complete item has run.
    #[default]
    CompletePriority,
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownPolicy::Cancel => "cancel",
            ShutdownPolicy::Finish => "finish",
            ShutdownPolicy::CompletePriority => "complete-priority",
        })
    }
}

/// Why `WorkQueue::run` left the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopTrigger {
    /// Nothing pending, nothing executing.
    Drained,
    /// The run deadline elapsed.
    Timeout,
    /// An interrupt arrived on the token.
    Interrupt,
    /// `cancel()` was called.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ShutdownPolicy,
        }

        let w: Wrapper = toml::from_str(r#"policy = "complete-priority""#).unwrap();
        assert_eq!(w.policy, ShutdownPolicy::CompletePriority);
        let w: Wrapper = toml::from_str(r#"policy = "cancel""#).unwrap();
        assert_eq!(w.policy, ShutdownPolicy::Cancel);
    }

    #[test]
    fn test_policy_display_matches_serde() {
        assert_eq!(ShutdownPolicy::CompletePriority.to_string(), "complete-priority");
        assert_eq!(ShutdownPolicy::Finish.to_string(), "finish");
    }
}
