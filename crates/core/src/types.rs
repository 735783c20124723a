/// Lifecycle of a single conversion job.
///
/// `Discovered → {Skipped | Dispatched} → {Succeeded | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Discovered,
    Skipped,
    Dispatched,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Skipped => "skipped",
            Self::Dispatched => "dispatched",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// No further transition happens within the current run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Skipped)
                | (Self::Discovered, Self::Dispatched)
                | (Self::Dispatched, Self::Succeeded)
                | (Self::Dispatched, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_lifecycle() {
        assert!(JobState::Discovered.can_transition_to(JobState::Skipped));
        assert!(JobState::Discovered.can_transition_to(JobState::Dispatched));
        assert!(JobState::Dispatched.can_transition_to(JobState::Failed));
        assert!(!JobState::Skipped.can_transition_to(JobState::Dispatched));
        assert!(!JobState::Failed.can_transition_to(JobState::Dispatched));
        assert!(!JobState::Discovered.can_transition_to(JobState::Succeeded));
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Discovered.is_terminal());
        assert!(!JobState::Dispatched.is_terminal());
        assert!(JobState::Skipped.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(JobState::Succeeded.to_string(), "succeeded");
    }
}
