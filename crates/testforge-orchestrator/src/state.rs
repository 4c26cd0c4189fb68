use serde::Serialize;
use std::fmt;

use testforge_utils::types::StageId;

/// Where a chain run currently is.
///
/// ```text
/// Idle → Analyzing → GeneratingCases → GeneratingCode → Done
///            └──────────────┴────────────────┴────────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Idle,
    Analyzing,
    GeneratingCases,
    GeneratingCode,
    Done,
    Failed,
}

impl ChainState {
    /// State entered when `stage` starts.
    #[must_use]
    pub const fn for_stage(stage: StageId) -> Self {
        match stage {
            StageId::Analysis => Self::Analyzing,
            StageId::TestCases => Self::GeneratingCases,
            StageId::TestCode => Self::GeneratingCode,
        }
    }

    /// The stage running in this state, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        match self {
            Self::Analyzing => Some(StageId::Analysis),
            Self::GeneratingCases => Some(StageId::TestCases),
            Self::GeneratingCode => Some(StageId::TestCode),
            Self::Idle | Self::Done | Self::Failed => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::GeneratingCases => "generating_cases",
            Self::GeneratingCode => "generating_code",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_states_round_trip() {
        for stage in StageId::ALL {
            let state = ChainState::for_stage(stage);
            assert_eq!(state.stage(), Some(stage));
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(ChainState::Done.is_terminal());
        assert!(ChainState::Failed.is_terminal());
        assert!(!ChainState::Idle.is_terminal());
        assert_eq!(ChainState::Idle.stage(), None);
        assert_eq!(ChainState::GeneratingCases.to_string(), "generating_cases");
    }
}
