//! Workflow stage model.
//!
//! Defines the fixed 14-stage lifecycle a task moves through, which stages
//! the orchestrator acts on, and the transition tables between them. The
//! stage set is closed by design: the tables are plain `match` lookups on a
//! copyable enum, not an extensible registry.
//!
//! The string token for each stage is a compatibility contract with the
//! task store and must round-trip exactly, case-sensitively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShepherdError;

/// One stage in the fixed task workflow.
///
/// Stages form a strict total order and are partitioned into phases:
/// human design, AI planning, AI implementation, human review, release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    // Human stages
    Requirement,
    DesignInProgress,
    // AI planning stages
    ToPlan,
    Planning,
    Planned,
    // AI implementation stages
    ReadyToImplement,
    ImplementInProgress,
    ImplementDone,
    // Human review stages
    ReadyToReview,
    ReviewInProgress,
    ReviewDone,
    // Release stages
    ReadyToRelease,
    ReleaseInProgress,
    ReleaseDone,
}

/// The (in-progress, done) stage pair an actionable stage maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTransition {
    /// Stage written before the agent is invoked.
    pub in_progress: Stage,
    /// Stage written after the agent succeeds.
    pub done: Stage,
}

impl Stage {
    /// All stages, in workflow order.
    pub const ALL: [Stage; 14] = [
        Stage::Requirement,
        Stage::DesignInProgress,
        Stage::ToPlan,
        Stage::Planning,
        Stage::Planned,
        Stage::ReadyToImplement,
        Stage::ImplementInProgress,
        Stage::ImplementDone,
        Stage::ReadyToReview,
        Stage::ReviewInProgress,
        Stage::ReviewDone,
        Stage::ReadyToRelease,
        Stage::ReleaseInProgress,
        Stage::ReleaseDone,
    ];

    /// Stages the orchestrator picks up and processes via the code agent.
    pub const TRIGGERS: [Stage; 2] = [Stage::ToPlan, Stage::ReadyToImplement];

    /// The exact external string token for this stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirement => "Requirement",
            Self::DesignInProgress => "DesignInProgress",
            Self::ToPlan => "ToPlan",
            Self::Planning => "Planning",
            Self::Planned => "Planned",
            Self::ReadyToImplement => "ReadyToImplement",
            Self::ImplementInProgress => "ImplementInProgress",
            Self::ImplementDone => "ImplementDone",
            Self::ReadyToReview => "ReadyToReview",
            Self::ReviewInProgress => "ReviewInProgress",
            Self::ReviewDone => "ReviewDone",
            Self::ReadyToRelease => "ReadyToRelease",
            Self::ReleaseInProgress => "ReleaseInProgress",
            Self::ReleaseDone => "ReleaseDone",
        }
    }

    /// The next stage in workflow order, or `None` for the terminal stage.
    #[must_use]
    pub fn forward_transition(&self) -> Option<Stage> {
        match self {
            Self::Requirement => Some(Self::DesignInProgress),
            Self::DesignInProgress => Some(Self::ToPlan),
            Self::ToPlan => Some(Self::Planning),
            Self::Planning => Some(Self::Planned),
            Self::Planned => Some(Self::ReadyToImplement),
            Self::ReadyToImplement => Some(Self::ImplementInProgress),
            Self::ImplementInProgress => Some(Self::ImplementDone),
            Self::ImplementDone => Some(Self::ReadyToReview),
            Self::ReadyToReview => Some(Self::ReviewInProgress),
            Self::ReviewInProgress => Some(Self::ReviewDone),
            Self::ReviewDone => Some(Self::ReadyToRelease),
            Self::ReadyToRelease => Some(Self::ReleaseInProgress),
            Self::ReleaseInProgress => Some(Self::ReleaseDone),
            Self::ReleaseDone => None,
        }
    }

    /// The (in-progress, done) pair for an actionable stage, `None` otherwise.
    #[must_use]
    pub fn trigger_transition(&self) -> Option<TriggerTransition> {
        match self {
            Self::ToPlan => Some(TriggerTransition {
                in_progress: Self::Planning,
                done: Self::Planned,
            }),
            Self::ReadyToImplement => Some(TriggerTransition {
                in_progress: Self::ImplementInProgress,
                done: Self::ImplementDone,
            }),
            _ => None,
        }
    }

    /// Check whether the orchestrator should act on tasks in this stage.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.trigger_transition().is_some()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ShepherdError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == token)
            .ok_or_else(|| ShepherdError::UnknownStage {
                token: token.to_string(),
            })
    }
}
