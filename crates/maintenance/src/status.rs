use core::str::FromStr;

use serde::{Deserialize, Serialize};

use maintops_core::DomainError;

/// Operational status shared by work orders and their tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Open => "OPEN",
            ActivityStatus::InProgress => "IN_PROGRESS",
            ActivityStatus::Completed => "COMPLETED",
            ActivityStatus::Cancelled => "CANCELLED",
        }
    }

    /// COMPLETED and CANCELLED admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityStatus::Completed | ActivityStatus::Cancelled)
    }

    /// Whether a task in this status lets its work order be completed.
    pub fn permits_completion(&self) -> bool {
        matches!(self, ActivityStatus::Open | ActivityStatus::Completed)
    }
}

impl core::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(ActivityStatus::Open),
            "IN_PROGRESS" => Ok(ActivityStatus::InProgress),
            "COMPLETED" => Ok(ActivityStatus::Completed),
            "CANCELLED" => Ok(ActivityStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown activity status '{other}'"
            ))),
        }
    }
}
