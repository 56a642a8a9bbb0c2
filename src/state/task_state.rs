/// Task state definitions for tracking crawl progress
///
/// This module defines all possible states a crawl task can be in.
use std::fmt;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task has been created but not started
    Created,

    /// A cached copy of the page was found
    CacheHit,

    /// Page is currently being fetched
    Fetching,

    /// Page is being checked against the site's rules
    Evaluating,

    /// Links are being extracted and enqueued
    Extracting,

    // ===== Terminal States =====
    /// Page was handled successfully
    Persisted,

    /// Page was rejected or could not be fetched
    Dropped,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Dropped)
    }

    /// Returns true if a task may move from this state to `next`
    ///
    /// Any non-terminal state may move to `Dropped`; otherwise only the
    /// forward edges of the lifecycle are allowed.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Dropped {
            return true;
        }
        matches!(
            (self, next),
            (Self::Created, Self::CacheHit)
                | (Self::Created, Self::Fetching)
                | (Self::CacheHit, Self::Evaluating)
                | (Self::Fetching, Self::Evaluating)
                | (Self::Evaluating, Self::Extracting)
                | (Self::Extracting, Self::Persisted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::CacheHit => "cache_hit",
            Self::Fetching => "fetching",
            Self::Evaluating => "evaluating",
            Self::Extracting => "extracting",
            Self::Persisted => "persisted",
            Self::Dropped => "dropped",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
