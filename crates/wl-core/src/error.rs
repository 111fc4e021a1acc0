//! Engine error taxonomy.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Precondition violations reported by the session and overlap engines.
///
/// Empty input is never an error; these variants only cover input the engine
/// refuses to coerce into a plausible-looking result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The inactivity gap threshold was zero or negative.
    #[error("gap threshold must be positive, got {} seconds", .threshold.num_seconds())]
    InvalidGapThreshold { threshold: Duration },

    /// The gap threshold does not fit in a duration.
    #[error("gap threshold of {minutes} minutes is out of range")]
    GapThresholdOutOfRange { minutes: i64 },

    /// Commits passed to a single-project build belong to different projects.
    #[error("commits from multiple projects in one session build: {expected} and {found}")]
    MixedProjects { expected: String, found: String },

    /// The same commit appeared twice within a project.
    #[error("duplicate commit {sha} in project {project_id}")]
    DuplicateCommit { project_id: String, sha: String },

    /// A session ends before it starts.
    #[error("invalid session in {project_id}: start {start} is after end {end}")]
    InvalidSession {
        project_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Two sessions of the same project intersect.
    #[error("overlapping sessions in project {project_id} at {at}")]
    OverlappingSessions {
        project_id: String,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_threshold_message_includes_seconds() {
        let err = EngineError::InvalidGapThreshold {
            threshold: Duration::minutes(-1),
        };
        assert_eq!(
            err.to_string(),
            "gap threshold must be positive, got -60 seconds"
        );
    }

    #[test]
    fn out_of_range_message_includes_minutes() {
        let err = EngineError::GapThresholdOutOfRange { minutes: i64::MAX };
        assert_eq!(
            err.to_string(),
            "gap threshold of 9223372036854775807 minutes is out of range"
        );
    }

    #[test]
    fn duplicate_commit_message_names_project() {
        let err = EngineError::DuplicateCommit {
            project_id: "owner/repo".to_string(),
            sha: "abc123".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate commit abc123 in project owner/repo");
    }
}
