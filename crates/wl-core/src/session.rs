//! Work-session reconstruction from commit timestamps.
//!
//! A session is a maximal run of same-project commits where no two
//! consecutive commits are further apart than the gap threshold. The
//! boundary is inclusive: a gap exactly equal to the threshold stays in the
//! same session.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::commit::{Commit, DiffStats};
use crate::error::EngineError;

/// Sessions keyed by project, in deterministic project order.
pub type SessionsByProject = BTreeMap<String, Vec<Session>>;

/// Parameters for session reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum inactivity between consecutive commits of one session.
    pub gap_threshold: Duration,
}

impl SessionConfig {
    pub fn new(gap_threshold: Duration) -> Result<Self, EngineError> {
        if gap_threshold <= Duration::zero() {
            return Err(EngineError::InvalidGapThreshold {
                threshold: gap_threshold,
            });
        }
        Ok(Self { gap_threshold })
    }

    pub fn from_minutes(minutes: i64) -> Result<Self, EngineError> {
        Duration::try_minutes(minutes)
            .ok_or(EngineError::GapThresholdOutOfRange { minutes })
            .and_then(Self::new)
    }
}

/// A contiguous run of work in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub project_id: String,
    /// Timestamp of the first commit.
    pub start: DateTime<Utc>,
    /// Timestamp of the last commit.
    pub end: DateTime<Utc>,
    /// Commits in timestamp order; never empty.
    pub commits: Vec<Commit>,
    /// Per-commit stat sums. A file touched by several commits counts once per commit.
    pub stats: DiffStats,
}

impl Session {
    fn open(commit: Commit) -> Self {
        Self {
            project_id: commit.project_id.clone(),
            start: commit.timestamp,
            end: commit.timestamp,
            stats: commit.stats,
            commits: vec![commit],
        }
    }

    fn push(&mut self, commit: Commit) {
        self.end = commit.timestamp;
        self.stats += commit.stats;
        self.commits.push(commit);
    }

    /// Time between the first and last commit (zero for a single commit).
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    /// Returns true if `at` falls within `[start, end]`.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Build sessions for a single project.
///
/// Commits are sorted by timestamp first (stable, so equal timestamps keep
/// their input order). An empty input yields no sessions.
///
/// # Errors
///
/// Fails if the threshold is not positive, if the commits span more than
/// one project, or if a SHA repeats.
pub fn build_sessions(
    mut commits: Vec<Commit>,
    config: &SessionConfig,
) -> Result<Vec<Session>, EngineError> {
    if config.gap_threshold <= Duration::zero() {
        return Err(EngineError::InvalidGapThreshold {
            threshold: config.gap_threshold,
        });
    }
    validate_single_project(&commits)?;

    commits.sort_by_key(|c| c.timestamp);

    let mut sessions = Vec::new();
    let mut iter = commits.into_iter();
    let Some(first) = iter.next() else {
        return Ok(sessions);
    };

    let mut current = Session::open(first);
    for commit in iter {
        // Equal timestamps give a zero gap and always merge.
        let gap = commit.timestamp - current.end;
        if gap <= config.gap_threshold {
            current.push(commit);
        } else {
            sessions.push(std::mem::replace(&mut current, Session::open(commit)));
        }
    }
    sessions.push(current);

    Ok(sessions)
}

/// Group a mixed commit stream by project and build sessions for each.
///
/// Projects are processed in parallel; the first error aborts the build.
pub fn build_sessions_by_project(
    commits: Vec<Commit>,
    config: &SessionConfig,
) -> Result<SessionsByProject, EngineError> {
    let mut grouped: BTreeMap<String, Vec<Commit>> = BTreeMap::new();
    for commit in commits {
        grouped
            .entry(commit.project_id.clone())
            .or_default()
            .push(commit);
    }

    let sessions: SessionsByProject = grouped
        .into_par_iter()
        .map(|(project_id, commits)| {
            build_sessions(commits, config).map(|sessions| (project_id, sessions))
        })
        .collect::<Result<_, _>>()?;

    for (project_id, project_sessions) in &sessions {
        tracing::debug!(
            project = %project_id,
            sessions = project_sessions.len(),
            "built work sessions"
        );
    }

    Ok(sessions)
}

fn validate_single_project(commits: &[Commit]) -> Result<(), EngineError> {
    let Some(first) = commits.first() else {
        return Ok(());
    };

    let mut seen = HashSet::with_capacity(commits.len());
    for commit in commits {
        if commit.project_id != first.project_id {
            return Err(EngineError::MixedProjects {
                expected: first.project_id.clone(),
                found: commit.project_id.clone(),
            });
        }
        if !seen.insert(commit.sha.as_str()) {
            return Err(EngineError::DuplicateCommit {
                project_id: commit.project_id.clone(),
                sha: commit.sha.clone(),
            });
        }
    }
    Ok(())
}
