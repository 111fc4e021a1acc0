//! Aggregate statistics over sessions and parallel-work windows.

use chrono::{DateTime, Duration, Utc};

use crate::commit::DiffStats;
use crate::overlap::OverlapWindow;
use crate::session::{Session, SessionsByProject};

/// Totals for a single project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub project_id: String,
    pub session_count: usize,
    pub commit_count: usize,
    /// Sum of session durations.
    pub active_time: Duration,
    pub stats: DiffStats,
}

impl ProjectSummary {
    fn from_sessions(project_id: &str, sessions: &[Session]) -> Self {
        Self {
            project_id: project_id.to_string(),
            session_count: sessions.len(),
            commit_count: sessions.iter().map(Session::commit_count).sum(),
            active_time: sessions
                .iter()
                .fold(Duration::zero(), |acc, s| acc + s.duration()),
            stats: sessions
                .iter()
                .fold(DiffStats::default(), |acc, s| acc + s.stats),
        }
    }
}

/// Totals across all projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSummary {
    pub projects: Vec<ProjectSummary>,
    pub session_count: usize,
    pub commit_count: usize,
    pub stats: DiffStats,
    /// Sum of per-project active time; counts parallel work once per project.
    pub active_time: Duration,
    /// Total width of all parallel-work windows.
    pub parallel_time: Duration,
    pub window_count: usize,
    /// Wall-clock time covered by any session (union of intervals, not sum).
    pub effective_time: Duration,
}

impl WorkSummary {
    pub fn compute(sessions_by_project: &SessionsByProject, windows: &[OverlapWindow<'_>]) -> Self {
        let projects: Vec<ProjectSummary> = sessions_by_project
            .iter()
            .filter(|(_, sessions)| !sessions.is_empty())
            .map(|(project_id, sessions)| ProjectSummary::from_sessions(project_id, sessions))
            .collect();

        let intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = sessions_by_project
            .values()
            .flatten()
            .map(|s| (s.start, s.end))
            .collect();

        Self {
            session_count: projects.iter().map(|p| p.session_count).sum(),
            commit_count: projects.iter().map(|p| p.commit_count).sum(),
            stats: projects
                .iter()
                .fold(DiffStats::default(), |acc, p| acc + p.stats),
            active_time: projects
                .iter()
                .fold(Duration::zero(), |acc, p| acc + p.active_time),
            parallel_time: windows
                .iter()
                .fold(Duration::zero(), |acc, w| acc + w.duration()),
            window_count: windows.len(),
            effective_time: union_duration(intervals),
            projects,
        }
    }
}

/// Returns true if `session` contributed to any of `windows`.
pub fn is_parallel(session: &Session, windows: &[OverlapWindow<'_>]) -> bool {
    windows.iter().any(|w| w.involves(session))
}

/// Total length of the union of `intervals`.
fn union_duration(mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>) -> Duration {
    intervals.retain(|(start, end)| end > start);
    if intervals.is_empty() {
        return Duration::zero();
    }
    intervals.sort_by_key(|(start, _)| *start);

    // Merge overlapping intervals
    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
        .iter()
        .fold(Duration::zero(), |acc, (start, end)| acc + (*end - *start))
}
