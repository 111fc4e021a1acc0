//! Cross-project parallel-work detection.
//!
//! # Algorithm Summary
//!
//! 1. Flatten every session into a start edge and an end edge
//! 2. Sort edges by timestamp, starts before ends at the same instant
//! 3. Sweep, tracking how many sessions each project has active
//! 4. Whenever the set of active projects changes, close the current window
//!    and, if two or more projects remain, open a new one
//!
//! Because starts sort before ends, a session beginning exactly when another
//! ends produces a zero-width window, which is discarded. Touching
//! boundaries are therefore never reported as parallel work.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::EngineError;
use crate::session::{Session, SessionsByProject};

/// A span during which two or more projects had active sessions.
///
/// Windows borrow the sessions they were computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlapWindow<'a> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Distinct contributing projects (always two or more).
    pub project_ids: BTreeSet<&'a str>,
    /// Sessions active at some point during the window, keyed by project.
    pub contributing_sessions: BTreeMap<&'a str, Vec<&'a Session>>,
}

impl OverlapWindow<'_> {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true if `session` contributed to this window.
    ///
    /// Sessions are matched by identity, so `session` must be borrowed from
    /// the same map the window was detected from.
    pub fn involves(&self, session: &Session) -> bool {
        self.contributing_sessions
            .get(session.project_id.as_str())
            .is_some_and(|sessions| sessions.iter().any(|s| std::ptr::eq(*s, session)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeKind {
    // Declaration order is the tie-break: starts sort first.
    Start,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Edge<'a> {
    at: DateTime<Utc>,
    kind: EdgeKind,
    project_id: &'a str,
    index: usize,
    session: &'a Session,
}

impl Edge<'_> {
    fn sort_key(&self) -> (DateTime<Utc>, EdgeKind, &str, usize) {
        (self.at, self.kind, self.project_id, self.index)
    }
}

/// A window still being swept.
struct OpenWindow<'a> {
    start: DateTime<Utc>,
    contributing: BTreeMap<&'a str, Vec<&'a Session>>,
}

impl<'a> OpenWindow<'a> {
    fn new(
        start: DateTime<Utc>,
        active: &BTreeMap<(&'a str, usize), &'a Session>,
    ) -> Self {
        let mut contributing: BTreeMap<&str, Vec<&Session>> = BTreeMap::new();
        for (&(project_id, _), &session) in active {
            contributing.entry(project_id).or_default().push(session);
        }
        Self {
            start,
            contributing,
        }
    }

    /// Continue a window that closed at this window's start with the same
    /// project set (only a zero-width change happened in between).
    fn resume(&mut self, previous: OverlapWindow<'a>) {
        self.start = previous.start;
        let mut contributing = previous.contributing_sessions;
        for (project_id, sessions) in std::mem::take(&mut self.contributing) {
            let existing = contributing.entry(project_id).or_default();
            for session in sessions {
                if !existing.iter().any(|s| std::ptr::eq(*s, session)) {
                    existing.push(session);
                }
            }
        }
        self.contributing = contributing;
    }

    fn close(self, end: DateTime<Utc>) -> Option<OverlapWindow<'a>> {
        if end <= self.start {
            return None;
        }
        Some(OverlapWindow {
            start: self.start,
            end,
            project_ids: self.contributing.keys().copied().collect(),
            contributing_sessions: self.contributing,
        })
    }
}

/// Detect windows where sessions from two or more projects are active.
///
/// Each window is a maximal interval with a constant set of two or more
/// active projects; when a project joins or leaves while at least two stay
/// active, one window closes and the next opens at that instant. Use
/// [`coalesce_windows`] to merge such back-to-back windows into one per
/// continuous run of parallel work.
///
/// Fewer than two projects with sessions yields an empty result.
///
/// # Errors
///
/// Fails if a session ends before it starts, or if two sessions of the same
/// project intersect.
pub fn detect_overlaps(
    sessions_by_project: &SessionsByProject,
) -> Result<Vec<OverlapWindow<'_>>, EngineError> {
    validate_sessions(sessions_by_project)?;

    let populated = sessions_by_project
        .values()
        .filter(|sessions| !sessions.is_empty())
        .count();
    if populated < 2 {
        return Ok(Vec::new());
    }

    let mut edges: Vec<Edge<'_>> = sessions_by_project
        .iter()
        .flat_map(|(project_id, sessions)| {
            sessions.iter().enumerate().flat_map(move |(index, session)| {
                [
                    Edge {
                        at: session.start,
                        kind: EdgeKind::Start,
                        project_id,
                        index,
                        session,
                    },
                    Edge {
                        at: session.end,
                        kind: EdgeKind::End,
                        project_id,
                        index,
                        session,
                    },
                ]
            })
        })
        .collect();
    edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut active: BTreeMap<(&str, usize), &Session> = BTreeMap::new();
    let mut project_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut open: Option<OpenWindow<'_>> = None;
    let mut windows = Vec::new();

    for edge in edges {
        let project_set_changed = match edge.kind {
            EdgeKind::Start => {
                active.insert((edge.project_id, edge.index), edge.session);
                let count = project_counts.entry(edge.project_id).or_insert(0);
                *count += 1;
                *count == 1
            }
            EdgeKind::End => {
                active.remove(&(edge.project_id, edge.index));
                let remaining = project_counts.get_mut(edge.project_id).map_or(0, |count| {
                    *count -= 1;
                    *count
                });
                if remaining == 0 {
                    project_counts.remove(edge.project_id);
                    true
                } else {
                    false
                }
            }
        };

        if !project_set_changed {
            if let (EdgeKind::Start, Some(window)) = (edge.kind, open.as_mut()) {
                window
                    .contributing
                    .entry(edge.project_id)
                    .or_default()
                    .push(edge.session);
            }
            continue;
        }

        if let Some(window) = open.take().and_then(|w| w.close(edge.at)) {
            windows.push(window);
        }
        if project_counts.len() >= 2 {
            let mut window = OpenWindow::new(edge.at, &active);
            let resumes_last = windows.last().is_some_and(|last: &OverlapWindow<'_>| {
                last.end == edge.at && last.project_ids.iter().eq(project_counts.keys())
            });
            if resumes_last {
                if let Some(previous) = windows.pop() {
                    window.resume(previous);
                }
            }
            open = Some(window);
        }
    }

    tracing::debug!(
        projects = populated,
        windows = windows.len(),
        "detected parallel work windows"
    );

    Ok(windows)
}

/// Merge windows that share an endpoint into one window per continuous run
/// of parallel work.
///
/// Input must be ordered by start, as returned by [`detect_overlaps`].
pub fn coalesce_windows(windows: Vec<OverlapWindow<'_>>) -> Vec<OverlapWindow<'_>> {
    let mut merged: Vec<OverlapWindow<'_>> = Vec::with_capacity(windows.len());

    for window in windows {
        if let Some(last) = merged.last_mut().filter(|last| window.start <= last.end) {
            last.end = last.end.max(window.end);
            last.project_ids.extend(window.project_ids);
            for (project_id, sessions) in window.contributing_sessions {
                let existing = last.contributing_sessions.entry(project_id).or_default();
                for session in sessions {
                    if !existing.iter().any(|s| std::ptr::eq(*s, session)) {
                        existing.push(session);
                    }
                }
            }
            continue;
        }
        merged.push(window);
    }

    merged
}

fn validate_sessions(sessions_by_project: &SessionsByProject) -> Result<(), EngineError> {
    for (project_id, sessions) in sessions_by_project {
        for session in sessions {
            if session.start > session.end {
                return Err(EngineError::InvalidSession {
                    project_id: project_id.clone(),
                    start: session.start,
                    end: session.end,
                });
            }
        }

        let mut ordered: Vec<&Session> = sessions.iter().collect();
        ordered.sort_by_key(|s| (s.start, s.end));
        for pair in ordered.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(EngineError::OverlappingSessions {
                    project_id: project_id.clone(),
                    at: pair[1].start,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::commit::DiffStats;
    use crate::session::tests::{at, commit};

    /// Session spanning `[start, end]` with one commit at each endpoint.
    fn session(project: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        let mut commits = vec![commit(project, &format!("{project}-{start}"), start)];
        if end != start {
            commits.push(commit(project, &format!("{project}-{end}"), end));
        }
        Session {
            project_id: project.to_string(),
            start,
            end,
            stats: DiffStats::default(),
            commits,
        }
    }

    fn by_project(entries: Vec<(&str, Vec<Session>)>) -> SessionsByProject {
        entries
            .into_iter()
            .map(|(project, sessions)| (project.to_string(), sessions))
            .collect()
    }

    fn spans(windows: &[OverlapWindow<'_>]) -> Vec<(DateTime<Utc>, DateTime<Utc>, Vec<String>)> {
        windows
            .iter()
            .map(|w| {
                (
                    w.start,
                    w.end,
                    w.project_ids.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }

    fn describe(windows: &[OverlapWindow<'_>]) -> String {
        windows
            .iter()
            .map(|w| {
                let projects: Vec<&str> = w.project_ids.iter().copied().collect();
                format!(
                    "{}-{} {}",
                    w.start.format("%H:%M"),
                    w.end.format("%H:%M"),
                    projects.join(",")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn projects(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_two_projects_partial_overlap() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(11, 0))]),
            ("B", vec![session("B", at(10, 30), at(12, 0))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        assert_eq!(
            spans(&windows),
            vec![(at(10, 30), at(11, 0), projects(&["A", "B"]))]
        );
        assert_eq!(windows[0].duration(), Duration::minutes(30));
        assert_eq!(windows[0].contributing_sessions["A"][0].start, at(9, 0));
        assert_eq!(windows[0].contributing_sessions["B"][0].start, at(10, 30));
    }

    #[test]
    fn test_touching_sessions_do_not_overlap() {
        let input = by_project(vec![
            ("A", vec![session("A", at(10, 0), at(12, 0))]),
            ("B", vec![session("B", at(12, 0), at(13, 0))]),
        ]);
        assert!(detect_overlaps(&input).unwrap().is_empty());
    }

    #[test]
    fn test_three_projects_split_when_project_leaves() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(10, 0))]),
            ("B", vec![session("B", at(9, 0), at(10, 30))]),
            ("C", vec![session("C", at(9, 0), at(9, 15))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        assert_eq!(
            spans(&windows),
            vec![
                (at(9, 0), at(9, 15), projects(&["A", "B", "C"])),
                (at(9, 15), at(10, 0), projects(&["A", "B"])),
            ]
        );
        assert!(!windows[1].contributing_sessions.contains_key("C"));
    }

    #[test]
    fn test_single_project_has_no_overlaps() {
        let input = by_project(vec![(
            "A",
            vec![
                session("A", at(9, 0), at(10, 0)),
                session("A", at(12, 0), at(13, 0)),
            ],
        )]);
        assert!(detect_overlaps(&input).unwrap().is_empty());
    }

    #[test]
    fn test_empty_session_lists_count_as_absent() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(10, 0))]),
            ("B", vec![]),
        ]);
        assert!(detect_overlaps(&input).unwrap().is_empty());
        assert!(detect_overlaps(&SessionsByProject::new()).unwrap().is_empty());
    }

    #[test]
    fn test_zero_duration_session_inside_other_is_not_a_window() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(11, 0))]),
            ("B", vec![session("B", at(10, 0), at(10, 0))]),
        ]);
        assert!(detect_overlaps(&input).unwrap().is_empty());
    }

    #[test]
    fn test_fluctuating_activity_produces_disjoint_windows() {
        let input = by_project(vec![
            (
                "A",
                vec![
                    session("A", at(9, 0), at(10, 0)),
                    session("A", at(13, 0), at(14, 0)),
                ],
            ),
            ("B", vec![session("B", at(9, 30), at(13, 30))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        assert_eq!(
            spans(&windows),
            vec![
                (at(9, 30), at(10, 0), projects(&["A", "B"])),
                (at(13, 0), at(13, 30), projects(&["A", "B"])),
            ]
        );
    }

    #[test]
    fn test_project_joining_splits_window() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(12, 0))]),
            ("B", vec![session("B", at(9, 30), at(11, 0))]),
            ("C", vec![session("C", at(10, 0), at(10, 30))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        assert_snapshot!(describe(&windows), @r"
        09:30-10:00 A,B
        10:00-10:30 A,B,C
        10:30-11:00 A,B
        ");
    }

    #[test]
    fn test_coalesce_merges_touching_windows() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(12, 0))]),
            ("B", vec![session("B", at(9, 30), at(11, 0))]),
            ("C", vec![session("C", at(10, 0), at(10, 30))]),
            ("D", vec![session("D", at(11, 30), at(11, 45))]),
        ]);
        let windows = coalesce_windows(detect_overlaps(&input).unwrap());
        assert_eq!(
            spans(&windows),
            vec![
                (at(9, 30), at(11, 0), projects(&["A", "B", "C"])),
                (at(11, 30), at(11, 45), projects(&["A", "D"])),
            ]
        );
        // A's single session is listed once despite three merged segments.
        assert_eq!(windows[0].contributing_sessions["A"].len(), 1);
    }

    #[test]
    fn test_involves_matches_contributing_sessions() {
        let input = by_project(vec![
            (
                "A",
                vec![
                    session("A", at(9, 0), at(10, 0)),
                    session("A", at(15, 0), at(16, 0)),
                ],
            ),
            ("B", vec![session("B", at(9, 30), at(11, 0))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].involves(&input["A"][0]));
        assert!(!windows[0].involves(&input["A"][1]));
        assert!(windows[0].involves(&input["B"][0]));
    }

    #[test]
    fn test_involves_matches_by_identity_not_bounds() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(10, 0))]),
            ("B", vec![session("B", at(9, 0), at(10, 0))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].involves(&input["A"][0]));

        let lookalike = input["A"][0].clone();
        assert!(!windows[0].involves(&lookalike));
    }

    #[test]
    fn test_output_is_deterministic() {
        let input = by_project(vec![
            ("A", vec![session("A", at(9, 0), at(10, 0))]),
            ("B", vec![session("B", at(9, 0), at(10, 0))]),
            ("C", vec![session("C", at(9, 0), at(10, 0))]),
        ]);
        let first = serde_json::to_string(&detect_overlaps(&input).unwrap()).unwrap();
        let second = serde_json::to_string(&detect_overlaps(&input).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_never_reports_narrow_or_single_project_windows() {
        let input = by_project(vec![
            (
                "A",
                vec![
                    session("A", at(8, 0), at(9, 0)),
                    session("A", at(10, 0), at(10, 0)),
                    session("A", at(11, 0), at(13, 0)),
                ],
            ),
            (
                "B",
                vec![
                    session("B", at(9, 0), at(10, 0)),
                    session("B", at(12, 0), at(14, 0)),
                ],
            ),
            ("C", vec![session("C", at(12, 30), at(12, 30))]),
        ]);
        let windows = detect_overlaps(&input).unwrap();
        for window in &windows {
            assert!(window.end > window.start);
            assert!(window.project_ids.len() >= 2);
        }
        assert_eq!(
            spans(&windows),
            vec![(at(12, 0), at(13, 0), projects(&["A", "B"]))]
        );
    }

    #[test]
    fn test_rejects_inverted_session() {
        let input = by_project(vec![
            ("A", vec![session("A", at(10, 0), at(9, 0))]),
            ("B", vec![session("B", at(9, 0), at(10, 0))]),
        ]);
        assert!(matches!(
            detect_overlaps(&input),
            Err(EngineError::InvalidSession { .. })
        ));
    }

    #[test]
    fn test_rejects_overlapping_sessions_within_project() {
        let input = by_project(vec![
            (
                "A",
                vec![
                    session("A", at(9, 0), at(10, 0)),
                    session("A", at(9, 30), at(11, 0)),
                ],
            ),
            ("B", vec![session("B", at(9, 0), at(10, 0))]),
        ]);
        let err = detect_overlaps(&input).unwrap_err();
        assert_eq!(
            err,
            EngineError::OverlappingSessions {
                project_id: "A".to_string(),
                at: at(9, 30),
            }
        );
    }
}
