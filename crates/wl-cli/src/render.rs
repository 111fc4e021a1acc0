//! Work log rendering (Markdown and JSON).

use std::fmt::{self, Write};

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use wl_core::{Commit, OverlapWindow, Session, SessionsByProject, WorkSummary, is_parallel};

use crate::source::TimeRange;

const PARALLEL_NOTE: &str = "Parallel time is not additive: overlapping minutes are counted once per project under Time by Project.";

/// Result of the optional AI summary step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(String),
    /// The summary could not be produced; the reason is shown instead.
    Failed(String),
}

/// Everything needed to render one work log.
#[derive(Debug)]
pub struct WorkLog<'a> {
    pub title: String,
    pub range: TimeRange,
    pub sessions: &'a SessionsByProject,
    pub windows: &'a [OverlapWindow<'a>],
    pub totals: WorkSummary,
    pub summary: Option<SummaryOutcome>,
}

impl<'a> WorkLog<'a> {
    pub fn new(
        title: impl Into<String>,
        range: TimeRange,
        sessions: &'a SessionsByProject,
        windows: &'a [OverlapWindow<'a>],
    ) -> Self {
        Self {
            title: title.into(),
            range,
            sessions,
            windows,
            totals: WorkSummary::compute(sessions, windows),
            summary: None,
        }
    }
}

// ========== Duration Formatting ==========

/// Formats a duration as "Xh Ym" if >= 1 hour, "Xm" otherwise.
/// Seconds are floored; negative durations render as 0m.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

fn plural<N>(count: N, noun: &str) -> String
where
    N: Copy + fmt::Display + PartialEq + From<u8>,
{
    if count == N::from(1) {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// "2025-01-29 09:00 to 10:00", repeating the date only when the span
/// crosses midnight.
fn format_span<Tz>(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let start = start.with_timezone(tz);
    let end = end.with_timezone(tz);
    let end_fmt = if start.date_naive() == end.date_naive() {
        "%H:%M"
    } else {
        "%Y-%m-%d %H:%M"
    };
    format!(
        "{} to {}",
        start.format("%Y-%m-%d %H:%M"),
        end.format(end_fmt)
    )
}

// ========== Markdown ==========

/// Renders the work log as Markdown, with times shown in `tz`.
pub fn render_markdown<Tz>(log: &WorkLog<'_>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_markdown(&mut out, log, tz);
    out
}

fn write_markdown<Tz>(out: &mut String, log: &WorkLog<'_>, tz: &Tz) -> fmt::Result
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let totals = &log.totals;

    writeln!(out, "# {}", log.title)?;
    writeln!(out)?;
    writeln!(
        out,
        "- **Range:** {} to {}",
        log.range.since.with_timezone(tz).format("%Y-%m-%d %H:%M"),
        log.range.until.with_timezone(tz).format("%Y-%m-%d %H:%M")
    )?;

    if totals.commit_count == 0 {
        writeln!(out)?;
        writeln!(out, "No commits found in this range.")?;
        return write_summary(out, log.summary.as_ref());
    }

    writeln!(
        out,
        "- **Commits:** {} in {} across {}",
        totals.commit_count,
        plural(totals.session_count, "session"),
        plural(totals.projects.len(), "project")
    )?;
    writeln!(
        out,
        "- **Changes:** {} changed, +{} -{}",
        plural(totals.stats.files_changed, "file"),
        totals.stats.insertions,
        totals.stats.deletions
    )?;
    writeln!(
        out,
        "- **Active time:** {} (sum over projects)",
        format_duration(totals.active_time)
    )?;
    writeln!(
        out,
        "- **Effective time:** {} (wall clock)",
        format_duration(totals.effective_time)
    )?;

    write_windows(out, log, tz)?;
    write_projects(out, log, tz)?;
    write_commits(out, log, tz)?;
    write_summary(out, log.summary.as_ref())
}

fn write_windows<Tz>(out: &mut String, log: &WorkLog<'_>, tz: &Tz) -> fmt::Result
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    if log.windows.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "## Parallel Work")?;
    writeln!(out)?;
    writeln!(out, "{PARALLEL_NOTE}")?;
    writeln!(out)?;
    writeln!(out, "| Window | Duration | Projects |")?;
    writeln!(out, "| --- | --- | --- |")?;
    for window in log.windows {
        let projects: Vec<&str> = window.project_ids.iter().copied().collect();
        writeln!(
            out,
            "| {} | {} | {} |",
            format_span(window.start, window.end, tz),
            format_duration(window.duration()),
            projects.join(", ")
        )?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "{} of parallel work in {}.",
        format_duration(log.totals.parallel_time),
        plural(log.totals.window_count, "window")
    )
}

fn write_projects<Tz>(out: &mut String, log: &WorkLog<'_>, tz: &Tz) -> fmt::Result
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    writeln!(out)?;
    writeln!(out, "## Time by Project")?;

    for project in &log.totals.projects {
        writeln!(out)?;
        writeln!(out, "### {}", project.project_id)?;
        writeln!(out)?;
        writeln!(
            out,
            "{}, {}, {} active, +{} -{}",
            plural(project.session_count, "session"),
            plural(project.commit_count, "commit"),
            format_duration(project.active_time),
            project.stats.insertions,
            project.stats.deletions
        )?;
        writeln!(out)?;

        let sessions = log
            .sessions
            .get(&project.project_id)
            .map_or(&[][..], Vec::as_slice);
        for session in sessions {
            let marker = if is_parallel(session, log.windows) {
                " **[parallel]**"
            } else {
                ""
            };
            writeln!(
                out,
                "- {} ({}, {}){marker}",
                format_span(session.start, session.end, tz),
                format_duration(session.duration()),
                plural(session.commit_count(), "commit")
            )?;
        }
    }
    Ok(())
}

fn write_commits<Tz>(out: &mut String, log: &WorkLog<'_>, tz: &Tz) -> fmt::Result
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut commits: Vec<&Commit> = log
        .sessions
        .values()
        .flatten()
        .flat_map(|session| &session.commits)
        .collect();
    commits.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.project_id.cmp(&b.project_id))
            .then_with(|| a.sha.cmp(&b.sha))
    });

    writeln!(out)?;
    writeln!(out, "## Commits")?;

    let mut current_date: Option<NaiveDate> = None;
    for commit in commits {
        let local = commit.timestamp.with_timezone(tz);
        if current_date != Some(local.date_naive()) {
            current_date = Some(local.date_naive());
            writeln!(out)?;
            writeln!(out, "### {}", local.format("%Y-%m-%d"))?;
            writeln!(out)?;
        }
        writeln!(
            out,
            "- {} **{}** `{}` {} (+{} -{})",
            local.format("%H:%M"),
            commit.project_id,
            commit.short_sha(),
            commit.message,
            commit.stats.insertions,
            commit.stats.deletions
        )?;
    }
    Ok(())
}

fn write_summary(out: &mut String, summary: Option<&SummaryOutcome>) -> fmt::Result {
    let Some(summary) = summary else {
        return Ok(());
    };

    writeln!(out)?;
    writeln!(out, "## Summary")?;
    writeln!(out)?;
    match summary {
        SummaryOutcome::Generated(text) => writeln!(out, "{text}"),
        SummaryOutcome::Failed(reason) => writeln!(out, "_Summary unavailable: {reason}_"),
    }
}

// ========== JSON Output ==========

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Sessions and parallel windows, without presentation extras.
#[derive(Debug, Serialize)]
pub struct JsonModel {
    pub range: JsonRange,
    pub projects: Vec<JsonProject>,
    pub windows: Vec<JsonWindow>,
}

#[derive(Debug, Serialize)]
pub struct JsonRange {
    pub since: String,
    pub until: String,
}

#[derive(Debug, Serialize)]
pub struct JsonProject {
    pub project_id: String,
    pub session_count: usize,
    pub commit_count: usize,
    pub active_minutes: i64,
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
    pub sessions: Vec<JsonSession>,
}

#[derive(Debug, Serialize)]
pub struct JsonSession {
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
    pub parallel: bool,
    pub commits: Vec<JsonCommit>,
}

#[derive(Debug, Serialize)]
pub struct JsonCommit {
    pub sha: String,
    pub timestamp: String,
    pub author: String,
    pub message: String,
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
}

#[derive(Debug, Serialize)]
pub struct JsonWindow {
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
    pub projects: Vec<String>,
    pub sessions: Vec<JsonSessionRef>,
}

#[derive(Debug, Serialize)]
pub struct JsonSessionRef {
    pub project_id: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct JsonTotals {
    pub project_count: usize,
    pub session_count: usize,
    pub commit_count: usize,
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
    pub active_minutes: i64,
    pub effective_minutes: i64,
    pub parallel_minutes: i64,
    pub window_count: usize,
}

/// Full JSON report for `wl log --json`.
#[derive(Debug, Serialize)]
pub struct JsonWorkLog {
    pub generated_at: String,
    pub timezone: String,
    pub title: String,
    #[serde(flatten)]
    pub model: JsonModel,
    pub totals: JsonTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

fn json_session(session: &Session, windows: &[OverlapWindow<'_>]) -> JsonSession {
    JsonSession {
        start: rfc3339(session.start),
        end: rfc3339(session.end),
        duration_minutes: session.duration().num_minutes(),
        parallel: is_parallel(session, windows),
        commits: session
            .commits
            .iter()
            .map(|c| JsonCommit {
                sha: c.sha.clone(),
                timestamp: rfc3339(c.timestamp),
                author: c.author_key.clone(),
                message: c.message.clone(),
                files_changed: c.stats.files_changed,
                insertions: c.stats.insertions,
                deletions: c.stats.deletions,
            })
            .collect(),
    }
}

/// Builds the session/overlap model shared by both JSON outputs.
pub fn json_model(log: &WorkLog<'_>) -> JsonModel {
    let projects = log
        .totals
        .projects
        .iter()
        .map(|project| JsonProject {
            project_id: project.project_id.clone(),
            session_count: project.session_count,
            commit_count: project.commit_count,
            active_minutes: project.active_time.num_minutes(),
            files_changed: project.stats.files_changed,
            insertions: project.stats.insertions,
            deletions: project.stats.deletions,
            sessions: log
                .sessions
                .get(&project.project_id)
                .into_iter()
                .flatten()
                .map(|s| json_session(s, log.windows))
                .collect(),
        })
        .collect();

    let windows = log
        .windows
        .iter()
        .map(|window| JsonWindow {
            start: rfc3339(window.start),
            end: rfc3339(window.end),
            duration_minutes: window.duration().num_minutes(),
            projects: window.project_ids.iter().map(ToString::to_string).collect(),
            sessions: window
                .contributing_sessions
                .iter()
                .flat_map(|(project_id, sessions)| {
                    sessions.iter().map(move |s| JsonSessionRef {
                        project_id: (*project_id).to_string(),
                        start: rfc3339(s.start),
                        end: rfc3339(s.end),
                    })
                })
                .collect(),
        })
        .collect();

    JsonModel {
        range: JsonRange {
            since: rfc3339(log.range.since),
            until: rfc3339(log.range.until),
        },
        projects,
        windows,
    }
}

/// Formats the session/overlap model as JSON.
pub fn render_model_json(log: &WorkLog<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json_model(log))
}

/// Formats the full work log as JSON.
pub fn render_json(
    log: &WorkLog<'_>,
    generated_at: DateTime<Utc>,
    timezone: &str,
) -> serde_json::Result<String> {
    let totals = &log.totals;
    let (summary, summary_error) = match &log.summary {
        Some(SummaryOutcome::Generated(text)) => (Some(text.clone()), None),
        Some(SummaryOutcome::Failed(reason)) => (None, Some(reason.clone())),
        None => (None, None),
    };

    let report = JsonWorkLog {
        generated_at: rfc3339(generated_at),
        timezone: timezone.to_string(),
        title: log.title.clone(),
        model: json_model(log),
        totals: JsonTotals {
            project_count: totals.projects.len(),
            session_count: totals.session_count,
            commit_count: totals.commit_count,
            files_changed: totals.stats.files_changed,
            insertions: totals.stats.insertions,
            deletions: totals.stats.deletions,
            active_minutes: totals.active_time.num_minutes(),
            effective_minutes: totals.effective_time.num_minutes(),
            parallel_minutes: totals.parallel_time.num_minutes(),
            window_count: totals.window_count,
        },
        summary,
        summary_error,
    };

    serde_json::to_string_pretty(&report)
}
