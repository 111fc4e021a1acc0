//! Shared front half of `wl log` and `wl sessions`: resolve the range,
//! fetch commits and build sessions.

use anyhow::Result;
use chrono::{Local, NaiveDate, TimeZone};
use wl_core::{
    OverlapWindow, SessionConfig, SessionsByProject, build_sessions_by_project, coalesce_windows,
    detect_overlaps,
};

use crate::Config;
use crate::cli::InputArgs;
use crate::commands::util::resolve_range;
use crate::source::{CommitSource, GitRepoSource, JsonFileSource, TimeRange, fetch_all};

/// Sessions for every project seen in the range.
#[derive(Debug)]
pub struct LoadedSessions {
    pub range: TimeRange,
    pub sessions: SessionsByProject,
}

/// Sources named on the command line; the current directory when none are.
pub fn sources(input: &InputArgs) -> Vec<Box<dyn CommitSource>> {
    let mut sources: Vec<Box<dyn CommitSource>> = Vec::new();
    for path in &input.repos {
        sources.push(Box::new(GitRepoSource::new(path)));
    }
    for path in &input.commit_files {
        sources.push(Box::new(JsonFileSource::new(path)));
    }
    if sources.is_empty() {
        sources.push(Box::new(GitRepoSource::new(".")));
    }
    sources
}

/// Resolve the range in the local timezone and load sessions.
pub fn load_sessions(input: &InputArgs, config: &Config) -> Result<LoadedSessions> {
    load_sessions_in(&Local, Local::now().date_naive(), input, config)
}

pub fn load_sessions_in<Tz: TimeZone>(
    tz: &Tz,
    today: NaiveDate,
    input: &InputArgs,
    config: &Config,
) -> Result<LoadedSessions> {
    let range = resolve_range(
        tz,
        today,
        input.since.as_deref(),
        input.until.as_deref(),
        input.days,
    )?;
    let gap_minutes = input.gap_minutes.unwrap_or(config.gap_minutes);
    let session_config = SessionConfig::from_minutes(gap_minutes)?;

    let sources = sources(input);
    let commits = fetch_all(&sources, &range, input.author.as_deref())?;
    tracing::debug!(
        sources = sources.len(),
        commits = commits.len(),
        since = %range.since,
        until = %range.until,
        "fetched commits"
    );

    let sessions = build_sessions_by_project(commits, &session_config)?;
    Ok(LoadedSessions { range, sessions })
}

/// Detect parallel windows, optionally merged into continuous runs.
pub fn find_windows(
    sessions: &SessionsByProject,
    merge: bool,
) -> Result<Vec<OverlapWindow<'_>>> {
    let windows = detect_overlaps(sessions)?;
    tracing::debug!(windows = windows.len(), "detected parallel work");
    Ok(if merge {
        coalesce_windows(windows)
    } else {
        windows
    })
}
