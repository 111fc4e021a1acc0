//! Commit sources: where commit records come from.
//!
//! A source produces commits already restricted to a time range and an
//! optional author, with timestamps on the UTC timeline the engine expects.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use wl_core::{Commit, DiffStats};

const RECORD_SEP: char = '\x1e';
const FIELD_SEP: char = '\x1f';
const GIT_LOG_FORMAT: &str = "--pretty=format:%x1e%H%x1f%an%x1f%ae%x1f%at%x1f%s";

/// Half-open time range `[since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if since >= until {
            anyhow::bail!(
                "invalid time range: since ({}) must be before until ({})",
                since.to_rfc3339(),
                until.to_rfc3339()
            );
        }
        Ok(Self { since, until })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.since && at < self.until
    }
}

/// Something that can produce commit records for a time range.
pub trait CommitSource: Send + Sync {
    /// Human-readable name used in logs and error messages.
    fn name(&self) -> String;

    /// Fetch commits inside `range`, optionally restricted to authors
    /// matching `author`.
    fn fetch(&self, range: &TimeRange, author: Option<&str>) -> Result<Vec<Commit>>;
}

/// A local git repository. The project id is the repository's directory name.
#[derive(Debug, Clone)]
pub struct GitRepoSource {
    path: PathBuf,
    project_id: String,
}

impl GitRepoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let project_id = project_id_for(&path);
        Self { path, project_id }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

/// Directory name of `path`, resolving `.` and relative paths when possible.
fn project_id_for(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

impl CommitSource for GitRepoSource {
    fn name(&self) -> String {
        format!("git repository {}", self.path.display())
    }

    fn fetch(&self, range: &TimeRange, author: Option<&str>) -> Result<Vec<Commit>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .arg("log")
            .arg("--numstat")
            .arg(format!("--since={}", range.since.to_rfc3339()))
            .arg(format!("--until={}", range.until.to_rfc3339()))
            .arg(GIT_LOG_FORMAT)
            .output()
            .context("failed to run git")?;

        if !output.status.success() {
            anyhow::bail!(
                "git log failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let commits = filter_commits(parse_git_log(&raw, &self.project_id), range, author);
        tracing::debug!(
            project = %self.project_id,
            commits = commits.len(),
            "fetched commits from git"
        );
        Ok(commits)
    }
}

/// Parse `git log --numstat` output produced with [`GIT_LOG_FORMAT`].
///
/// Each record starts with a record separator followed by the header fields
/// (sha, author name, author email, epoch seconds, subject) and is followed
/// by the commit's numstat lines. Malformed records are skipped.
pub fn parse_git_log(raw: &str, project_id: &str) -> Vec<Commit> {
    raw.split(RECORD_SEP)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let (header, numstat) = record.split_once('\n').unwrap_or((record, ""));
            let fields: Vec<&str> = header.splitn(5, FIELD_SEP).collect();
            let [sha, name, email, epoch, subject] = fields.as_slice() else {
                tracing::warn!(
                    project = %project_id,
                    record = %header,
                    "skipping malformed git log record"
                );
                return None;
            };

            let Some(timestamp) = epoch
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
            else {
                tracing::warn!(
                    project = %project_id,
                    sha = %sha,
                    "skipping commit with invalid timestamp"
                );
                return None;
            };

            Some(Commit {
                project_id: project_id.to_string(),
                sha: sha.trim().to_string(),
                timestamp,
                author_key: format!("{} <{}>", name.trim(), email.trim()),
                message: subject.trim().to_string(),
                stats: DiffStats::from_numstat(numstat),
            })
        })
        .collect()
}

/// A JSON file holding an array of commit records, possibly for several
/// projects.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CommitSource for JsonFileSource {
    fn name(&self) -> String {
        format!("commit file {}", self.path.display())
    }

    fn fetch(&self, range: &TimeRange, author: Option<&str>) -> Result<Vec<Commit>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let commits: Vec<Commit> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;

        let total = commits.len();
        let commits = filter_commits(commits, range, author);
        tracing::debug!(
            path = %self.path.display(),
            total,
            kept = commits.len(),
            "loaded commits from file"
        );
        Ok(commits)
    }
}

fn filter_commits(commits: Vec<Commit>, range: &TimeRange, author: Option<&str>) -> Vec<Commit> {
    commits
        .into_iter()
        .filter(|c| range.contains(c.timestamp))
        .filter(|c| author.is_none_or(|needle| c.matches_author(needle)))
        .collect()
}

/// Fetch from every source concurrently and concatenate the results.
///
/// The first failing source aborts the whole fetch.
pub fn fetch_all(
    sources: &[Box<dyn CommitSource>],
    range: &TimeRange,
    author: Option<&str>,
) -> Result<Vec<Commit>> {
    let batches: Vec<Vec<Commit>> = sources
        .par_iter()
        .map(|source| {
            source
                .fetch(range, author)
                .with_context(|| format!("failed to fetch commits from {}", source.name()))
        })
        .collect::<Result<_>>()?;

    Ok(batches.into_iter().flatten().collect())
}
