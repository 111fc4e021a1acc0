//! Normalized commit records consumed by the session engine.

use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-commit diff statistics.
///
/// Unknown values are represented as zero; aggregation never distinguishes
/// "unknown" from "nothing changed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub insertions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl DiffStats {
    /// Parse `git --numstat` output and aggregate it.
    ///
    /// Expected format (one line per file):
    /// ```text
    /// 10\t5\tsrc/lib.rs
    /// -\t-\tassets/logo.png
    /// ```
    ///
    /// Binary files count as changed files with no line deltas.
    pub fn from_numstat(output: &str) -> Self {
        let mut stats = Self::default();

        for line in output.lines() {
            let mut parts = line.splitn(3, '\t');
            let (Some(added), Some(removed), Some(path)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if path.is_empty() {
                continue;
            }

            stats.files_changed += 1;
            stats.insertions += added.parse::<u64>().unwrap_or(0);
            stats.deletions += removed.parse::<u64>().unwrap_or(0);
        }

        stats
    }

    /// Total changed lines (insertions plus deletions).
    pub const fn lines_changed(&self) -> u64 {
        self.insertions.saturating_add(self.deletions)
    }
}

impl Add for DiffStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            files_changed: self.files_changed.saturating_add(rhs.files_changed),
            insertions: self.insertions.saturating_add(rhs.insertions),
            deletions: self.deletions.saturating_add(rhs.deletions),
        }
    }
}

impl AddAssign for DiffStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// One observed change in a project.
///
/// Timestamps must already be normalized to UTC by whoever produced the
/// record; the engine never re-interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Owning repository (local path or `owner/name`).
    pub project_id: String,
    pub sha: String,
    pub timestamp: DateTime<Utc>,
    /// Author identity (`Name <email>` or a login).
    #[serde(default)]
    pub author_key: String,
    /// Commit subject line.
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub stats: DiffStats,
}

impl Commit {
    /// Abbreviated SHA for display.
    pub fn short_sha(&self) -> &str {
        self.sha.get(..8).unwrap_or(&self.sha)
    }

    /// Case-insensitive substring match against the author identity.
    pub fn matches_author(&self, needle: &str) -> bool {
        self.author_key
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn numstat_aggregates_text_and_binary_files() {
        let output = "10\t5\tsrc/lib.rs\n3\t0\tREADME.md\n-\t-\tassets/logo.png\n";
        let stats = DiffStats::from_numstat(output);
        assert_eq!(
            stats,
            DiffStats {
                files_changed: 3,
                insertions: 13,
                deletions: 5,
            }
        );
    }

    #[test]
    fn numstat_ignores_malformed_lines() {
        let stats = DiffStats::from_numstat("\nnot numstat\n1\t2\n4\t4\tok.rs");
        assert_eq!(stats.files_changed, 1);
        assert_eq!(stats.lines_changed(), 8);
    }

    #[test]
    fn numstat_keeps_tabs_in_paths() {
        let stats = DiffStats::from_numstat("1\t1\tdir/with\ttab.txt");
        assert_eq!(stats.files_changed, 1);
    }

    #[test]
    fn stats_accumulate() {
        let mut total = DiffStats::default();
        total += DiffStats {
            files_changed: 1,
            insertions: 2,
            deletions: 3,
        };
        total += DiffStats {
            files_changed: 4,
            insertions: 5,
            deletions: 6,
        };
        assert_eq!(total.files_changed, 5);
        assert_eq!(total.insertions, 7);
        assert_eq!(total.deletions, 9);
    }

    #[test]
    fn stats_saturate_at_max() {
        let big = DiffStats {
            files_changed: u64::MAX,
            insertions: u64::MAX,
            deletions: 1,
        };
        let total = big
            + DiffStats {
                files_changed: 2,
                insertions: 10,
                deletions: 1,
            };
        assert_eq!(total.files_changed, u64::MAX);
        assert_eq!(total.insertions, u64::MAX);
        assert_eq!(total.deletions, 2);
        assert_eq!(total.lines_changed(), u64::MAX);
    }

    #[test]
    fn commit_deserializes_without_stats() {
        let json = r#"{"project_id":"owner/repo","sha":"abcdef1234567890","timestamp":"2025-01-29T10:00:00Z"}"#;
        let commit: Commit = serde_json::from_str(json).unwrap();
        assert_eq!(commit.project_id, "owner/repo");
        assert_eq!(
            commit.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 29, 10, 0, 0).unwrap()
        );
        assert_eq!(commit.stats, DiffStats::default());
        assert!(commit.author_key.is_empty());
    }

    #[test]
    fn commit_deserializes_flat_stats() {
        let json = r#"{"project_id":"p","sha":"1","timestamp":"2025-01-29T10:00:00+08:00","files_changed":2,"insertions":10,"deletions":1}"#;
        let commit: Commit = serde_json::from_str(json).unwrap();
        assert_eq!(commit.stats.files_changed, 2);
        assert_eq!(commit.stats.insertions, 10);
        assert_eq!(
            commit.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 29, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn author_match_is_case_insensitive() {
        let commit = Commit {
            project_id: "p".to_string(),
            sha: "abcdef1234".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 29, 10, 0, 0).unwrap(),
            author_key: "Ada Lovelace <ada@example.com>".to_string(),
            message: String::new(),
            stats: DiffStats::default(),
        };
        assert!(commit.matches_author("ada@EXAMPLE"));
        assert!(commit.matches_author("lovelace"));
        assert!(!commit.matches_author("babbage"));
        assert_eq!(commit.short_sha(), "abcdef12");
    }
}
