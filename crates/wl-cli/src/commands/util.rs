//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

use crate::source::TimeRange;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    // Try ISO 8601 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try relative time: "N hours/minutes/days/weeks ago"
    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z), a date (e.g., 2026-01-15) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    let duration = Duration::minutes(n * minutes_per_unit);
    Ok(Utc::now() - duration)
}

/// A range bound as typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// A calendar day in the local timezone.
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

/// Parse `YYYY-MM-DD` as a local day, anything else via [`parse_datetime`].
pub fn parse_time_spec(s: &str) -> anyhow::Result<TimeSpec> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(TimeSpec::Day(date));
    }
    parse_datetime(s).map(TimeSpec::Instant)
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
pub fn local_midnight_to_utc<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
) -> anyhow::Result<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        // Single or ambiguous (DST fall-back): use the earlier time
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        // DST spring-forward gap at midnight: 1am local exists
        LocalResult::None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("no valid local midnight for {date}")),
    }
}

/// Resolve the CLI range flags into a half-open UTC range.
///
/// `--days N` covers the last N local days ending with `today` and takes
/// precedence. Otherwise `since` defaults to the start of `today` and
/// `until` to the end of it; a bare date as `until` includes that whole day.
pub fn resolve_range<Tz: TimeZone>(
    tz: &Tz,
    today: NaiveDate,
    since: Option<&str>,
    until: Option<&str>,
    days: Option<u32>,
) -> anyhow::Result<TimeRange> {
    let tomorrow = next_day(today)?;

    if let Some(days) = days {
        let first = today
            .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
            .with_context(|| format!("--days {days} is out of range"))?;
        return TimeRange::new(
            local_midnight_to_utc(tz, first)?,
            local_midnight_to_utc(tz, tomorrow)?,
        );
    }

    let since = match since.map(parse_time_spec).transpose()? {
        None => local_midnight_to_utc(tz, today)?,
        Some(TimeSpec::Day(date)) => local_midnight_to_utc(tz, date)?,
        Some(TimeSpec::Instant(at)) => at,
    };
    let until = match until.map(parse_time_spec).transpose()? {
        None => local_midnight_to_utc(tz, tomorrow)?,
        Some(TimeSpec::Day(date)) => local_midnight_to_utc(tz, next_day(date)?)?,
        Some(TimeSpec::Instant(at)) => at,
    };

    TimeRange::new(since, until)
}

fn next_day(date: NaiveDate) -> anyhow::Result<NaiveDate> {
    date.succ_opt()
        .with_context(|| format!("date out of range: {date}"))
}
