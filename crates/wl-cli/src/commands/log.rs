//! `wl log`: render a work log for a time range.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Duration, Local, Utc};
use wl_llm::{Client, SummaryRequest, build_context};

use crate::Config;
use crate::cli::LogArgs;
use crate::commands::input::{find_windows, load_sessions};
use crate::render::{SummaryOutcome, WorkLog, render_json, render_markdown};
use crate::source::TimeRange;

pub fn run<W: Write>(writer: &mut W, args: &LogArgs, config: &Config) -> Result<()> {
    let loaded = load_sessions(&args.input, config)?;
    let windows = find_windows(&loaded.sessions, args.input.merge_windows)?;

    let title = args
        .title
        .clone()
        .unwrap_or_else(|| default_title(&loaded.range));
    let mut log = WorkLog::new(title, loaded.range, &loaded.sessions, &windows);

    if args.summary && log.totals.commit_count > 0 {
        log.summary = Some(summarize(args, config, &log));
    }

    if args.json {
        let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
        let output = render_json(&log, Utc::now(), &timezone)?;
        writeln!(writer, "{output}")?;
    } else {
        write!(writer, "{}", render_markdown(&log, &Local))?;
    }

    Ok(())
}

/// "Work Log: 2025-01-27 to 2025-01-29", or a single date for one-day ranges.
fn default_title(range: &TimeRange) -> String {
    let first = range.since.with_timezone(&Local).date_naive();
    // until is exclusive
    let last = (range.until - Duration::nanoseconds(1))
        .with_timezone(&Local)
        .date_naive();
    if first == last {
        format!("Work Log: {first}")
    } else {
        format!("Work Log: {first} to {last}")
    }
}

/// Ask the configured provider for a summary. Failures never abort the report.
fn summarize(args: &LogArgs, config: &Config, log: &WorkLog<'_>) -> SummaryOutcome {
    match request_summary(args, config, log) {
        Ok(text) => SummaryOutcome::Generated(text),
        Err(err) => {
            let reason = format!("{err:#}");
            tracing::warn!(error = %reason, "summary generation failed");
            SummaryOutcome::Failed(reason)
        }
    }
}

fn request_summary(args: &LogArgs, config: &Config, log: &WorkLog<'_>) -> Result<String> {
    let provider = args.provider.unwrap_or(config.provider);
    let api_key = config.api_key(provider).with_context(|| {
        format!(
            "no API key configured for {provider}; set {} or {provider}_api_key in the config",
            provider.api_key_env()
        )
    })?;
    let client = Client::new(api_key, config.endpoint(provider))?;

    let request = SummaryRequest {
        model: args
            .model
            .clone()
            .or_else(|| config.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string()),
        temperature: args.temperature.unwrap_or(config.temperature),
        system_prompt: config.system_prompt.clone(),
        author: args.input.author.clone(),
        context: build_context(log.sessions, log.windows),
    };
    tracing::debug!(%provider, model = %request.model, "requesting summary");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime
        .block_on(client.summarize(&request))
        .context("summary request failed")
}
