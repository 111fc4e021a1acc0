//! `wl sessions`: print the session/overlap model as JSON.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::cli::InputArgs;
use crate::commands::input::{find_windows, load_sessions};
use crate::render::{WorkLog, render_model_json};

pub fn run<W: Write>(writer: &mut W, input: &InputArgs, config: &Config) -> Result<()> {
    let loaded = load_sessions(input, config)?;
    let windows = find_windows(&loaded.sessions, input.merge_windows)?;

    let log = WorkLog::new(String::new(), loaded.range, &loaded.sessions, &windows);
    writeln!(writer, "{}", render_model_json(&log)?)?;
    Ok(())
}
