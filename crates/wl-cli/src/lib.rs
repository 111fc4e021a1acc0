//! Git work log CLI library.
//!
//! Fetches commits from local repositories or JSON files, hands them to
//! `wl-core` for session building and overlap detection, and renders the
//! result as Markdown or JSON.

mod cli;
pub mod commands;
mod config;
pub mod render;
pub mod source;

pub use cli::{Cli, Commands, InputArgs, LogArgs};
pub use config::Config;
