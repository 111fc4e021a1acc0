//! Core domain logic for git work logs.
//!
//! This crate contains the fundamental types and logic for:
//! - Session building: clustering commits into contiguous work sessions
//! - Overlap detection: finding windows of parallel work across projects
//! - Summaries: aggregate durations and diff stats for reporting
//!
//! Everything here is pure and synchronous; fetching commits and rendering
//! reports live in the CLI.

pub mod commit;
mod error;
pub mod overlap;
pub mod session;
pub mod summary;

pub use commit::{Commit, DiffStats};
pub use error::EngineError;
pub use overlap::{OverlapWindow, coalesce_windows, detect_overlaps};
pub use session::{
    Session, SessionConfig, SessionsByProject, build_sessions, build_sessions_by_project,
};
pub use summary::{ProjectSummary, WorkSummary, is_parallel};
