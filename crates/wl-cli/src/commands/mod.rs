//! CLI subcommand implementations.

pub mod input;
pub mod log;
pub mod sessions;
pub mod util;
