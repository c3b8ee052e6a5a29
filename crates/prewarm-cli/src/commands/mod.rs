//! CLI subcommand implementations

pub mod bench;
pub mod functions;
