//! Subcommand implementations

pub mod evaluate;
pub mod forecast;
pub mod policies;
