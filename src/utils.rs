//! Utilities that are used across the `rawcheck` subcommands.

pub mod args;
pub mod display;
pub mod pathbuf;
