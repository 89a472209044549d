//! Functionality related to the `rawcheck validate` subcommand.

pub mod command;
pub mod config;
pub mod pipeline;
