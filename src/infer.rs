//! Functionality related to the `rawcheck infer` subcommand.

pub mod command;
