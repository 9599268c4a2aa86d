//! CLI subcommands.

pub mod clear;
pub mod free;
pub mod kill;
pub mod list;
pub mod ports;
