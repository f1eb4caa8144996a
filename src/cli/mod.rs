//! CLI module for the magic-photo binary
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod shell;

pub use main_impl::{main, Cli, Command, EraseArgs, RemoveBgArgs};
