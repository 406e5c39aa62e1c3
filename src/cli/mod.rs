//! CLI module for the wardrobe-parse service
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli, Commands, DEFAULT_BIND, ENV_BIND};
