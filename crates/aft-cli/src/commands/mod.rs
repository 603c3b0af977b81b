//! CLI commands

pub mod compose;
pub mod config;
pub mod secrets;
pub mod tools;
