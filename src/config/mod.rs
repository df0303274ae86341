//! Configuration module

pub mod cli;
pub mod load_config;

pub use cli::{usage, CliArgs, CliError};
pub use load_config::LoadConfig;
