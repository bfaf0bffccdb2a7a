mod config;
pub use self::config::*;

pub mod commands;
pub use self::commands::*;
