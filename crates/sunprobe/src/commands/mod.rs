//! Command handlers: bridge CLI args -> core acquisition -> output formatting.

pub mod config_cmd;
pub mod fetch;
pub mod history;
pub mod login;
pub mod util;
pub mod watch;
