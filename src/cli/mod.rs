pub mod commands;
pub mod watch_commands;

pub use commands::Cli;
pub use watch_commands::{WatchCommandHandler, WatchOptions};
