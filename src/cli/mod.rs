/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{Cli, Commands, OutputFormat, ProjectCommand};
pub use commands::{handle_command, image_data_url};
