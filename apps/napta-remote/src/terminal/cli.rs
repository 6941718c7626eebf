use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::telemetry::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "napta-remote",
    about = "Switch scripts on a Napta LED matrix and play them from the keyboard",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "NAPTA_SERVER",
        value_name = "URL",
        help = "Display backend address (scheme optional, defaults to http)"
    )]
    pub server: Option<String>,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        global = true,
        env = "NAPTA_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        global = true,
        env = "NAPTA_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the script catalog and mark the one currently shown
    List,
    /// Ask the display to show another script
    Switch(SwitchArgs),
    /// Follow the current script and steer it from the keyboard
    Play(PlayArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SwitchArgs {
    #[arg(value_name = "SCRIPT_ID", help = "Identifier from `napta-remote list`")]
    pub script_id: String,

    #[arg(
        long,
        value_name = "PATH",
        help = "Image to upload with the switch (required by image scripts)"
    )]
    pub image: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlayArgs {
    #[arg(
        long,
        value_name = "N",
        help = "Player slot to claim as soon as the channel is open"
    )]
    pub player: Option<u32>,
}
