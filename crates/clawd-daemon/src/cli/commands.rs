use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "clawd")]
#[command(version = BUILD_VERSION)]
#[command(about = "clawd - keeps the gateway process alive")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "DIR", env = "CLAWD_HOME", help = "Workspace directory")]
    pub workspace: Option<PathBuf>,

    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the gateway in the background")]
    Start {
        #[arg(last = true, value_name = "ARGS", help = "Extra arguments passed to the gateway")]
        args: Vec<String>,
    },

    #[command(about = "Stop the gateway")]
    Stop,

    #[command(about = "Restart the gateway")]
    Restart,

    #[command(about = "Show gateway status")]
    Status,

    #[command(about = "Run the gateway and restart it when it crashes")]
    #[command(long_about = "Run the gateway under supervision in the foreground.\n\nCrashes are restarted with exponential backoff until the crash budget is exhausted. SIGTERM, SIGINT or SIGHUP stops the gateway and exits.")]
    Supervise,

    #[command(about = "Run the gateway itself in the foreground")]
    Gateway,

    #[command(about = "Show recent gateway log output")]
    Logs {
        #[arg(short = 'n', long, default_value = "50", help = "Number of lines")]
        lines: usize,
        #[arg(long, help = "Rotate the log now instead of printing it")]
        rotate: bool,
    },

    #[command(about = "Reset restart counters")]
    Reset,

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show effective configuration")]
    Show,
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
    },
    #[command(about = "Validate configuration")]
    Validate,
}
