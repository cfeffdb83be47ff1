mod commands;
mod config_cmd;
mod gateway;
mod run;
mod service;
mod utils;

pub use commands::{Cli, Commands};
pub use config_cmd::handle_config;
pub use gateway::run_gateway;
pub use service::{
    reset_counters, restart_gateway, show_logs, show_status, start_gateway, stop_gateway, supervise,
};
pub use utils::{init_logging, print_err};
