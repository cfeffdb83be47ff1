use super::commands::{Cli, BUILD_VERSION};
use clawd_daemon::{Service, SupervisorConfig};
use clawd_types::ClawdResult;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "info,clawd_daemon=debug",
            2 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter);

    if let Some(ref log_file) = cli.log_file {
        match std::fs::OpenOptions::new().create(true).append(true).open(log_file) {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false);
                subscriber.with(file_layer).init();
                return;
            }
            Err(e) => eprintln!("Failed to open log file {:?}: {}", log_file, e),
        }
    }

    let stdout_layer = fmt::layer()
        .with_target(cli.verbose >= 2);
    subscriber.with(stdout_layer).init();
}

pub fn load_config(config_path: &Path) -> ClawdResult<SupervisorConfig> {
    SupervisorConfig::load(config_path)
}

pub fn load_service(workspace: &Path, config_path: &Path, extra_args: &[String]) -> ClawdResult<Service> {
    let config = load_config(config_path)?;
    let mut service_config = config.service_config(workspace, BUILD_VERSION)?;
    service_config.args.extend(extra_args.iter().cloned());
    Service::new(service_config)
}

pub fn print_ok(message: impl std::fmt::Display) {
    println!("\x1b[38;5;46m[+]\x1b[0m {}", message);
}

pub fn print_warn(message: impl std::fmt::Display) {
    println!("\x1b[38;5;226m[!]\x1b[0m {}", message);
}

pub fn print_err(message: impl std::fmt::Display) {
    eprintln!("\x1b[38;5;196m[-]\x1b[0m {}", message);
}
