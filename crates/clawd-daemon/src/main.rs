mod cli;

use clap::Parser;
use clawd_daemon::config::{self, default_workspace};
use clawd_daemon::is_supervised;
use clawd_types::ClawdResult;
use cli::{
    Cli, Commands, init_logging, print_err, handle_config, run_gateway, reset_counters,
    restart_gateway, show_logs, show_status, start_gateway, stop_gateway, supervise,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A supervised gateway logs into the workspace log instead.
    if !(matches!(cli.command, Commands::Gateway) && is_supervised()) {
        init_logging(&cli);
    }

    if let Err(e) = dispatch(cli).await {
        print_err(&e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> ClawdResult<()> {
    let workspace = cli.workspace.clone().unwrap_or_else(default_workspace);
    let config_path = cli.config.clone().unwrap_or_else(|| config::config_path(&workspace));

    match cli.command {
        Commands::Start { args } => {
            start_gateway(&workspace, &config_path, &args).await?;
        }
        Commands::Stop => {
            stop_gateway(&workspace, &config_path).await?;
        }
        Commands::Restart => {
            restart_gateway(&workspace, &config_path).await?;
        }
        Commands::Status => {
            show_status(&workspace, &config_path, cli.format)?;
        }
        Commands::Supervise => {
            supervise(&workspace, &config_path).await?;
        }
        Commands::Gateway => {
            run_gateway(&workspace, &config_path).await?;
        }
        Commands::Logs { lines, rotate } => {
            show_logs(&workspace, &config_path, lines, rotate)?;
        }
        Commands::Reset => {
            reset_counters(&workspace, &config_path)?;
        }
        Commands::Config { action } => {
            handle_config(&config_path, action)?;
        }
    }

    Ok(())
}
