use super::commands::ConfigAction;
use super::utils::{print_ok, print_warn};
use clawd_daemon::SupervisorConfig;
use clawd_types::{ClawdError, ClawdResult};
use std::path::Path;

pub fn handle_config(config_path: &Path, action: Option<ConfigAction>) -> ClawdResult<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let config = SupervisorConfig::load(config_path)?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| ClawdError::Config(format!("Failed to serialize config: {}", e)))?;
            if !config_path.exists() {
                println!("\x1b[38;5;245m# No configuration file at {:?}, showing defaults\x1b[0m", config_path);
            }
            println!("{}", rendered);
        }
        Some(ConfigAction::Init { force }) => {
            if config_path.exists() && !force {
                print_warn(format!("Configuration already exists at {:?}", config_path));
                println!("Use '\x1b[38;5;51mclawd config init --force\x1b[0m' to overwrite");
                return Ok(());
            }
            SupervisorConfig::default().save(config_path)?;
            print_ok(format!("Configuration written to {:?}", config_path));
        }
        Some(ConfigAction::Validate) => {
            SupervisorConfig::load(config_path)?;
            print_ok("Configuration is valid");
        }
    }
    Ok(())
}
