mod sections;
mod supervisor;

pub use sections::{GatewayConfig, LoggingConfig, RestartConfig, TimeoutsConfig};
pub use supervisor::{
    config_path, default_workspace, SupervisorConfig, ENV_GATEWAY_BIN, ENV_HOME, ENV_LOG_LEVEL,
    ENV_MAX_RESTARTS,
};
