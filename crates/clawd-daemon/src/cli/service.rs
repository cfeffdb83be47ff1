use super::commands::OutputFormat;
use super::run::abort_on_shutdown;
use super::utils::{load_service, print_ok};
use chrono::Utc;
use clawd_daemon::logger::tail;
use clawd_types::{format_ago, format_uptime, ClawdError, ClawdResult, StatusInfo};
use std::path::Path;
use std::sync::Arc;

pub async fn start_gateway(workspace: &Path, config_path: &Path, args: &[String]) -> ClawdResult<()> {
    let service = load_service(workspace, config_path, args)?;
    match service.start().await {
        Ok(pid) => {
            print_ok(format!("Gateway started (PID {})", pid));
            println!("Logs: \x1b[38;5;245m{}\x1b[0m", service.config().log_path().display());
            Ok(())
        }
        Err(e) => {
            if e.already_running_pid().is_some() {
                println!("Use '\x1b[38;5;51mclawd restart\x1b[0m' to restart it");
            }
            Err(e)
        }
    }
}

pub async fn stop_gateway(workspace: &Path, config_path: &Path) -> ClawdResult<()> {
    let service = load_service(workspace, config_path, &[])?;
    let pid = service.pid_file().read();
    match service.stop().await {
        Ok(()) => {
            print_ok(format!("Gateway stopped (PID {})", pid));
            Ok(())
        }
        Err(ClawdError::NotRunning) => {
            println!("\x1b[38;5;245mGateway is not running\x1b[0m");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub async fn restart_gateway(workspace: &Path, config_path: &Path) -> ClawdResult<()> {
    let service = load_service(workspace, config_path, &[])?;
    let pid = service.restart().await?;
    print_ok(format!("Gateway restarted (PID {})", pid));
    Ok(())
}

pub fn show_status(workspace: &Path, config_path: &Path, format: OutputFormat) -> ClawdResult<()> {
    let service = load_service(workspace, config_path, &[])?;
    let status = service.status();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&status)
                .map_err(|e| ClawdError::Serialization(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => print_status(&status),
    }
    Ok(())
}

fn print_status(status: &StatusInfo) {
    if status.running {
        println!("\x1b[38;5;46m* Gateway: RUNNING\x1b[0m");
    } else {
        println!("\x1b[38;5;245m* Gateway: NOT RUNNING\x1b[0m");
    }
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));

    if let Some(pid) = status.pid {
        println!("PID:             \x1b[38;5;226m{}\x1b[0m", pid);
        println!("Uptime:          \x1b[38;5;51m{}\x1b[0m", format_uptime(status.uptime()));
    }
    println!("Phase:           {}", status.phase);
    match status.last_restart_time {
        Some(last) => println!(
            "Restarts:        \x1b[38;5;51m{}\x1b[0m (last {})",
            status.restart_count,
            format_ago(last, Utc::now())
        ),
        None => println!("Restarts:        \x1b[38;5;51m{}\x1b[0m", status.restart_count),
    }
    if status.crash_count > 0 {
        println!("Recent crashes:  \x1b[38;5;196m{}\x1b[0m", status.crash_count);
    }
    if !status.version.is_empty() {
        println!("Version:         {}", status.version);
    }
    println!("Log:             \x1b[38;5;245m{}\x1b[0m", status.log_path.display());
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));

    if !status.running {
        println!();
        println!("Start with: \x1b[38;5;51mclawd start\x1b[0m");
    }
}

pub fn reset_counters(workspace: &Path, config_path: &Path) -> ClawdResult<()> {
    let service = load_service(workspace, config_path, &[])?;
    service.reset_counters()?;
    print_ok("Restart counters reset");
    Ok(())
}

pub fn show_logs(workspace: &Path, config_path: &Path, lines: usize, rotate: bool) -> ClawdResult<()> {
    let service = load_service(workspace, config_path, &[])?;

    if rotate {
        let log = service.open_log()?;
        log.rotate()?;
        print_ok(format!("Rotated {} ({} backups)", log.path().display(), log.backups().len()));
        return Ok(());
    }

    let path = service.config().log_path();
    let recent = tail(path, lines)?;
    if recent.is_empty() {
        println!("\x1b[38;5;245mNo log output at {}\x1b[0m", path.display());
    }
    for line in recent {
        println!("{}", line);
    }
    Ok(())
}

pub async fn supervise(workspace: &Path, config_path: &Path) -> ClawdResult<()> {
    let service = Arc::new(load_service(workspace, config_path, &[])?);
    abort_on_shutdown(service.clone());

    print_ok(format!(
        "Supervising gateway (workspace {})",
        workspace.display()
    ));

    match service.run_with_auto_restart().await {
        Ok(()) => {
            print_ok("Gateway exited cleanly");
            Ok(())
        }
        Err(ClawdError::Aborted) => {
            print_ok("Supervisor stopped");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
