use anyhow::{bail, Context, Result};
use console::Style;
use kioskd_core::config::{data_dir, Config};
use kioskd_core::{Bindings, LocalStateCache, StartOptions, Supervisor};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command, Stdio};
use tracing::{info, warn};

fn pid_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("kioskd.pid"))
}

/// PID of the background orchestrator, if its pid file points at a live process
fn running_pid() -> Result<Option<i32>> {
    let path = pid_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    let pid: i32 = raw.trim().parse().context("Invalid PID in file")?;
    if is_alive(pid) {
        Ok(Some(pid))
    } else {
        // Left behind by a crash
        let _ = fs::remove_file(&path);
        Ok(None)
    }
}

#[cfg(unix)]
fn is_alive(pid: i32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_alive(_pid: i32) -> bool {
    true
}

pub async fn handle_run(config_path: Option<&Path>, options: StartOptions) -> Result<()> {
    let config = Config::load_or_default(config_path).context("Failed to load configuration")?;
    let bindings = Bindings::from_config(&config)?;
    let mut supervisor = Supervisor::new(config, bindings);

    supervisor
        .start_with(options)
        .await
        .context("Orchestrator did not start")?;

    let pid_path = pid_path()?;
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, process::id().to_string())
        .with_context(|| format!("Failed to write PID file: {:?}", pid_path))?;
    info!(pid = process::id(), "kioskd running");

    let outcome = wait_for_shutdown(&supervisor).await;
    info!("Shutting down...");
    supervisor.stop().await;

    if pid_path.exists() {
        let _ = fs::remove_file(&pid_path);
    }
    outcome
}

#[cfg(unix)]
async fn wait_for_shutdown(supervisor: &Supervisor) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut foreground = signal(SignalKind::user_defined1())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = terminate.recv() => return Ok(()),
            _ = foreground.recv() => {
                if !supervisor.request_foreground() {
                    warn!("Foreground request ignored, loop not running");
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_supervisor: &Supervisor) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

pub fn handle_start(config_path: Option<&Path>, options: StartOptions) -> Result<()> {
    if let Some(pid) = running_pid()? {
        println!("kioskd already running (PID: {})", pid);
        return Ok(());
    }

    // Fail here rather than in a detached process nobody watches
    let config = Config::load_or_default(config_path).context("Failed to load configuration")?;
    config.orchestrator_config()?;

    let exe = std::env::current_exe()?;
    Command::new(exe)
        .args(detached_run_args(config_path, options))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to spawn kioskd process")?;

    println!("kioskd started in background.");
    Ok(())
}

/// Arguments for the background `run` child
fn detached_run_args(config_path: Option<&Path>, options: StartOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["run".into(), "--detached".into()];
    if options.force_start {
        args.push("--force-start".into());
        if options.restart_sequence {
            args.push("--restart-sequence".into());
        }
    }
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.into());
    }
    args
}

pub fn handle_stop() -> Result<()> {
    let Some(pid) = running_pid()? else {
        println!("kioskd is not running.");
        return Ok(());
    };

    println!("Stopping kioskd (PID: {})...", pid);

    #[cfg(unix)]
    {
        Command::new("kill")
            .arg(pid.to_string())
            .status()
            .context("Failed to execute kill command")?;
    }

    #[cfg(windows)]
    {
        Command::new("taskkill")
            .arg("/F")
            .arg("/PID")
            .arg(pid.to_string())
            .status()
            .context("Failed to execute taskkill command")?;
        // taskkill skips our shutdown path
        let _ = fs::remove_file(pid_path()?);
    }

    Ok(())
}

pub fn handle_foreground() -> Result<()> {
    let Some(pid) = running_pid()? else {
        bail!("kioskd is not running");
    };
    signal_foreground(pid)?;
    println!("Foreground request sent.");
    Ok(())
}

#[cfg(unix)]
fn signal_foreground(pid: i32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-USR1")
        .arg(pid.to_string())
        .status()
        .context("Failed to execute kill command")?;
    if !status.success() {
        bail!("Could not signal kioskd (PID: {})", pid);
    }
    Ok(())
}

#[cfg(not(unix))]
fn signal_foreground(pid: i32) -> Result<()> {
    bail!("Foreground requests need Unix signals (PID: {})", pid)
}

pub fn handle_status(config_path: Option<&Path>) -> Result<()> {
    let bold = Style::new().bold();
    let green = Style::new().green();
    let red = Style::new().red();

    let config = Config::load_or_default(config_path).context("Failed to load configuration")?;

    println!("{}", bold.apply_to("kioskd status"));
    match running_pid()? {
        Some(pid) => println!("  daemon:      {} (PID {})", green.apply_to("running"), pid),
        None => println!("  daemon:      {}", red.apply_to("stopped")),
    }

    match config.orchestrator_config() {
        Ok(settings) => {
            println!("  config:      {}", green.apply_to("complete"));
            println!("  device:      {} @ {}", settings.device_id, settings.site_id);
            println!("  apps:        {} -> {}", settings.primary_app, settings.kiosk_app);
            println!("  backend:     {}", settings.base_url);
        }
        Err(e) => println!("  config:      {}", red.apply_to(e.user_message())),
    }

    let cache = LocalStateCache::new()?;
    let lock = match cache.load() {
        Ok(true) => green.apply_to("locked".to_string()),
        Ok(false) => Style::new().dim().apply_to("unlocked".to_string()),
        Err(e) => red.apply_to(format!("unreadable ({:#})", e)),
    };
    println!("  local lock:  {}", lock);
    Ok(())
}
