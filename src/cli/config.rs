use anyhow::{Context, Result};
use console::Style;
use kioskd_core::config::Config;
use kioskd_core::identity;
use std::path::{Path, PathBuf};

/// Values given on the command line for `config init`
#[derive(Debug, Default)]
pub struct InitArgs {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub site_id: Option<String>,
    pub device_id: Option<String>,
    pub primary: Option<String>,
    pub kiosk: Option<String>,
    /// Prompt for every required field still blank
    pub interactive: bool,
}

fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path().context("Could not determine config directory"),
    }
}

fn set_if_given(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *target = value.trim().to_string();
    }
}

/// Apply `args` over the existing file (or defaults) and save it
pub fn handle_init(config_path: Option<&Path>, args: InitArgs) -> Result<()> {
    let path = resolve_path(config_path)?;
    let mut config = Config::load_or_default(Some(path.as_path()))
        .with_context(|| format!("Failed to load existing config: {:?}", path))?;

    let interactive = args.interactive;
    apply_init(&mut config, args);
    if interactive {
        prompt_missing(&mut config)?;
    }
    config
        .save(&path)
        .with_context(|| format!("Failed to save config: {:?}", path))?;

    println!("Config written to {}", Style::new().bold().apply_to(path.display()));
    match config.orchestrator_config() {
        Ok(_) => println!("{}", Style::new().green().apply_to("Configuration complete.")),
        Err(e) => println!("{}", Style::new().yellow().apply_to(e.user_message())),
    }
    Ok(())
}

fn apply_init(config: &mut Config, args: InitArgs) {
    set_if_given(&mut config.remote.base_url, args.base_url);
    set_if_given(&mut config.remote.api_key, args.api_key);
    set_if_given(&mut config.device.site_id, args.site_id);
    set_if_given(&mut config.device.device_id, args.device_id);
    set_if_given(&mut config.apps.primary, args.primary);
    set_if_given(&mut config.apps.kiosk, args.kiosk);

    if config.device.device_id.trim().is_empty() {
        config.device.device_id = identity::stable_device_id();
    }
}

fn prompt_missing(config: &mut Config) -> Result<()> {
    let fields: [(&str, &mut String); 5] = [
        ("Backend base URL:", &mut config.remote.base_url),
        ("Backend API key:", &mut config.remote.api_key),
        ("Site id:", &mut config.device.site_id),
        ("Primary app id:", &mut config.apps.primary),
        ("Kiosk app id:", &mut config.apps.kiosk),
    ];
    for (label, value) in fields {
        if value.trim().is_empty() {
            *value = inquire::Text::new(label).prompt()?.trim().to_string();
        }
    }
    Ok(())
}

pub fn handle_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path)?;
    let mut config = Config::load_or_default(Some(path.as_path())).context("Failed to load configuration")?;
    config.remote.api_key = mask_secret(&config.remote.api_key);

    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
