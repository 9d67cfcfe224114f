//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, SETTABLE_KEYS};
use crate::error::{HubError, HubResult};
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> HubResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, &key, &value).await?,
    }

    Ok(())
}

/// Print the effective configuration, environment overrides included
fn show_config(config: &Config) -> HubResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    if let Some(dir) = config.cache_dir() {
        println!("# effective cache directory: {}", dir.display());
    }
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> HubResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> HubResult<()> {
    let ctx = UiContext::detect();

    if !SETTABLE_KEYS.contains(&key) {
        ui::remark(&ctx, "Valid keys:");
        for key in SETTABLE_KEYS {
            ui::remark(&ctx, &format!("  {}", key));
        }
        return Err(HubError::User(format!("Unknown config key: {}", key)));
    }

    manager.set_value(key, value).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));

    Ok(())
}
