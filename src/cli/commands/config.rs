//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::DrydockResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> DrydockResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> DrydockResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> DrydockResult<()> {
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
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE_NAME;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_writes_loadable_defaults() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::for_project(temp.path());

        init_config(&manager, false).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.services.len(), 4);
        assert!(temp.path().join(CONFIG_FILE_NAME).is_file());
    }

    #[tokio::test]
    async fn init_keeps_existing_file_without_force() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "# mine\n").unwrap();
        let manager = ConfigManager::with_path(path.clone());

        init_config(&manager, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

        init_config(&manager, true).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[release]"));
    }
}
