//! Show or create the persisted defaults file.

use vfs_common::config::{config_file_path, AppConfig};

pub fn show(app: &AppConfig) -> anyhow::Result<()> {
    let path = config_file_path();
    let state = if path.exists() { "" } else { " (not created, using defaults)" };
    println!("Config: {}{state}", path.display());
    println!("{}", serde_json::to_string_pretty(app)?);
    Ok(())
}

pub fn init(force: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}, pass --force to overwrite",
            path.display()
        );
    }

    let written = AppConfig::default()
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
    println!("Wrote default config to {}", written.display());
    Ok(())
}
