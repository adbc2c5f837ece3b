use anyhow::{anyhow, Context, Result};
use fwinspect_core::config::InspectionConfig;

/// Render the default inspection config as `json` or `yaml`.
pub fn default_config_text(format: &str) -> Result<String> {
    let config = InspectionConfig::default();
    match format {
        "json" => serde_json::to_string_pretty(&config).context("Failed to serialize config JSON"),
        "yaml" | "yml" => serde_yaml::to_string(&config).context("Failed to serialize config YAML"),
        other => Err(anyhow!("Invalid format '{}'. Allowed: json, yaml", other)),
    }
}

/// Print the default config so it can be saved and edited.
pub fn default_config_command(format: &str) -> Result<()> {
    let text = default_config_text(format)?;
    println!("{}", text.trim_end());
    Ok(())
}
