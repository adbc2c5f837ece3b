//! Tunables for an inspection run.
//!
//! Defaults match a typical Pixhawk-class ArduPilot build; every field can be
//! overridden from a JSON or YAML file, and the CLI layers its flags on top.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Default flash capacity: 2 MiB.
pub const DEFAULT_FLASH_CAPACITY: u64 = 2 * 1024 * 1024;
/// RAM usage assumed when no companion object file is available.
pub const DEFAULT_RAM_ESTIMATE: u64 = 64 * 1024;
pub const DEFAULT_PROJECT_KEYWORD: &str = "ardupilot";
pub const DEFAULT_VERSION_KEYWORDS: [&str; 3] = ["version", "build", "commit"];
pub const DEFAULT_BOARD_KEYWORD: &str = "pixhawk";
pub const DEFAULT_MATCH_LIMIT: usize = 3;
pub const DEFAULT_MIN_RUN_LENGTH: usize = 4;
/// Utilisation above this percentage is flagged.
pub const HIGH_USAGE_THRESHOLD_PERCENT: u64 = 80;

/// Serializable configuration for `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// Total flash of the target board in bytes.
    pub flash_capacity: u64,
    /// RAM usage reported when sections have to be estimated.
    pub ram_estimate: u64,
    pub project_keyword: String,
    pub version_keywords: Vec<String>,
    pub board_keyword: String,
    /// Maximum matches kept per string category.
    pub match_limit: usize,
    /// Shortest printable run treated as a string.
    pub min_run_length: usize,
    /// Run the (slower) location scan.
    pub scan_locations: bool,
    /// Bound on how far a JSON metadata candidate is followed; `None` is unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_search_limit: Option<usize>,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            flash_capacity: DEFAULT_FLASH_CAPACITY,
            ram_estimate: DEFAULT_RAM_ESTIMATE,
            project_keyword: DEFAULT_PROJECT_KEYWORD.to_string(),
            version_keywords: DEFAULT_VERSION_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            board_keyword: DEFAULT_BOARD_KEYWORD.to_string(),
            match_limit: DEFAULT_MATCH_LIMIT,
            min_run_length: DEFAULT_MIN_RUN_LENGTH,
            scan_locations: false,
            metadata_search_limit: None,
        }
    }
}

impl InspectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flash_capacity == 0 {
            return Err(anyhow!("flash_capacity must be greater than zero"));
        }
        if self.min_run_length == 0 {
            return Err(anyhow!("min_run_length must be at least 1"));
        }
        if self.project_keyword.trim().is_empty() {
            return Err(anyhow!("project_keyword is required"));
        }
        if self.board_keyword.trim().is_empty() {
            return Err(anyhow!("board_keyword is required"));
        }
        if self.version_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(anyhow!("version_keywords must not contain empty entries"));
        }
        Ok(())
    }
}

/// Load an inspection config from a `.json`, `.yaml` or `.yml` file and validate it.
pub fn load_inspection_config(path: &Path) -> Result<InspectionConfig> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inspection config at {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    let config: InspectionConfig = match ext.as_str() {
        "json" => serde_json::from_str(&body).context("Failed to parse inspection config JSON")?,
        "yaml" | "yml" => {
            serde_yaml::from_str(&body).context("Failed to parse inspection config YAML")?
        }
        other => {
            return Err(anyhow!(
                "Unsupported config format '{}' for {} (expected json, yaml or yml)",
                other,
                path.display()
            ))
        }
    };
    config.validate().with_context(|| format!("Invalid inspection config {}", path.display()))?;
    Ok(config)
}
