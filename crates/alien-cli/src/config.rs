//! Settings and scene loading.

use alien_core::Settings;
use alien_model::DataDescription;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Command line values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub seed: Option<u64>,
    pub world_width: Option<u32>,
    pub world_height: Option<u32>,
}

/// Defaults, then the JSON file if given, then the overrides.
pub fn load_settings(path: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            let settings: Settings = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse settings in {}", path.display()))?;
            info!(path = %path.display(), "Loaded settings");
            settings
        }
        None => Settings::default(),
    };
    if let Some(seed) = overrides.seed {
        settings.general.seed = seed;
    }
    if let Some(width) = overrides.world_width {
        settings.general.world_width = width;
    }
    if let Some(height) = overrides.world_height {
        settings.general.world_height = height;
    }
    Ok(settings)
}

pub fn load_scene(path: &Path) -> Result<DataDescription> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse scene in {}", path.display()))
}

pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
