//! Application Configuration
//!
//! Recognition and backend settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::RecognitionConfig;

/// File name inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine selection
    pub engine: EngineSettings,
    /// Recognition settings shared by every image in a batch
    pub recognition: RecognitionConfig,
}

/// Recognition backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineBackend {
    /// Platform OCR when available, otherwise no-op
    #[default]
    Auto,
    /// Windows built-in OCR
    Windows,
    /// Finds no text; useful for dry runs
    Noop,
}

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub backend: EngineBackend,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file, creating parent directories
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "flashcardocr", "FlashcardOcr")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load `path` if given, else the default config file if it exists, else defaults.
///
/// An explicitly given path must exist.
pub fn load_or_default(path: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = path {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }

    let default_path = default_config_path()?;
    if default_path.exists() {
        return Ok((load_config(&default_path)?, Some(default_path)));
    }

    Ok((AppConfig::default(), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{RecognitionLevel, DEFAULT_CONCURRENT_TASKS, DEFAULT_MAX_DIMENSION};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.engine.backend, EngineBackend::Auto);
        assert!(config.recognition.languages().is_empty());
        assert_eq!(config.recognition.recognition_level(), RecognitionLevel::Accurate);
        assert!(config.recognition.uses_language_correction());
        assert_eq!(config.recognition.max_dimension(), DEFAULT_MAX_DIMENSION);
        assert_eq!(config.recognition.concurrent_tasks(), DEFAULT_CONCURRENT_TASKS);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig {
            engine: EngineSettings {
                backend: EngineBackend::Noop,
            },
            recognition: RecognitionConfig::default()
                .with_languages(["en-US", "es-ES"])
                .with_recognition_level(RecognitionLevel::Fast)
                .with_concurrent_tasks(6)
                .with_custom_words(["mitochondria"]),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [recognition]
            concurrent_tasks = 0
            languages = ["de-DE"]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.engine.backend, EngineBackend::Auto);
        assert_eq!(parsed.recognition.concurrent_tasks(), 1);
        assert_eq!(parsed.recognition.languages(), &["de-DE".to_string()]);
        assert_eq!(parsed.recognition.max_dimension(), DEFAULT_MAX_DIMENSION);
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = AppConfig {
            recognition: RecognitionConfig::default().with_max_dimension(1024),
            ..AppConfig::default()
        };

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_with_explicit_path() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[engine]\nbackend = \"windows\"").unwrap();

        let (config, path) = load_or_default(Some(temp_file.path())).unwrap();
        assert_eq!(config.engine.backend, EngineBackend::Windows);
        assert_eq!(path.as_deref(), Some(temp_file.path()));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[engine]\nbackend = \"tesseract\"");
        assert!(result.is_err());
    }
}
