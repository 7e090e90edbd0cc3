//! Tool configuration.
//!
//! This module loads the tunables of the tree walker from a TOML file:
//! - the allow-set of file extensions accepted on the command line
//! - the chunk size used when streaming file copies
//! - the maximum path length accepted for roots and mirrored destinations
//!
//! # Configuration File Format
//!
//! ```toml
//! [extensions]
//! allowed = [".c", ".txt", ".pdf"]
//!
//! [copy]
//! buffer_size = 8192
//!
//! [paths]
//! max_length = 4096
//! ```
//!
//! Every section and key is optional; missing values fall back to the
//! defaults shown above.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions accepted when no configuration overrides them.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".c", ".txt", ".pdf"];

/// Size of the chunk streamed per read/write during a copy.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 8192;

/// Maximum path length in bytes (Linux `PATH_MAX`).
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// An allowed extension does not look like `.ext`.
    #[error("Invalid allowed extension '{0}': expected a leading '.' followed by a name")]
    InvalidExtension(String),
    /// A numeric limit was zero.
    #[error("Invalid configuration: '{0}' must be greater than zero")]
    ZeroLimit(&'static str),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration as deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub extensions: ExtensionRules,

    #[serde(default)]
    pub copy: CopyRules,

    #[serde(default)]
    pub paths: PathRules,
}

/// Extensions accepted by `list-by-extension`, `copy` and `delete-by-extension`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionRules {
    #[serde(default = "default_allowed_extensions")]
    pub allowed: Vec<String>,
}

impl Default for ExtensionRules {
    fn default() -> Self {
        Self {
            allowed: default_allowed_extensions(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    DEFAULT_ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRules {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for CopyRules {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRules {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for PathRules {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

fn default_max_length() -> usize {
    DEFAULT_MAX_PATH_LENGTH
}

impl ToolConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.treewalkrc.toml` in the current directory
    /// 3. Look for `config.toml` under `<home>/.config/treewalk/`
    /// 4. Fall back to default configuration
    ///
    /// The loaded configuration is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly provided file cannot be read, if any
    /// file found fails to parse, or if the values are out of range.
    pub fn load(config_path: Option<&Path>, home: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::discover(config_path, home)?;
        config.validate()?;
        Ok(config)
    }

    fn discover(config_path: Option<&Path>, home: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".treewalkrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home) = home {
            let home_config = home.join(".config").join("treewalk").join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Check that every value can be used by the walker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for ext in &self.extensions.allowed {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ConfigError::InvalidExtension(ext.clone()));
            }
        }
        if self.copy.buffer_size == 0 {
            return Err(ConfigError::ZeroLimit("copy.buffer_size"));
        }
        if self.paths.max_length == 0 {
            return Err(ConfigError::ZeroLimit("paths.max_length"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        let config = ToolConfig::default();
        assert_eq!(config.extensions.allowed, vec![".c", ".txt", ".pdf"]);
        assert_eq!(config.copy.buffer_size, 8192);
        assert_eq!(config.paths.max_length, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ToolConfig = toml::from_str("[copy]\nbuffer_size = 512\n").unwrap();
        assert_eq!(config.copy.buffer_size, 512);
        assert_eq!(config.extensions.allowed.len(), 3);
        assert_eq!(config.paths.max_length, DEFAULT_MAX_PATH_LENGTH);
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("treewalk.toml");
        fs::write(&path, "[extensions]\nallowed = [\".md\"]\n").unwrap();

        let config = ToolConfig::load(Some(&path), None).unwrap();
        assert_eq!(config.extensions.allowed, vec![".md"]);
    }

    #[test]
    fn test_load_from_home_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".config").join("treewalk");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "[paths]\nmax_length = 256\n").unwrap();

        let config = ToolConfig::load(None, Some(temp_dir.path())).unwrap();
        assert_eq!(config.paths.max_length, 256);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = ToolConfig::load(Some(Path::new("/non/existent/treewalk.toml")), None);
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[copy\nbuffer_size = ").unwrap();

        let result = ToolConfig::load(Some(&path), None);
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_extension_without_dot_rejected() {
        let mut config = ToolConfig::default();
        config.extensions.allowed.push("rs".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExtension(ext)) if ext == "rs"
        ));

        config.extensions.allowed = vec![".".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = ToolConfig::default();
        config.copy.buffer_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLimit("copy.buffer_size"))
        ));
    }
}
