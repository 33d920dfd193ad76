//! Configuration management for the lernex rendering engine

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub stream: StreamConfig,
    pub heuristics: HeuristicsConfig,
    pub tables: TableConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Pending-buffer length (in bytes) past which an overflow flush is taken
    pub flush_threshold: usize,
    /// Debounce window for typeset scheduling, in milliseconds
    pub typeset_debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Promote bare `x_2` / `x^2` shorthand in prose to inline math
    pub promote_scripts: bool,
    /// Wrap known LaTeX commands found outside math in inline math
    pub wrap_bare_macros: bool,
    /// Normalize `\dfrac`/`\tfrac` to `\frac`
    pub normalize_fractions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Convert Markdown pipe tables to HTML tables before math scanning
    pub pipe_tables: bool,
    /// Convert LaTeX `tabular` environments to HTML tables
    pub latex_tabular: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            heuristics: HeuristicsConfig::default(),
            tables: TableConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 160,
            typeset_debounce_ms: 40,
        }
    }
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            promote_scripts: true,
            wrap_bare_macros: true,
            normalize_fractions: true,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            pipe_tables: true,
            latex_tabular: true,
        }
    }
}

impl FormatConfig {
    /// Get the platform-specific config file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "lernex")
            .map(|proj_dirs| proj_dirs.config_dir().join("lernex.toml"))
    }

    /// Load configuration from file, falling back to defaults if missing
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load from a specific path (for testing)
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FormatConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FormatConfig::default();
        assert_eq!(config.stream.flush_threshold, 160);
        assert_eq!(config.stream.typeset_debounce_ms, 40);
        assert!(config.heuristics.promote_scripts);
        assert!(config.tables.pipe_tables);
    }

    #[test]
    fn test_load_valid_toml() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(
            b"[stream]\n\
flush_threshold = 256\n\
typeset_debounce_ms = 16\n\
\n\
[heuristics]\n\
promote_scripts = false\n\
wrap_bare_macros = true\n\
normalize_fractions = true\n\
\n\
[tables]\n\
pipe_tables = true\n\
latex_tabular = false\n",
        )?;

        let config = FormatConfig::load_from(file.path())?;
        assert_eq!(config.stream.flush_threshold, 256);
        assert_eq!(config.stream.typeset_debounce_ms, 16);
        assert!(!config.heuristics.promote_scripts);
        assert!(!config.tables.latex_tabular);

        Ok(())
    }

    #[test]
    fn test_load_partial_toml() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"[stream]\nflush_threshold = 64\n")?;

        let config = FormatConfig::load_from(file.path())?;
        assert_eq!(config.stream.flush_threshold, 64);
        // Unspecified sections fall back to defaults
        assert_eq!(config.stream.typeset_debounce_ms, 40);
        assert!(config.heuristics.wrap_bare_macros);

        Ok(())
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"invalid toml [[[syntax").unwrap();

        let result = FormatConfig::load_from(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_path_returns_some() {
        let path = FormatConfig::config_path();
        assert!(path.is_some());
        if let Some(p) = path {
            assert!(p.to_string_lossy().contains("lernex"));
            assert!(p.to_string_lossy().ends_with("lernex.toml"));
        }
    }

    #[test]
    fn test_config_round_trip() -> Result<()> {
        let config = FormatConfig {
            stream: StreamConfig {
                flush_threshold: 80,
                typeset_debounce_ms: 100,
            },
            ..Default::default()
        };

        let toml_str = toml::to_string(&config)?;
        let parsed: FormatConfig = toml::from_str(&toml_str)?;
        assert_eq!(parsed.stream.flush_threshold, 80);
        assert_eq!(parsed.stream.typeset_debounce_ms, 100);

        Ok(())
    }
}
