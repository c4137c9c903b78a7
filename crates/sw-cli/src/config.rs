//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use sw_core::PartialConfig;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// User whose schedule the CLI operates on.
    pub user_id: String,

    /// IANA timezone for suggestions; the device timezone when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// System defaults for the suggestion engine (`[suggestions]` table).
    #[serde(default)]
    pub suggestions: PartialConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("user_id", &self.user_id)
            .field("timezone", &self.timezone)
            .field("suggestions", &self.suggestions)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("slotwise.db"),
            user_id: "local".to_string(),
            timezone: None,
            suggestions: PartialConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: built-in defaults, the user config file, `config_path`,
    /// then `SW_*` environment variables (`__` separates nested keys, e.g.
    /// `SW_SUGGESTIONS__BUFFER_MINUTES`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("SW_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for slotwise.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("slotwise"))
}

/// Returns the platform-specific data directory for slotwise.
///
/// On Linux: `~/.local/share/slotwise`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("slotwise"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    #[test]
    fn test_dirs_data_path_ends_with_slotwise() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "slotwise");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("slotwise.db"));
        assert_eq!(config.user_id, "local");
        assert!(config.suggestions.is_empty());
    }

    #[test]
    fn test_explicit_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.set_env("HOME", jail.directory().display().to_string());
            jail.create_file(
                "custom.toml",
                r#"
                database_path = "/tmp/custom.db"
                timezone = "Europe/Berlin"

                [suggestions]
                buffer_minutes = 10
                max_daily_minutes = 300
                "#,
            )?;
            jail.set_env("SW_SUGGESTIONS__BUFFER_MINUTES", "5");
            jail.set_env("SW_USER_ID", "alice");

            let config = Config::load_from(Some(Path::new("custom.toml")))?;
            assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
            assert_eq!(config.user_id, "alice");
            assert_eq!(config.timezone.as_deref(), Some("Europe/Berlin"));
            assert_eq!(config.suggestions.buffer_minutes, Some(5));
            assert_eq!(config.suggestions.max_daily_minutes, Some(300));
            assert_eq!(config.suggestions.prefer_mornings, None);
            Ok(())
        });
    }
}
