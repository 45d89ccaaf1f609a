//! Configuration file support for the regimen tools.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/regimen/config.toml`.
//! Every section and field is optional. Dates are written as quoted ISO
//! strings, e.g. `off_week_start = "2026-02-02"`.

use crate::ics_export::IcsOptions;
use crate::{Error, RegimenModel, Result, RunParams};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub ics: IcsConfig,

    #[serde(default)]
    pub digest: DigestConfig,
}

/// Which regimen model to use
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ModelConfig {
    /// TOML or JSON model file; the built-in regimen when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Run-wide parameters
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct RunConfig {
    /// Target year; the current year when absent
    #[serde(default)]
    pub year: Option<i32>,

    /// First day (a Monday) of the off-week
    #[serde(default)]
    pub off_week_start: Option<NaiveDate>,

    /// Anchor for `custom_date` cycle rules
    #[serde(default)]
    pub cycle_anchor: Option<NaiveDate>,

    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

/// Export destination
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Calendar export settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IcsConfig {
    #[serde(default = "default_calendar_name")]
    pub calendar_name: String,

    #[serde(default = "default_uid_prefix")]
    pub uid_prefix: String,

    #[serde(default = "default_true")]
    pub include_empty_days: bool,
}

impl Default for IcsConfig {
    fn default() -> Self {
        Self {
            calendar_name: default_calendar_name(),
            uid_prefix: default_uid_prefix(),
            include_empty_days: true,
        }
    }
}

impl IcsConfig {
    /// Export options stamped with `dtstamp`
    pub fn options(&self, dtstamp: DateTime<Utc>) -> IcsOptions {
        IcsOptions {
            calendar_name: self.calendar_name.clone(),
            uid_prefix: self.uid_prefix.clone(),
            include_empty_days: self.include_empty_days,
            dtstamp,
        }
    }
}

/// Digest settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DigestConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Shown in the digest header only; nothing is sent
    #[serde(default)]
    pub recipient: Option<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            recipient: None,
        }
    }
}

// Default value functions
fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}

fn default_output_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir().join(".local/share"));
    base.join("regimen")
}

fn default_calendar_name() -> String {
    "Regimen".into()
}

fn default_uid_prefix() -> String {
    "regimen".into()
}

fn default_true() -> bool {
    true
}

fn default_window_days() -> u32 {
    1
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir().join(".config"));
        base.join("regimen").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Run parameters from the `[run]` section
    pub fn run_params(&self) -> RunParams {
        RunParams {
            off_week_start_date: self.run.off_week_start,
            off_week_week_of_year: None,
            cycle_anchor_date: self.run.cycle_anchor,
            flags: self.run.flags.clone(),
        }
    }

    /// The configured model file, or the built-in regimen
    pub fn load_model(&self) -> Result<RegimenModel> {
        match &self.model.path {
            Some(path) => crate::loader::load_model(path),
            None => Ok(crate::catalog::get_default_model().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.model.path.is_none());
        assert_eq!(config.run.year, None);
        assert_eq!(config.ics.uid_prefix, "regimen");
        assert!(config.ics.include_empty_days);
        assert_eq!(config.digest.window_days, 1);
        assert!(config.output.dir.ends_with("regimen"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.run.off_week_start = NaiveDate::from_ymd_opt(2026, 2, 2);
        config.run.flags.insert("enable_melissa".into(), true);

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("regimen").join("config.toml");
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[run]
year = 2026
off_week_start = "2026-02-02"
cycle_anchor = "2026-01-06"

[run.flags]
enable_melissa = true

[ics]
calendar_name = "Supplements"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.run.year, Some(2026));
        assert_eq!(config.ics.calendar_name, "Supplements");
        assert_eq!(config.ics.uid_prefix, "regimen"); // default
        assert_eq!(config.digest.window_days, 1); // default

        let params = config.run_params();
        assert_eq!(params.off_week_start_date, NaiveDate::from_ymd_opt(2026, 2, 2));
        assert_eq!(params.cycle_anchor_date, NaiveDate::from_ymd_opt(2026, 1, 6));
        assert!(params.flag("enable_melissa"));
        assert!(params.off_week_week_of_year.is_none());
    }

    #[test]
    fn test_bad_date_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[run]\noff_week_start = \"2026-02-30\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_model_when_no_path() {
        let model = Config::default().load_model().unwrap();
        assert!(model.supplements.contains_key("nmn"));
    }

    #[test]
    fn test_model_path_is_loaded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model_path = temp_dir.path().join("custom.json");
        let mut model = crate::catalog::build_default_model();
        model.core_set = vec!["collagen".into()];
        crate::loader::save_model(&model, &model_path).unwrap();

        let config = Config {
            model: ModelConfig {
                path: Some(model_path),
            },
            ..Default::default()
        };
        assert_eq!(config.load_model().unwrap().core_set, vec!["collagen"]);
    }

    #[test]
    fn test_ics_options_from_config() {
        let stamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let options = IcsConfig::default().options(stamp);
        assert_eq!(options.uid_prefix, "regimen");
        assert_eq!(options.dtstamp, stamp);
    }
}
