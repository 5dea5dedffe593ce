//! Runtime settings for a table process.
//!
//! Values start from defaults, are overridden by the TOML file named in
//! `HOLDEM_CONFIG`, and finally by individual environment variables.
//! Every value remembers where it came from.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use holdem_engine::config::{MinRaiseRule, TableConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_ENV: &str = "HOLDEM_CONFIG";
pub const SEED_ENV: &str = "HOLDEM_SEED";
pub const SMALL_BLIND_ENV: &str = "HOLDEM_SMALL_BLIND";
pub const BIG_BLIND_ENV: &str = "HOLDEM_BIG_BLIND";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSettings {
    pub table: TableConfig,
    /// Commands queued for the table task before senders wait
    pub command_buffer: usize,
    /// Events buffered per subscriber before it is dropped as too slow
    pub event_buffer: usize,
    /// JSONL file for hand checkpoints; in memory only when unset
    pub checkpoint_path: Option<PathBuf>,
    /// Time a seat gets to act before it is checked or folded
    pub action_timeout_ms: Option<u64>,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            command_buffer: 64,
            event_buffer: 1000,
            checkpoint_path: None,
            action_timeout_ms: None,
        }
    }
}

impl TableSettings {
    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.table
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.command_buffer == 0 {
            return Err(SettingsError::Invalid(
                "command_buffer must be greater than 0".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(SettingsError::Invalid(
                "event_buffer must be greater than 0".into(),
            ));
        }
        if self.action_timeout_ms == Some(0) {
            return Err(SettingsError::Invalid(
                "action_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingsSources {
    pub small_blind: ValueSource,
    pub big_blind: ValueSource,
    pub max_seats: ValueSource,
    pub seed: ValueSource,
    pub min_raise_rule: ValueSource,
    pub checkpoint_path: ValueSource,
    pub action_timeout_ms: ValueSource,
}

impl Default for SettingsSources {
    fn default() -> Self {
        Self {
            small_blind: ValueSource::Default,
            big_blind: ValueSource::Default,
            max_seats: ValueSource::Default,
            seed: ValueSource::Default,
            min_raise_rule: ValueSource::Default,
            checkpoint_path: ValueSource::Default,
            action_timeout_ms: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsResolved {
    pub settings: TableSettings,
    pub sources: SettingsSources,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid settings value: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    small_blind: Option<u32>,
    big_blind: Option<u32>,
    max_seats: Option<u8>,
    seed: Option<u64>,
    min_raise_rule: Option<MinRaiseRule>,
    command_buffer: Option<usize>,
    event_buffer: Option<usize>,
    checkpoint_path: Option<PathBuf>,
    action_timeout_ms: Option<u64>,
}

pub fn load() -> Result<TableSettings, SettingsError> {
    load_with_sources().map(|resolved| resolved.settings)
}

pub fn load_with_sources() -> Result<SettingsResolved, SettingsError> {
    let mut settings = TableSettings::default();
    let mut sources = SettingsSources::default();

    if let Some(path) = env_value(CONFIG_ENV) {
        let text = fs::read_to_string(&path)?;
        let file: FileSettings = toml::from_str(&text)?;
        apply_file(&mut settings, &mut sources, file);
        tracing::debug!(path = %path, "loaded table settings file");
    }

    if let Some(seed) = env_value(SEED_ENV) {
        settings.table.seed = Some(parse_env(SEED_ENV, &seed)?);
        sources.seed = ValueSource::Env;
    }
    if let Some(sb) = env_value(SMALL_BLIND_ENV) {
        settings.table.small_blind = parse_env(SMALL_BLIND_ENV, &sb)?;
        sources.small_blind = ValueSource::Env;
    }
    if let Some(bb) = env_value(BIG_BLIND_ENV) {
        settings.table.big_blind = parse_env(BIG_BLIND_ENV, &bb)?;
        sources.big_blind = ValueSource::Env;
    }

    settings.validate()?;
    Ok(SettingsResolved { settings, sources })
}

fn apply_file(settings: &mut TableSettings, sources: &mut SettingsSources, file: FileSettings) {
    if let Some(v) = file.small_blind {
        settings.table.small_blind = v;
        sources.small_blind = ValueSource::File;
    }
    if let Some(v) = file.big_blind {
        settings.table.big_blind = v;
        sources.big_blind = ValueSource::File;
    }
    if let Some(v) = file.max_seats {
        settings.table.max_seats = v;
        sources.max_seats = ValueSource::File;
    }
    if let Some(v) = file.seed {
        settings.table.seed = Some(v);
        sources.seed = ValueSource::File;
    }
    if let Some(v) = file.min_raise_rule {
        settings.table.min_raise_rule = v;
        sources.min_raise_rule = ValueSource::File;
    }
    if let Some(v) = file.checkpoint_path {
        settings.checkpoint_path = Some(v);
        sources.checkpoint_path = ValueSource::File;
    }
    if let Some(v) = file.action_timeout_ms {
        settings.action_timeout_ms = Some(v);
        sources.action_timeout_ms = ValueSource::File;
    }
    if let Some(v) = file.command_buffer {
        settings.command_buffer = v;
    }
    if let Some(v) = file.event_buffer {
        settings.event_buffer = v;
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::Invalid(format!("{name}: cannot parse {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for name in [CONFIG_ENV, SEED_ENV, SMALL_BLIND_ENV, BIG_BLIND_ENV] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(TableSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_buffers_are_rejected() {
        let settings = TableSettings {
            command_buffer: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let settings = TableSettings {
            action_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    #[serial]
    fn defaults_without_environment() {
        clear_env();
        let resolved = load_with_sources().unwrap();
        assert_eq!(resolved.settings, TableSettings::default());
        assert_eq!(resolved.sources, SettingsSources::default());
    }

    #[test]
    #[serial]
    fn file_values_then_env_overrides() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "small_blind = 25\nbig_blind = 50\nmax_seats = 6\nseed = 7\n\
             min_raise_rule = \"any_increase\"\naction_timeout_ms = 1500"
        )
        .unwrap();
        std::env::set_var(CONFIG_ENV, file.path());
        std::env::set_var(BIG_BLIND_ENV, "60");

        let resolved = load_with_sources().unwrap();
        let s = &resolved.settings;
        assert_eq!(s.table.small_blind, 25);
        assert_eq!(s.table.big_blind, 60);
        assert_eq!(s.table.max_seats, 6);
        assert_eq!(s.table.seed, Some(7));
        assert_eq!(s.table.min_raise_rule, MinRaiseRule::AnyIncrease);
        assert_eq!(s.action_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(resolved.sources.small_blind, ValueSource::File);
        assert_eq!(resolved.sources.big_blind, ValueSource::Env);
        assert_eq!(resolved.sources.checkpoint_path, ValueSource::Default);
        clear_env();
    }

    #[test]
    #[serial]
    fn bad_env_value_is_reported() {
        clear_env();
        std::env::set_var(SEED_ENV, "not-a-number");
        let err = load_with_sources().unwrap_err();
        assert!(err.to_string().contains(SEED_ENV));
        clear_env();
    }

    #[test]
    #[serial]
    fn blinds_out_of_order_fail_validation() {
        clear_env();
        std::env::set_var(SMALL_BLIND_ENV, "40");
        std::env::set_var(BIG_BLIND_ENV, "20");
        assert!(matches!(load(), Err(SettingsError::Invalid(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn unknown_file_keys_are_rejected() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "blinds = 10").unwrap();
        std::env::set_var(CONFIG_ENV, file.path());
        assert!(matches!(load(), Err(SettingsError::Parse(_))));
        clear_env();
    }
}
