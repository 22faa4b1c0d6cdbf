//! Configuration (spec §6 "Recognised options"): a YAML file read at
//! startup, with `clap`-derived CLI flags/env vars able to override any
//! field, grounded on the teacher's `crates/mux/src/config.rs`
//! (`clap::Args` + `env = "..."`) layered over a `serde_yaml` file the way
//! `cheferd::ConfigFileParser` reads its `YAML::Node` options file.

use std::path::{Path, PathBuf};

use ratectl_core::ControlType;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerRole {
    Core,
    Local,
}

/// In a YAML config file, write the quoted form (`control_type: "1"`) — an
/// unquoted integer deserializes against the variant's ordinal, not its
/// `rename`, which would not match the `1|2|3` numbering below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
pub enum ControlTypeArg {
    #[value(name = "1")]
    #[serde(rename = "1")]
    Static,
    #[value(name = "2")]
    #[serde(rename = "2")]
    DynamicVanilla,
    #[value(name = "3")]
    #[serde(rename = "3")]
    DynamicLeftover,
}

impl From<ControlTypeArg> for ControlType {
    fn from(value: ControlTypeArg) -> Self {
        match value {
            ControlTypeArg::Static => ControlType::Static,
            ControlTypeArg::DynamicVanilla => ControlType::DynamicVanilla,
            ControlTypeArg::DynamicLeftover => ControlType::DynamicLeftover,
        }
    }
}

/// Every option in spec §6's table, as `clap` flags/env vars. Each is
/// `Option` here so a YAML config file value is only overridden when the
/// flag/env var is actually present; `RuntimeConfig::resolve` applies the
/// defaults.
#[derive(Debug, Clone, clap::Parser, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Path to the YAML configuration file (spec §6 "a single file
    /// recognised at startup").
    #[arg(long, env = "RATECTL_CONFIG")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    #[arg(long, value_enum, env = "RATECTL_CONTROLLER")]
    pub controller: Option<ControllerRole>,

    #[arg(long, env = "RATECTL_CORE_ADDRESS")]
    pub core_address: Option<String>,

    #[arg(long, env = "RATECTL_LOCAL_ADDRESS")]
    pub local_address: Option<String>,

    #[arg(long, value_enum, env = "RATECTL_CONTROL_TYPE")]
    pub control_type: Option<ControlTypeArg>,

    #[arg(long, env = "RATECTL_SYSTEM_LIMIT")]
    pub system_limit: Option<i64>,

    #[arg(long, env = "RATECTL_HOUSEKEEPING_RULES_FILE")]
    pub housekeeping_rules_file: Option<PathBuf>,

    #[arg(long, env = "RATECTL_POLICIES_RULES_FILE")]
    pub policies_rules_file: Option<PathBuf>,

    #[arg(long, env = "RATECTL_CYCLE_SLEEP_TIME")]
    pub cycle_sleep_time: Option<u64>,

    /// `text` or `json`; anything else falls back to text.
    #[arg(long, default_value = "text", env = "RATECTL_LOG_FORMAT")]
    #[serde(skip)]
    pub log_format: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("missing required option: {0}")]
    Missing(&'static str),
}

/// The fully-resolved configuration the binary actually runs with.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub controller: ControllerRole,
    pub core_address: String,
    pub local_address: Option<String>,
    pub control_type: ControlType,
    pub system_limit: i64,
    pub housekeeping_rules_file: Option<PathBuf>,
    pub policies_rules_file: Option<PathBuf>,
    pub cycle_sleep_time: std::time::Duration,
    pub log_format: String,
}

impl CliConfig {
    /// Loads the YAML file at `config_file` (if set), then overlays any
    /// CLI/env-provided field on top of it. CLI always wins, matching the
    /// teacher's "flags override file" convention.
    pub fn resolve(self) -> Result<RuntimeConfig, ConfigError> {
        let file_defaults = match &self.config_file {
            Some(path) => Self::load_file(path)?,
            None => CliConfig::default(),
        };

        let controller = self
            .controller
            .or(file_defaults.controller)
            .ok_or(ConfigError::Missing("controller"))?;
        let core_address = self
            .core_address
            .or(file_defaults.core_address)
            .ok_or(ConfigError::Missing("core_address"))?;
        let control_type = self
            .control_type
            .or(file_defaults.control_type)
            .unwrap_or(ControlTypeArg::Static);

        Ok(RuntimeConfig {
            controller,
            core_address,
            local_address: self.local_address.or(file_defaults.local_address),
            control_type: control_type.into(),
            system_limit: self.system_limit.or(file_defaults.system_limit).unwrap_or(0),
            housekeeping_rules_file: self
                .housekeeping_rules_file
                .or(file_defaults.housekeeping_rules_file),
            policies_rules_file: self
                .policies_rules_file
                .or(file_defaults.policies_rules_file),
            cycle_sleep_time: std::time::Duration::from_micros(
                self.cycle_sleep_time
                    .or(file_defaults.cycle_sleep_time)
                    .unwrap_or(ratectl_core::DEFAULT_CYCLE_SLEEP_MICROS),
            ),
            log_format: self.log_format,
        })
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratectl.yaml");
        std::fs::write(
            &path,
            "controller: core\ncore_address: \"0.0.0.0:9000\"\nsystem_limit: 500\n",
        )
        .unwrap();

        let cli = CliConfig {
            config_file: Some(path),
            system_limit: Some(900),
            ..Default::default()
        };
        let resolved = cli.resolve().unwrap();
        assert_eq!(resolved.controller, ControllerRole::Core);
        assert_eq!(resolved.core_address, "0.0.0.0:9000");
        assert_eq!(resolved.system_limit, 900);
    }

    #[test]
    fn missing_required_option_is_an_error() {
        let cli = CliConfig::default();
        assert!(matches!(cli.resolve(), Err(ConfigError::Missing("controller"))));
    }
}
