use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rtpc_types::{CurveType, ParamId, ValueKind};
use serde::Deserialize;

use crate::error::{RtpcError, RtpcResult};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    transitions: TransitionsConfig,
    #[serde(default)]
    telemetry: TelemetryConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    #[serde(default)]
    params: Vec<ParamEntry>,
}

#[derive(Deserialize)]
struct ParamEntry {
    id: u32,
    value: f32,
    #[serde(default)]
    kind: ValueKind,
}

#[derive(Deserialize, Default)]
struct TransitionsConfig {
    curve: Option<String>,
    min_duration_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct TelemetryConfig {
    enabled: Option<bool>,
}

/// Fallback for one parameter when no stored value matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDefault {
    pub value: f32,
    pub kind: ValueKind,
}

/// Process-wide default value table, consulted when a best-match lookup misses.
#[derive(Debug, Clone, Default)]
pub struct DefaultValues {
    entries: HashMap<ParamId, ParamDefault>,
}

impl DefaultValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, param: ParamId, value: f32, kind: ValueKind) {
        self.entries.insert(param, ParamDefault { value, kind });
    }

    pub fn get(&self, param: ParamId) -> Option<ParamDefault> {
        self.entries.get(&param).copied()
    }

    /// Default value, 0.0 for parameters not in the table.
    pub fn value(&self, param: ParamId) -> f32 {
        self.get(param).map(|d| d.value).unwrap_or(0.0)
    }

    pub fn kind(&self, param: ParamId) -> ValueKind {
        self.get(param).map(|d| d.kind).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Engine configuration: default values, ramp settings and telemetry.
#[derive(Debug, Clone)]
pub struct Config {
    defaults: DefaultValues,
    transition_curve: CurveType,
    min_ramp_duration: Duration,
    telemetry: bool,
}

impl Default for Config {
    /// Built-in configuration only, no user file.
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "rtpc::config", "embedded config.toml rejected: {}", e);
            Self::empty()
        })
    }
}

impl Config {
    /// Built-in configuration merged with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_with_user_file(user_config_path().as_deref())
    }

    /// Built-in configuration merged with `path`. Unreadable or malformed
    /// files are logged and ignored.
    pub fn load_with_user_file(path: Option<&Path>) -> Self {
        let mut base = match toml::from_str::<ConfigFile>(DEFAULT_CONFIG) {
            Ok(base) => base,
            Err(e) => {
                log::error!(target: "rtpc::config", "embedded config.toml rejected: {}", e);
                ConfigFile::default()
            }
        };

        if let Some(path) = path.filter(|p| p.exists()) {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                    Ok(user) => {
                        merge_defaults(&mut base.defaults, user.defaults);
                        merge_transitions(&mut base.transitions, user.transitions);
                        merge_telemetry(&mut base.telemetry, user.telemetry);
                    }
                    Err(e) => {
                        log::warn!(target: "rtpc::config", "ignoring malformed config {}: {}", path.display(), e)
                    }
                },
                Err(e) => {
                    log::warn!(target: "rtpc::config", "could not read config {}: {}", path.display(), e)
                }
            }
        }

        match Self::build(base) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(target: "rtpc::config", "{}, using built-in config", e);
                Self::default()
            }
        }
    }

    /// Parse a complete configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> RtpcResult<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| RtpcError::Config(e.to_string()))?;
        Self::build(file)
    }

    fn empty() -> Self {
        Self {
            defaults: DefaultValues::new(),
            transition_curve: CurveType::Linear,
            min_ramp_duration: Duration::ZERO,
            telemetry: false,
        }
    }

    fn build(file: ConfigFile) -> RtpcResult<Self> {
        let mut defaults = DefaultValues::new();
        for entry in file.defaults.params {
            defaults.set(ParamId::new(entry.id), entry.value, entry.kind);
        }

        let transition_curve = match file.transitions.curve.as_deref() {
            None => CurveType::Linear,
            Some(name) => CurveType::parse(name)
                .ok_or_else(|| RtpcError::Config(format!("unknown transition curve '{}'", name)))?,
        };

        Ok(Self {
            defaults,
            transition_curve,
            min_ramp_duration: Duration::from_millis(file.transitions.min_duration_ms.unwrap_or(0)),
            telemetry: file.telemetry.enabled.unwrap_or(false),
        })
    }

    pub fn defaults(&self) -> &DefaultValues {
        &self.defaults
    }

    /// Curve used when a caller asks for a ramp without naming one.
    pub fn default_transition_curve(&self) -> CurveType {
        self.transition_curve
    }

    /// Ramps shorter than this snap.
    pub fn min_ramp_duration(&self) -> Duration {
        self.min_ramp_duration
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rtpc").join("config.toml"))
}

fn merge_defaults(base: &mut DefaultsConfig, user: DefaultsConfig) {
    for entry in user.params {
        match base.params.iter_mut().find(|p| p.id == entry.id) {
            Some(existing) => *existing = entry,
            None => base.params.push(entry),
        }
    }
}

fn merge_transitions(base: &mut TransitionsConfig, user: TransitionsConfig) {
    if user.curve.is_some() {
        base.curve = user.curve;
    }
    if user.min_duration_ms.is_some() {
        base.min_duration_ms = user.min_duration_ms;
    }
}

fn merge_telemetry(base: &mut TelemetryConfig, user: TelemetryConfig) {
    if user.enabled.is_some() {
        base.enabled = user.enabled;
    }
}
