use std::time::Duration;

use serde::Deserialize;

use crate::{controller::range::TravelRange, error::ConfigError};

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_settle_ms() -> u64 {
    500
}

fn default_dispatch_ms() -> u64 {
    100
}

fn default_sync_target_on_read() -> bool {
    true
}

#[derive(Clone, Deserialize, Debug)]
pub struct DeskServerSettings {
    /// Base URL of the desk control server, e.g. `http://10.0.0.2:8080`
    pub base_path: String,
    pub username: String,
    pub password: String,

    /// Path to a PEM file with an additional CA certificate to trust
    pub ca_cert: Option<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Clone, Deserialize, Debug)]
pub struct TravelRangeSettings {
    pub base_height: u32,
    pub max_height: u32,
}

#[derive(Clone, Deserialize, Debug)]
pub struct ControllerSettings {
    /// How long target requests must stay quiet before a move is issued
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Delay between announcing motion and sending the height command
    #[serde(default = "default_dispatch_ms")]
    pub dispatch_ms: u64,

    /// Treat the desk as source of truth on reads: a read also moves the
    /// target position to wherever the desk currently is.
    #[serde(default = "default_sync_target_on_read")]
    pub sync_target_on_read: bool,

    pub poll_interval_seconds: Option<u64>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            settle_ms: default_settle_ms(),
            dispatch_ms: default_dispatch_ms(),
            sync_target_on_read: default_sync_target_on_read(),
            poll_interval_seconds: None,
        }
    }
}

#[derive(Clone, Deserialize, Debug, Default)]
pub struct DiscoverySettings {
    #[serde(default)]
    pub include_individual_desks: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub struct MqttSettings {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cover_topic: String,
    pub cover_topic_set: String,
    pub cover_topic_get: String,
    pub height_topic: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub desk_server: DeskServerSettings,
    pub travel_range: TravelRangeSettings,
    #[serde(default)]
    pub controller: ControllerSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    pub mqtt: MqttSettings,
}

impl Settings {
    /// Checks everything that would otherwise fail later at call time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.desk_server.base_path.trim().is_empty() {
            return Err(ConfigError::MissingServerPath);
        }

        self.travel_range()?;

        if self.controller.settle_ms == 0 {
            return Err(ConfigError::InvalidValue("controller.settle_ms must be > 0"));
        }

        if self.controller.poll_interval_seconds == Some(0) {
            return Err(ConfigError::InvalidValue(
                "controller.poll_interval_seconds must be > 0",
            ));
        }

        if self.desk_server.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "desk_server.request_timeout_ms must be > 0",
            ));
        }

        for (key, template, placeholder) in [
            ("mqtt.cover_topic", &self.mqtt.cover_topic, "{id}"),
            ("mqtt.cover_topic_set", &self.mqtt.cover_topic_set, "{id}"),
            ("mqtt.cover_topic_get", &self.mqtt.cover_topic_get, "{id}"),
            ("mqtt.height_topic", &self.mqtt.height_topic, "{name}"),
        ] {
            if template.matches(placeholder).count() != 1 {
                return Err(ConfigError::InvalidTopic {
                    key,
                    placeholder,
                    template: template.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn travel_range(&self) -> Result<TravelRange, ConfigError> {
        TravelRange::new(self.travel_range.base_height, self.travel_range.max_height)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.desk_server.request_timeout_ms)
    }
}

pub fn read_settings() -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name("Settings"))
        .add_source(config::Environment::with_prefix("DESK").separator("__"))
        .build()?
        .try_deserialize::<Settings>()
}

#[cfg(test)]
pub(crate) fn settings_from_toml(toml: &str) -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Settings>()
}
