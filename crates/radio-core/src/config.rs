use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;
use super::protocol::ButtonAction;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Delay between two iterations of the poll loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stations_file")]
    pub stations_file: PathBuf,
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
    #[serde(default = "default_wifi_file")]
    pub wifi_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the configuration page's html/css/js/ttf files.
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "default_buttons", rename = "button")]
    pub buttons: Vec<ButtonBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBinding {
    pub pin: u32,
    pub short: ButtonAction,
    pub long: ButtonAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit mpv path.  Searched beside the executable and on PATH if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpv_binary: Option<PathBuf>,
    /// How long to wait for a freshly spawned player to accept commands.
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stations_file: default_stations_file(),
            status_file: default_status_file(),
            wifi_file: default_wifi_file(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
            web_root: default_web_root(),
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            buttons: default_buttons(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mpv_binary: None,
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5
}

fn default_stations_file() -> PathBuf {
    platform::data_dir().join("stations")
}

fn default_status_file() -> PathBuf {
    platform::data_dir().join("status")
}

fn default_wifi_file() -> PathBuf {
    platform::data_dir().join("wifisetup")
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_web_root() -> PathBuf {
    platform::data_dir().join("www")
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_buttons() -> Vec<ButtonBinding> {
    vec![
        ButtonBinding {
            pin: 17,
            short: ButtonAction::Previous,
            long: ButtonAction::VolumeDown,
        },
        ButtonBinding {
            pin: 27,
            short: ButtonAction::Next,
            long: ButtonAction::VolumeUp,
        },
        ButtonBinding {
            pin: 22,
            short: ButtonAction::Toggle,
            long: ButtonAction::Stop,
        },
    ]
}

fn default_open_timeout_ms() -> u64 {
    5000
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
