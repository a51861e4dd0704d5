use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::transport::errors::TransportError;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub login: String,
    #[serde(default)]
    pub passcode: Option<String>,
    #[serde(default)]
    pub virtual_host: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_typing_idle_ms")]
    pub typing_idle_ms: u64,
    #[serde(default = "default_toast_ms")]
    pub toast_ms: u64,
    #[serde(default = "default_typing_notice_ms")]
    pub typing_notice_ms: u64,
}

pub const DEFAULT_PORT: u16 = 61613;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_TYPING_IDLE_MS: u64 = 1_000;
pub const DEFAULT_TOAST_MS: u64 = 5_000;
pub const DEFAULT_TYPING_NOTICE_MS: u64 = 3_000;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_base_url() -> String {
    String::from("http://localhost:8080")
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_typing_idle_ms() -> u64 {
    DEFAULT_TYPING_IDLE_MS
}

fn default_toast_ms() -> u64 {
    DEFAULT_TOAST_MS
}

fn default_typing_notice_ms() -> u64 {
    DEFAULT_TYPING_NOTICE_MS
}

impl MessagingConfig {
    pub fn new(host: String, port: u16, login: String) -> Self {
        Self {
            host,
            port,
            login,
            passcode: None,
            virtual_host: None,
            tls: false,
            api_base_url: default_api_base_url(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            typing_idle_ms: DEFAULT_TYPING_IDLE_MS,
            toast_ms: DEFAULT_TOAST_MS,
            typing_notice_ms: DEFAULT_TYPING_NOTICE_MS,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, TransportError> {
        serde_json::from_str(raw).map_err(|err| TransportError::InvalidConfig(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, TransportError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// STOMP `host` header; falls back to the network host.
    pub fn virtual_host(&self) -> &str {
        self.virtual_host.as_deref().unwrap_or(&self.host)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }

    pub fn toast_lifetime(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn typing_notice_lifetime(&self) -> Duration {
        Duration::from_millis(self.typing_notice_ms)
    }
}
