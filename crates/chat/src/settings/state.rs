use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashchat_transport::{
    DEFAULT_CHAT_PATH, DEFAULT_ENDPOINT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MESSAGE_PARAM,
    DEFAULT_STREAM_PATH, TransportConfig,
};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::Theme;

pub const SETTINGS_DIRECTORY_NAME: &str = "dashchat";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "DASHCHAT_";

/// Client configuration: where the assistant lives and how the host starts up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_message_param")]
    pub message_param: String,
    /// Seconds without any event before a stream is failed; `0` disables.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default, deserialize_with = "deserialize_theme")]
    pub theme: Theme,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            stream_path: default_stream_path(),
            chat_path: default_chat_path(),
            message_param: default_message_param(),
            idle_timeout_secs: default_idle_timeout_secs(),
            theme: Theme::default(),
        }
    }
}

impl ClientSettings {
    pub fn normalized(mut self) -> Self {
        self.endpoint = non_blank_or(&self.endpoint, default_endpoint)
            .trim_end_matches('/')
            .to_string();
        self.stream_path = normalized_path(&self.stream_path, default_stream_path);
        self.chat_path = normalized_path(&self.chat_path, default_chat_path);
        self.message_param = non_blank_or(&self.message_param, default_message_param);
        self
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn to_transport_config(&self) -> TransportConfig {
        TransportConfig::new(&self.endpoint)
            .with_stream_path(&self.stream_path)
            .with_chat_path(&self.chat_path)
            .with_message_param(&self.message_param)
            .with_idle_timeout(self.idle_timeout())
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".dashchat"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ClientSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path) -> ClientSettings {
        let mut figment = Figment::from(Serialized::defaults(ClientSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!(path = ?path, "settings file not found, using defaults");
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        match figment.extract::<ClientSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to parse settings, using defaults");
                ClientSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ClientSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank_or(value: &str, default: fn() -> String) -> String {
    let value = value.trim();
    if value.is_empty() {
        default()
    } else {
        value.to_string()
    }
}

fn normalized_path(value: &str, default: fn() -> String) -> String {
    let value = non_blank_or(value, default);
    if value.starts_with('/') {
        value
    } else {
        format!("/{value}")
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}

fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}

fn default_message_param() -> String {
    DEFAULT_MESSAGE_PARAM.to_string()
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

fn deserialize_theme<'de, D>(deserializer: D) -> Result<Theme, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(Theme::parse(&value).unwrap_or_default())
}
