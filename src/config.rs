use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::workgroup::DEFAULT_CLOSED_GROUP_NAME;
use crate::error::{AppError, AppResult};

const CONFIG_DIR_NAME: &str = "ticketdesk";
const CONFIG_FILE_NAME: &str = "config.json";
const DATA_FILE_NAME: &str = "desk.json";
const DEFAULT_POLL_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Local,
    Firestore,
}

impl StoreBackend {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(StoreBackend::Local),
            "firestore" => Ok(StoreBackend::Firestore),
            other => Err(AppError::Configuration(format!(
                "unknown store backend '{other}' (expected local or firestore)"
            ))),
        }
    }
}

/// What happens when an actor claims a ticket someone else holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClaimPolicy {
    /// Refuse with a state conflict; the current owner keeps the ticket.
    #[default]
    Reject,
    /// Overwrite the owner and emit a warning.
    Warn,
    /// Overwrite the owner silently, as the desk historically behaved.
    Allow,
}

impl ClaimPolicy {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "reject" => Ok(ClaimPolicy::Reject),
            "warn" => Ok(ClaimPolicy::Warn),
            "allow" => Ok(ClaimPolicy::Allow),
            other => Err(AppError::Configuration(format!(
                "unknown claim policy '{other}' (expected reject, warn or allow)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub local_path: PathBuf,
    pub firestore_project: Option<String>,
    pub firestore_database: Option<String>,
    pub firestore_token: Option<String>,
    /// API root override, e.g. a local Firestore emulator.
    pub firestore_endpoint: Option<String>,
    pub poll_interval: Duration,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub closed_group_name: String,
    pub claim_policy: ClaimPolicy,
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        let stored = StoredConfig::load()?;
        Self::resolve(stored, |key| env::var(key).ok(), &config_directory()?)
    }

    /// Merges the stored file with `TICKETDESK_*` overrides looked up through `env`.
    pub fn resolve(
        stored: StoredConfig,
        env: impl Fn(&str) -> Option<String>,
        config_dir: &Path,
    ) -> AppResult<Self> {
        let pick = |key: &str, stored: Option<String>| {
            env(key)
                .or(stored)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let backend = match pick("TICKETDESK_BACKEND", stored.backend) {
            Some(raw) => StoreBackend::parse(&raw)?,
            None => StoreBackend::Local,
        };
        let claim_policy = match pick("TICKETDESK_CLAIM_POLICY", stored.claim_policy) {
            Some(raw) => ClaimPolicy::parse(&raw)?,
            None => ClaimPolicy::default(),
        };
        let poll_interval = match pick("TICKETDESK_POLL_SECONDS", stored.poll_seconds) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::Configuration(format!("poll interval '{raw}' is not a number"))
            })?,
            None => DEFAULT_POLL_SECONDS,
        };
        if poll_interval == 0 {
            return Err(AppError::Configuration(
                "poll interval must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            backend,
            local_path: pick("TICKETDESK_LOCAL_PATH", stored.local_path)
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.join(DATA_FILE_NAME)),
            firestore_project: pick("TICKETDESK_FIRESTORE_PROJECT", stored.firestore_project),
            firestore_database: pick("TICKETDESK_FIRESTORE_DATABASE", stored.firestore_database),
            firestore_token: pick("TICKETDESK_FIRESTORE_TOKEN", stored.firestore_token),
            firestore_endpoint: pick("TICKETDESK_FIRESTORE_ENDPOINT", stored.firestore_endpoint),
            poll_interval: Duration::from_secs(poll_interval),
            actor_id: pick("TICKETDESK_ACTOR_ID", stored.actor_id),
            actor_name: pick("TICKETDESK_ACTOR_NAME", stored.actor_name),
            closed_group_name: pick("TICKETDESK_CLOSED_GROUP", stored.closed_group_name)
                .unwrap_or_else(|| DEFAULT_CLOSED_GROUP_NAME.to_string()),
            claim_policy,
        })
    }
}

/// The on-disk configuration file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore_database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firestore_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_seconds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_policy: Option<String>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                AppError::Configuration(format!("invalid config file {}: {err}", path.display()))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| AppError::Configuration(format!("failed to write config: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

pub fn config_directory() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| {
            AppError::Configuration("unable to determine the user config directory".to_string())
        })
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}
