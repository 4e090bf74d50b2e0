use crate::auth::AdmissionPolicy;
use crate::errors::{AppError, AppResult};
use crate::summary::SummaryClientConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "teamdaily.yaml";
pub const DATABASE_FILE_NAME: &str = "teamdaily.sqlite";
const KEYRING_SERVICE: &str = "teamdaily";
const KEYRING_API_KEY_ENTRY: &str = "gemini-api-key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_filter: String,
    pub admission: AdmissionPolicy,
    pub summary: SummaryClientConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_filter: "info".to_string(),
            admission: AdmissionPolicy::default(),
            summary: SummaryClientConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `teamdaily.yaml` from the data directory when present, then environment.
    pub fn load() -> AppResult<Self> {
        let data_dir = std::env::var("TEAMDAILY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        let mut config = Self::from_dir(&data_dir)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        if config.summary.api_key.is_none() {
            config.summary.api_key = api_key_from_keyring();
        }
        Ok(config)
    }

    pub fn from_dir(data_dir: &Path) -> AppResult<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = match fs::read_to_string(&path) {
            Ok(raw) => serde_yaml::from_str::<AppConfig>(&raw)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(error) => return Err(AppError::from(error)),
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("TEAMDAILY_ADMIN_SECRET") {
            self.admission.admin_secret = secret;
        }
        if let Some(code) = lookup("TEAMDAILY_INVITE_CODE") {
            self.admission.invite_code = code;
        }
        if let Some(filter) = lookup("TEAMDAILY_LOG") {
            self.log_filter = filter;
        }
        if let Some(model) = lookup("TEAMDAILY_SUMMARY_MODEL") {
            self.summary.model = model;
        }
        if let Some(base_url) = lookup("TEAMDAILY_SUMMARY_URL") {
            self.summary.base_url = base_url;
        }
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|key| !key.is_empty()) {
            self.summary.api_key = Some(key);
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("teamdaily"))
        .unwrap_or_else(|| PathBuf::from(".teamdaily"))
}

fn api_key_from_keyring() -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_API_KEY_ENTRY).ok()?;
    match entry.get_password() {
        Ok(key) if !key.is_empty() => Some(key),
        Ok(_) | Err(keyring::Error::NoEntry) => None,
        Err(error) => {
            tracing::warn!(error = %error, "failed to read summary API key from keyring");
            None
        }
    }
}
