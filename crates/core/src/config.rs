//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed by reference into the
//! services that need it. Nothing in this crate reads the API key from the process
//! environment after [`CoreConfig::from_env`] returns.

use crate::constants::{
    API_KEY_ENV, DATA_DIR_ENV, DEFAULT_DATA_DIR_NAME, DEFAULT_GENAI_BASE_URL, DEFAULT_MODEL,
    DEFAULT_POSTAL_BASE_URL, DEFAULT_WAIT_SECS, DEFAULT_WEBDRIVER_URL, ENV_FILENAME, MODEL_ENV,
    POSTAL_URL_ENV, WAIT_SECS_ENV, WEBDRIVER_URL_ENV,
};
use crate::{CoreError, CoreResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone)]
pub struct CoreConfig {
    data_dir: PathBuf,
    api_key: Option<String>,
    model: String,
    genai_base_url: String,
    webdriver_url: String,
    wait_timeout: Duration,
    postal_base_url: String,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("genai_base_url", &self.genai_base_url)
            .field("webdriver_url", &self.webdriver_url)
            .field("wait_timeout", &self.wait_timeout)
            .field("postal_base_url", &self.postal_base_url)
            .finish()
    }
}

impl CoreConfig {
    /// Configuration with defaults for everything except the data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            api_key: None,
            model: DEFAULT_MODEL.into(),
            genai_base_url: DEFAULT_GENAI_BASE_URL.into(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.into(),
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_SECS),
            postal_base_url: DEFAULT_POSTAL_BASE_URL.into(),
        }
    }

    /// Resolves configuration from the process environment.
    ///
    /// `<data_dir>/.env` is loaded first and `./.env` second; neither overrides
    /// variables already set in the environment.
    pub fn from_env() -> CoreResult<Self> {
        let data_dir = match non_empty_env(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        load_env_file(&data_dir.join(ENV_FILENAME));
        load_env_file(Path::new(ENV_FILENAME));

        let mut config = Self::new(data_dir);
        config.api_key = non_empty_env(API_KEY_ENV);
        if let Some(model) = non_empty_env(MODEL_ENV) {
            config.model = model;
        }
        if let Some(url) = non_empty_env(WEBDRIVER_URL_ENV) {
            config.webdriver_url = url;
        }
        if let Some(url) = non_empty_env(POSTAL_URL_ENV) {
            config.postal_base_url = url;
        }
        config.wait_timeout = wait_timeout_from_env_value(non_empty_env(WAIT_SECS_ENV))?;

        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then(|| key.trim().to_owned());
        self
    }

    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = url.into();
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The API key, or `CoreError::MissingApiKey` when none was configured.
    pub fn api_key(&self) -> CoreResult<&str> {
        self.api_key.as_deref().ok_or(CoreError::MissingApiKey)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn genai_base_url(&self) -> &str {
        &self.genai_base_url
    }

    pub fn webdriver_url(&self) -> &str {
        &self.webdriver_url
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn postal_base_url(&self) -> &str {
        &self.postal_base_url
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn load_env_file(path: &Path) {
    if !path.is_file() {
        return;
    }
    if let Err(e) = dotenvy::from_path(path) {
        tracing::warn!("ignoring unreadable env file {}: {}", path.display(), e);
    }
}

fn default_data_dir() -> CoreResult<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .ok_or_else(|| {
            CoreError::Config(format!(
                "cannot locate home directory; set {DATA_DIR_ENV}"
            ))
        })?;
    Ok(PathBuf::from(home).join(DEFAULT_DATA_DIR_NAME))
}

/// Parses the explicit-wait ceiling in whole seconds.
///
/// `None` yields the default; zero or a non-number is rejected.
pub fn wait_timeout_from_env_value(value: Option<String>) -> CoreResult<Duration> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(DEFAULT_WAIT_SECS));
    };

    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(CoreError::Config(format!(
            "{WAIT_SECS_ENV} must be a positive number of seconds, got {value:?}"
        ))),
    }
}

/// Stores `api_key` as `GOOGLE_API_KEY` in `<data_dir>/.env`, keeping other entries.
///
/// Returns the path of the env file written.
pub fn write_api_key(data_dir: &Path, api_key: &str) -> CoreResult<PathBuf> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(CoreError::InvalidInput("API key cannot be empty".into()));
    }

    fs::create_dir_all(data_dir)?;
    let env_path = data_dir.join(ENV_FILENAME);

    let mut entries = Vec::new();
    if env_path.is_file() {
        for item in dotenvy::from_path_iter(&env_path)? {
            let (key, value) = item?;
            if key != API_KEY_ENV {
                entries.push((key, value));
            }
        }
    }
    entries.push((API_KEY_ENV.to_owned(), api_key.to_owned()));

    let contents: String = entries
        .iter()
        .map(|(key, value)| format!("{key}=\"{}\"\n", value.replace('"', "\\\"")))
        .collect();
    fs::write(&env_path, contents)?;

    tracing::info!("API key stored in {}", env_path.display());
    Ok(env_path)
}
