//! Process settings.
//!
//! Loaded from an optional file, then from `AUTOFLOW__*` environment
//! variables (`AUTOFLOW__ENGINE__BASE_URL`, `AUTOFLOW__LIMITS__MAX_ACTIONS`,
//! ...), after an optional `.env` has been applied. Every field has a
//! default, so an empty environment yields a usable offline configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::catalog::COMPACT_LIMIT;
use crate::validate::Limits;

const ENV_PREFIX: &str = "AUTOFLOW";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub compile: CompileSettings,
    pub limits: Limits,
    pub catalog: CatalogSettings,
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub base_url: String,
    pub project_id: String,
    pub email: String,
    pub password: String,
    pub request_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            base_url: "http://localhost:8080".into(),
            project_id: String::new(),
            email: String::new(),
            password: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSettings")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl EngineSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompileSettings {
    pub auto_publish: bool,
    pub default_timezone: String,
    pub folder_id: Option<String>,
    /// 0 disables the deadline.
    pub timeout_secs: u64,
}

impl Default for CompileSettings {
    fn default() -> Self {
        CompileSettings {
            auto_publish: false,
            default_timezone: "Asia/Riyadh".into(),
            folder_id: None,
            timeout_secs: 120,
        }
    }
}

impl CompileSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub compact_limit: usize,
    pub refresh_interval_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            compact_limit: COMPACT_LIMIT,
            refresh_interval_secs: 6 * 60 * 60,
        }
    }
}

impl CatalogSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Settings {
    /// Apply `.env` (if present), then read file and environment.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_sources(file, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(
        file: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                env.prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn compile_options(&self) -> crate::lower::CompileOptions {
        crate::lower::CompileOptions {
            auto_publish: self.compile.auto_publish,
            default_timezone: self.compile.default_timezone.clone(),
            base_url: self.engine.base_url.clone(),
            folder_id: self.compile.folder_id.clone(),
            timeout: self.compile.timeout(),
        }
    }
}
