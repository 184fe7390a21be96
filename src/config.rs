use crate::error::{Error, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "APPLUS_CONFIG";
pub const CONFIG_FILE_NAME: &str = "applus-server.yaml";

/// SQL Server driver used when the config does not name one.
pub const DEFAULT_ODBC_DRIVER: &str = "SQL Server Native Client 11.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppServerSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub env: String,
    /// Tenant ("Mandant"); asked from the server when absent.
    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServerSettings {
    pub baseurl: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, rename = "userDomain")]
    pub user_domain: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbSettings {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub driver: Option<String>,
    /// `sqlite:` URL of a local staging database; takes precedence over ODBC.
    #[serde(default)]
    pub url: Option<String>,
}

impl DbSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "Driver={{{}}};Server={};Database={};UID={};PWD={};",
            self.driver.as_deref().unwrap_or(DEFAULT_ODBC_DRIVER),
            self.server,
            self.db,
            self.user,
            self.password.as_deref().unwrap_or("")
        )
    }

    pub fn sqlite_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| u.starts_with("sqlite:"))
    }

    /// Human readable target, never containing the password.
    pub fn describe(&self) -> String {
        match self.sqlite_url() {
            Some(url) => url.to_string(),
            None => format!("{}/{}", self.server, self.db),
        }
    }
}

/// Named overrides, selected with `--profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Log SOAP request bodies (credentials are masked).
    #[serde(default)]
    pub log_payloads: bool,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            log_payloads: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub appserver: AppServerSettings,
    #[serde(default)]
    pub webserver: Option<WebServerSettings>,
    #[serde(default)]
    pub dbserver: DbSettings,
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentProfile>,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .ok_or_else(|| Error::Config("failed to get XDG config directory".to_string()))?
                .join("applus-cli")
        } else {
            dirs::home_dir()
                .ok_or_else(|| Error::Config("failed to get home directory".to_string()))?
                .join(".applus-cli")
        };
        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Loads from `$APPLUS_CONFIG`, falling back to the default path.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => PathBuf::from(path),
            None => Self::default_path()?,
        };
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;
        let config = Self::from_yaml_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config file {:?}: {}", path, e)))?;

        info!(
            "Loaded config for app server {}:{} (env {})",
            config.appserver.server, config.appserver.port, config.appserver.env
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.appserver.server.trim().is_empty() {
            return Err(Error::Config("appserver.server must not be empty".to_string()));
        }
        if self.appserver.user.trim().is_empty() {
            return Err(Error::Config("appserver.user must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.appserver.user = user.into();
        self
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.appserver.env = env.into();
        self
    }

    /// Applies a named entry of `environments`.
    pub fn with_profile(mut self, name: &str) -> Result<Self> {
        let profile = self
            .environments
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("environment profile '{}' not found", name)))?;

        debug!("Applying environment profile: {}", name);
        if let Some(env) = profile.env {
            self.appserver.env = env;
        }
        if let Some(user) = profile.user {
            self.appserver.user = user;
        }
        if profile.tenant.is_some() {
            self.appserver.tenant = profile.tenant;
        }
        Ok(self)
    }

    pub fn app_server_base_url(&self) -> String {
        format!("http://{}:{}", self.appserver.server, self.appserver.port)
    }

    pub fn web_base_url(&self) -> Option<&str> {
        self.webserver.as_ref().map(|w| w.baseurl.as_str())
    }
}
