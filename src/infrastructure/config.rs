use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding file settings, e.g.
/// `CHANGE_INTAKE__INTAKE__SYSTEM_ACTOR=ops`.
pub const ENV_PREFIX: &str = "CHANGE_INTAKE";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: DbConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Database driver: "sqlite" (default), "postgres", "mysql" or "mariadb".
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Full connection URL. Takes precedence over the individual fields.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    /// Database name, or the file path for SQLite.
    #[serde(default = "default_dbname")]
    pub dbname: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_driver() -> String {
    "sqlite".to_string()
}

fn default_dbname() -> String {
    "change_intake.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            url: None,
            host: String::new(),
            port: 0,
            dbname: default_dbname(),
            user: String::new(),
            password: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl DbConfig {
    /// Build a sqlx-compatible connection URL from this config.
    pub fn url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.to_string();
        }
        match self.driver.as_str() {
            "mysql" | "mariadb" => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
            "sqlite" => format!("sqlite://{}?mode=rwc", self.dbname),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IntakeConfig {
    /// Recorded as `requested_by` when no actor is resolvable.
    #[serde(default = "default_system_actor")]
    pub system_actor: String,
    /// Resource types subject to duplicate detection.
    #[serde(default = "default_dedup_types")]
    pub dedup_types: Vec<String>,
}

fn default_system_actor() -> String {
    "sysadmin".to_string()
}

fn default_dedup_types() -> Vec<String> {
    vec!["USER".into(), "ROLE".into(), "PORTAL_MENU".into()]
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            system_actor: default_system_actor(),
            dedup_types: default_dedup_types(),
        }
    }
}

impl AppConfig {
    /// Read a TOML file, then apply `CHANGE_INTAKE__*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("intake.dedup_types"),
            )
            .build()
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| "Failed to parse config")
    }

    /// `<config dir>/change-intake/config.toml`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("change-intake").join("config.toml"))
    }
}
