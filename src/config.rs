use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::language::Language;

/// Settings read from `repograph.toml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepographConfig {
    pub database: Option<String>,
    pub path: Option<String>,
    /// Gitignore-style patterns, on top of `.gitignore` and the built-in noise list
    pub excludes: Vec<String>,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub parse_workers: usize,
    pub servers: BTreeMap<Language, ServerConfig>,
}

/// How to launch one language server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ServerConfig {
    pub fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            enabled: true,
        }
    }
}

pub fn default_servers() -> BTreeMap<Language, ServerConfig> {
    BTreeMap::from([
        (Language::Python, ServerConfig::new(&["jedi-language-server"])),
        (
            Language::JavaScript,
            ServerConfig::new(&["typescript-language-server", "--stdio"]),
        ),
        (Language::Rust, ServerConfig::new(&["rust-analyzer"])),
        (Language::Go, ServerConfig::new(&["gopls"])),
    ])
}

impl Default for RepographConfig {
    fn default() -> Self {
        Self {
            database: None,
            path: None,
            excludes: Vec::new(),
            request_timeout_secs: 30,
            max_concurrent_requests: 8,
            parse_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            servers: default_servers(),
        }
    }
}

impl RepographConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Launch command for `language`, `None` when disabled or unconfigured
    pub fn server_command(&self, language: Language) -> Option<&[String]> {
        self.servers
            .get(&language)
            .filter(|s| s.enabled && !s.command.is_empty())
            .map(|s| s.command.as_slice())
    }

    /// Fill in servers the file did not mention
    fn with_default_servers(mut self) -> Self {
        for (language, server) in default_servers() {
            self.servers.entry(language).or_insert(server);
        }
        self
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("repograph.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".repograph").join("repograph.db")
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RepographConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(RepographConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RepographConfig = toml::from_str(&contents)?;
    Ok(config.with_default_servers())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
