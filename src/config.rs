use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::Token;
use crate::forge::CLOUD_HOST;

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_DIR_ENV: &str = "GF_CONFIG_DIR";
const CONFIG_FILE: &str = "config.json";

/// Stored credentials and host selection.
///
/// Lives at `~/.gf/config.json` unless `GF_CONFIG_DIR` points elsewhere.
/// Hosts keep the order in which they were added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Host used when none is given on the command line
    #[serde(default)]
    pub active_host: String,

    #[serde(default)]
    pub hosts: IndexMap<String, HostConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// API access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Username the token belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Git protocol preferred for clone URLs
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            active_host: String::new(),
            hosts: IndexMap::new(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            protocol: default_protocol(),
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_protocol() -> String {
    "https".to_string()
}

/// Directory holding the config file.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".gf"))
}

pub fn default_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file is not an error and yields an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_path()?,
        };

        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to `path` with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            create_private_dir(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        write_private_file(path, contents.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Host to talk to: the explicit choice, else the active host, else the cloud host.
    pub fn resolve_host(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .or_else(|| Some(self.active_host.as_str()).filter(|h| !h.is_empty()))
            .unwrap_or(CLOUD_HOST)
            .to_string()
    }

    /// Token for `host`; a non-empty `env_token` (from `GF_TOKEN`) wins over the file.
    pub fn token_for(&self, host: &str, env_token: Option<&str>) -> Option<Token> {
        if let Some(token) = env_token.map(str::trim).filter(|t| !t.is_empty()) {
            return Some(Token::from(token));
        }
        self.hosts
            .get(host)
            .and_then(|h| h.token.as_deref())
            .filter(|t| !t.is_empty())
            .map(Token::from)
    }

    pub fn host(&self, host: &str) -> Option<&HostConfig> {
        self.hosts.get(host)
    }

    /// Stores a token for `host` and makes it the active host.
    pub fn login(&mut self, host: &str, token: &Token, user: Option<String>) {
        let entry = self.hosts.entry(host.to_string()).or_default();
        entry.token = Some(token.as_str().to_string());
        if user.is_some() {
            entry.user = user;
        }
        self.active_host = host.to_string();
    }

    /// Forgets `host`. Returns whether anything was stored for it.
    pub fn logout(&mut self, host: &str) -> bool {
        let removed = self.hosts.shift_remove(host).is_some();
        if self.active_host == host {
            self.active_host = self.hosts.keys().next().cloned().unwrap_or_default();
        }
        removed
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert!(config.hosts.is_empty());
        assert_eq!(config.resolve_host(None), "gitflic.ru");
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let json_content = r#"{
  "version": 1,
  "active_host": "git.example.com",
  "hosts": {
    "gitflic.ru": {"token": "cloud-token", "user": "alice", "protocol": "ssh"},
    "git.example.com": {"token": "onprem-token"}
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.resolve_host(None), "git.example.com");
        assert_eq!(config.host("gitflic.ru").unwrap().protocol, "ssh");
        assert_eq!(config.host("git.example.com").unwrap().protocol, "https");
        assert_eq!(
            config.token_for("git.example.com", None).unwrap().as_str(),
            "onprem-token"
        );
        let hosts: Vec<&str> = config.hosts.keys().map(String::as_str).collect();
        assert_eq!(hosts, vec!["gitflic.ru", "git.example.com"]);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("missing.json").as_path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{{not json").unwrap();
        assert!(Config::load(Some(temp_file.path())).is_err());
    }

    #[test]
    fn test_env_token_overrides_file() {
        let mut config = Config::default();
        config.login("gitflic.ru", &Token::from("file-token"), None);

        assert_eq!(
            config.token_for("gitflic.ru", Some("env-token")).unwrap().as_str(),
            "env-token"
        );
        assert_eq!(
            config.token_for("gitflic.ru", Some("  ")).unwrap().as_str(),
            "file-token"
        );
        assert!(config.token_for("other.host", None).is_none());
    }

    #[test]
    fn test_explicit_host_wins() {
        let mut config = Config::default();
        config.active_host = "a.example.com".into();
        assert_eq!(config.resolve_host(Some("b.example.com")), "b.example.com");
        assert_eq!(config.resolve_host(Some("")), "a.example.com");
    }

    #[test]
    fn test_save_round_trip_and_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.login("gitflic.ru", &Token::from("secret"), Some("alice".into()));
        config.save(&path).unwrap();

        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.active_host, "gitflic.ru");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
            assert_eq!(file_mode, 0o600);
            assert_eq!(dir_mode, 0o700);
        }
    }

    #[test]
    fn test_logout_moves_active_host() {
        let mut config = Config::default();
        config.login("a.example.com", &Token::from("a"), None);
        config.login("b.example.com", &Token::from("b"), None);
        assert_eq!(config.active_host, "b.example.com");

        assert!(config.logout("b.example.com"));
        assert_eq!(config.active_host, "a.example.com");
        assert!(!config.logout("b.example.com"));
    }
}
