use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SeedConfig holds everything one `seed` run needs
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub netbox_url: String,
    pub netbox_token: Option<String>,
    pub wait: bool,
    pub retry_interval: Duration,
    pub http_timeout: Duration,
    pub catalog: CatalogConfig,
    pub net_map: Option<PathBuf>,
    pub paths: NetBoxPaths,
    pub preload_dir: PathBuf,
    pub library_dir: PathBuf,
    pub preload_prefixes: bool,
    pub preload_backup: Option<PathBuf>,
    pub postgres: PostgresConfig,
}

/// Names of the entities the reconciler ensures exist
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub sites: Vec<String>,
    pub manufacturers: Vec<String>,
    pub roles: Vec<String>,
    pub device_types: Vec<String>,
    pub staff_group: String,
    pub default_group: String,
}

impl CatalogConfig {
    /// First configured site, substituted into default fixtures
    pub fn default_site(&self) -> Option<&str> {
        self.sites.first().map(|s| s.as_str())
    }
}

/// Locations inside a NetBox installation
#[derive(Debug, Clone)]
pub struct NetBoxPaths {
    pub netbox_dir: PathBuf,
    pub superuser_script: PathBuf,
}

impl NetBoxPaths {
    pub fn new(netbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            netbox_dir: netbox_dir.into(),
            superuser_script: PathBuf::from(get_env(
                "NETBOX_SUPERUSER_SCRIPT",
                "/usr/local/bin/netbox_superuser_create.py",
            )),
        }
    }

    pub fn venv_python(&self) -> PathBuf {
        self.netbox_dir.join("venv").join("bin").join("python")
    }

    pub fn manage_script(&self) -> PathBuf {
        self.netbox_dir.join("netbox").join("manage.py")
    }

    pub fn manage_dir(&self) -> PathBuf {
        self.netbox_dir.join("netbox")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.netbox_dir.join("netbox").join("media")
    }

    /// Both the virtualenv interpreter and manage.py are present
    pub fn has_manage(&self) -> bool {
        self.venv_python().is_file() && self.manage_script().is_file()
    }
}

/// PostgreSQL connection used only by the snapshot restore
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub db: String,
    pub user: String,
    pub password: String,
}

impl SeedConfig {
    /// An explicit snapshot was asked for (even one that does not exist)
    pub fn snapshot_requested(&self) -> bool {
        self.preload_backup
            .as_deref()
            .map(|p| !p.as_os_str().is_empty())
            .unwrap_or(false)
    }

    pub fn net_map_path(&self) -> Option<&Path> {
        self.net_map.as_deref()
    }
}

pub fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Whole seconds from the environment, falling back on parse errors
pub fn get_env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(get_env(key, &default.to_string()).parse().unwrap_or(default))
}
