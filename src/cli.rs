use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{get_env_secs, CatalogConfig, NetBoxPaths, PostgresConfig, SeedConfig};
use crate::recipe::{PiVersion, Suite, MASTER_RECIPE};

/// NetBox bootstrap tooling
#[derive(Debug, Parser)]
#[command(name = "netbox-init")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, ...)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Populate NetBox with groups, permissions, catalog entries and the network map
    Seed(SeedArgs),

    /// Render a Raspberry Pi sensor build recipe
    Recipe(RecipeArgs),
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Wait for a good connection first
    #[arg(long, overrides_with = "no_wait")]
    pub wait: bool,

    /// Do not wait for connection (error if connection fails)
    #[arg(long = "no-wait", overrides_with = "wait")]
    pub no_wait: bool,

    /// NetBox base URL
    #[arg(short = 'u', long = "url", env = "NETBOX_URL", default_value = "http://localhost:8080/netbox")]
    pub url: String,

    /// NetBox API token
    #[arg(short = 't', long = "token", env = "NETBOX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Site(s) to create
    #[arg(short = 's', long = "site", num_args = 0.., env = "NETBOX_DEFAULT_SITE", default_value = "default")]
    pub sites: Vec<String>,

    /// JSON file with the network segment/host mapping
    #[arg(long = "net-map")]
    pub net_map: Option<PathBuf>,

    /// Group for automatically created users
    #[arg(long = "default-group", env = "REMOTE_AUTH_DEFAULT_GROUPS", default_value = "standard")]
    pub default_group: String,

    /// Group for automatically created staff users
    #[arg(long = "staff-group", env = "REMOTE_AUTH_STAFF_GROUPS", default_value = "administrator")]
    pub staff_group: String,

    /// Manufacturer(s) to create
    #[arg(
        short = 'm',
        long = "manufacturer",
        num_args = 0..,
        env = "NETBOX_DEFAULT_MANUFACTURER",
        default_value = "Unspecified"
    )]
    pub manufacturers: Vec<String>,

    /// Role(s) to create
    #[arg(short = 'r', long = "role", num_args = 0.., env = "NETBOX_DEFAULT_ROLE", default_value = "Unspecified")]
    pub roles: Vec<String>,

    /// Device type(s) to create
    #[arg(
        short = 'y',
        long = "device-type",
        num_args = 0..,
        env = "NETBOX_DEFAULT_DEVICE_TYPE",
        default_value = "Unspecified"
    )]
    pub device_types: Vec<String>,

    /// NetBox installation directory
    #[arg(short = 'n', long = "netbox", env = "NETBOX_PATH", default_value = "/opt/netbox")]
    pub netbox_dir: PathBuf,

    /// Device-Type-Library-Import checkout
    #[arg(
        short = 'l',
        long = "library",
        env = "NETBOX_DEVICETYPE_LIBRARY_IMPORT_PATH",
        default_value = "/opt/netbox-devicetype-library-import"
    )]
    pub library_dir: PathBuf,

    /// Directory of netbox-initializers fixtures (and database dumps)
    #[arg(short = 'p', long = "preload", env = "NETBOX_PRELOAD_PATH", default_value = "/opt/netbox-preload")]
    pub preload_dir: PathBuf,

    /// Preload IPAM prefixes for private IP space
    #[arg(
        long = "preload-prefixes",
        env = "NETBOX_PRELOAD_PREFIXES",
        value_name = "true|false",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_bool
    )]
    pub preload_prefixes: bool,

    /// Database dump (.gz) to restore instead of seeding; empty means none
    #[arg(long = "preload-backup", env = "NETBOX_PRELOAD_GZ", value_name = "PATH")]
    pub preload_backup: Option<String>,

    /// PostgreSQL host for restoring a dump
    #[arg(long = "postgres-host", env = "DB_HOST", default_value = "netbox-postgres")]
    pub postgres_host: String,

    /// PostgreSQL database name
    #[arg(long = "postgres-db", env = "DB_NAME", default_value = "netbox")]
    pub postgres_db: String,

    /// PostgreSQL user name
    #[arg(long = "postgres-user", env = "DB_USER", default_value = "netbox")]
    pub postgres_user: String,

    /// PostgreSQL password
    #[arg(long = "postgres-password", env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub postgres_password: String,
}

impl SeedArgs {
    pub fn into_config(self) -> SeedConfig {
        SeedConfig {
            netbox_url: self.url,
            netbox_token: self.token.filter(|t| !t.is_empty()),
            wait: !self.no_wait,
            retry_interval: get_env_secs("NETBOX_WAIT_INTERVAL_SECS", 5),
            http_timeout: get_env_secs("NETBOX_HTTP_TIMEOUT_SECS", 30),
            catalog: CatalogConfig {
                sites: self.sites,
                manufacturers: self.manufacturers,
                roles: self.roles,
                device_types: self.device_types,
                staff_group: self.staff_group,
                default_group: self.default_group,
            },
            net_map: self.net_map,
            paths: NetBoxPaths::new(self.netbox_dir),
            preload_dir: self.preload_dir,
            library_dir: self.library_dir,
            preload_prefixes: self.preload_prefixes,
            preload_backup: self.preload_backup.filter(|p| !p.is_empty()).map(PathBuf::from),
            postgres: PostgresConfig {
                host: self.postgres_host,
                db: self.postgres_db,
                user: self.postgres_user,
                password: self.postgres_password,
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct RecipeArgs {
    /// Raspberry Pi model (1-4)
    pub version: PiVersion,

    /// Debian suite (bullseye, bookworm, trixie)
    pub suite: Suite,

    /// Master recipe to render
    #[arg(long, default_value = MASTER_RECIPE)]
    pub template: PathBuf,

    /// Where the rendered recipe is written
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Malcolm source tree the image copies sensor files from
    #[arg(long = "malcolm-dir", default_value = "..")]
    pub malcolm_dir: PathBuf,
}

/// yes/true/t/y/1 or no/false/f/n/0, case-insensitive
fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        other => Err(format!("boolean value expected, got {:?}", other)),
    }
}

/// `RUST_LOG` wins; otherwise the `-v` count picks the level for this crate
pub fn log_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,netbox_init={}", level)
}
