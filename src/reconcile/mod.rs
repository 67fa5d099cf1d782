//! Idempotent create-if-missing seeding of a NetBox store.
//!
//! Each stage reads the current collection, creates only what is missing,
//! then re-reads it so later stages see fresh identifiers. Stages run in a
//! fixed order because later ones reference what earlier ones created:
//! groups, permissions, manufacturers, roles, device types, sites, the
//! network map, and finally the legacy prefix-description migration.
//!
//! A rejected create is logged and skipped; any other failure aborts only
//! the stage it happened in.

pub mod catalog;
pub mod filler;
pub mod migrate;
pub mod network;
pub mod palette;

#[cfg(test)]
pub(crate) mod memory;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::netbox::{NetBoxStore, StoreError, StoreResult};
use crate::netmap;

pub use palette::RolePalette;

/// Identity key (name, model, CIDR, address) to store identifier
pub type Index = BTreeMap<String, i32>;

/// Per-kind indices produced by the catalog stages
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub groups: Index,
    pub permissions: Index,
    pub manufacturers: Index,
    pub roles: Index,
    pub device_types: Index,
    pub sites: Index,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub stage: &'static str,
    pub created: u32,
    pub updated: u32,
    pub rejected: Vec<String>,
    pub skipped: u32,
    pub aborted: Option<String>,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    pub(crate) fn reject(&mut self, what: &str, err: &StoreError) {
        tracing::warn!("{} processing {} {:?}: {}", err.kind(), self.stage, what, err);
        self.rejected.push(format!("{}: {}", what, err));
    }

    pub(crate) fn skip(&mut self) {
        self.skipped += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub stages: Vec<StageReport>,
    pub inventory: Inventory,
}

impl ReconcileReport {
    /// Close out a stage. A failed stage is logged and yields an empty result.
    fn record<T: Default>(&mut self, mut stage: StageReport, result: anyhow::Result<T>) -> T {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("{} processing {}: {:#}", error_kind(&e), stage.stage, e);
                stage.aborted = Some(format!("{:#}", e));
                T::default()
            }
        };
        tracing::debug!(
            "{}: {} created, {} updated, {} rejected, {} skipped",
            stage.stage,
            stage.created,
            stage.updated,
            stage.rejected.len(),
            stage.skipped
        );
        self.stages.push(stage);
        value
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn total_created(&self) -> u32 {
        self.stages.iter().map(|s| s.created).sum()
    }

    pub fn aborted_stages(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .filter(|s| s.aborted.is_some())
            .map(|s| s.stage)
            .collect()
    }
}

/// Classify an error caught at a stage boundary for the log line
pub fn error_kind(e: &anyhow::Error) -> &'static str {
    if let Some(store) = e.downcast_ref::<StoreError>() {
        store.kind()
    } else if e.downcast_ref::<serde_json::Error>().is_some() || e.downcast_ref::<std::io::Error>().is_some() {
        "MalformedInput"
    } else {
        "Unexpected"
    }
}

/// Attempt to create every wanted item whose key is not in `existing`.
///
/// Keys are attempted once each, in order. A rejection is recorded and the
/// next item is tried; any other error is returned.
pub(crate) async fn create_missing<P, F, Fut, T>(
    report: &mut StageReport,
    existing: &Index,
    wanted: impl IntoIterator<Item = (String, P)>,
    mut create: F,
) -> StoreResult<()>
where
    F: FnMut(P) -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempted: Vec<String> = Vec::new();

    for (key, payload) in wanted {
        if key.is_empty() || existing.contains_key(&key) || attempted.contains(&key) {
            continue;
        }
        attempted.push(key.clone());

        match create(payload).await {
            Ok(_) => {
                tracing::info!("Created {} {:?}", report.stage, key);
                report.created += 1;
            }
            Err(e) if e.is_rejected() => report.reject(&key, &e),
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Drives the stages against one store
pub struct Reconciler<'a, S: NetBoxStore + ?Sized> {
    store: &'a S,
    catalog: &'a CatalogConfig,
    network_map: Option<PathBuf>,
    palette: RolePalette,
    retry_interval: Duration,
}

impl<'a, S: NetBoxStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, catalog: &'a CatalogConfig) -> Self {
        Self {
            store,
            catalog,
            network_map: None,
            palette: RolePalette::from_clock(),
            retry_interval: Duration::from_secs(5),
        }
    }

    pub fn with_network_map(mut self, path: Option<PathBuf>) -> Self {
        self.network_map = path;
        self
    }

    pub fn with_palette(mut self, palette: RolePalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Poll "list sites" until it succeeds. Without `wait`, the first
    /// failure is returned.
    pub async fn wait_until_ready(&self, wait: bool) -> StoreResult<()> {
        loop {
            match self.store.list_sites().await {
                Ok(sites) => {
                    tracing::debug!("NetBox reachable ({} sites)", sites.len());
                    return Ok(());
                }
                Err(e) if wait => {
                    tracing::info!("{}: {}", e.kind(), e);
                    tracing::debug!("retrying in {:?}...", self.retry_interval);
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn run(&mut self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let store = self.store;
        let catalog = self.catalog;

        let mut stage = StageReport::new("group");
        let result = catalog::ensure_groups(store, catalog, &mut stage).await;
        let groups = report.record(stage, result);

        let mut stage = StageReport::new("permission");
        let result = catalog::ensure_permissions(store, catalog, &groups, &mut stage).await;
        let permissions = report.record(stage, result);

        let mut stage = StageReport::new("manufacturer");
        let result = catalog::ensure_manufacturers(store, &catalog.manufacturers, &mut stage).await;
        let manufacturers = report.record(stage, result);

        let mut stage = StageReport::new("role");
        let result = catalog::ensure_roles(store, &catalog.roles, &mut self.palette, &mut stage).await;
        let roles = report.record(stage, result);

        let mut stage = StageReport::new("device type");
        let result = catalog::ensure_device_types(store, &catalog.device_types, &manufacturers, &mut stage).await;
        let device_types = report.record(stage, result);

        let mut stage = StageReport::new("site");
        let result = catalog::ensure_sites(store, &catalog.sites, &mut stage).await;
        let sites = report.record(stage, result);

        report.inventory = Inventory {
            groups,
            permissions,
            manufacturers,
            roles,
            device_types,
            sites,
        };

        if let Some(path) = self.network_map.clone() {
            let mut stage = StageReport::new("network map");
            let result = match netmap::load(&path) {
                Ok(Some(map)) => network::import_network_map(store, &map, &report.inventory, &mut stage).await,
                Ok(None) => {
                    tracing::info!("Network map {} not present, skipping", path.display());
                    Ok(())
                }
                Err(e) => Err(e),
            };
            report.record(stage, result);
        }

        let mut stage = StageReport::new("prefix description");
        let result = migrate::backfill_prefix_descriptions(store, &mut stage).await;
        report.record(stage, result);

        tracing::info!(
            "Reconciliation finished: {} created, {} stage(s) aborted",
            report.total_created(),
            report.aborted_stages().len()
        );
        report
    }
}
