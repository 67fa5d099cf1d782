//! The `seed` command: restore a database dump when one is available,
//! otherwise reconcile the catalog and run the bulk loaders.

use anyhow::{Context, Result};

use crate::config::SeedConfig;
use crate::netbox::{NetBoxClient, NetBoxStore};
use crate::preload;
use crate::process::CommandRunner;
use crate::reconcile::{error_kind, ReconcileReport, Reconciler};
use crate::restore::{self, RestoreOutcome, RestorePipeline};

#[derive(Debug)]
pub enum SeedOutcome {
    /// A dump was loaded; incremental seeding is not needed
    Restored(RestoreOutcome),
    /// A dump was explicitly requested but not loaded
    RestoreRequested(Option<RestoreOutcome>),
    Reconciled(ReconcileReport),
}

pub async fn run(config: &SeedConfig, runner: &dyn CommandRunner) -> Result<SeedOutcome> {
    if let Some(outcome) = restore_snapshot(config, runner).await {
        if outcome.succeeded() {
            return Ok(SeedOutcome::Restored(outcome));
        }
        if config.snapshot_requested() {
            return Ok(SeedOutcome::RestoreRequested(Some(outcome)));
        }
    } else if config.snapshot_requested() {
        let requested = config
            .preload_backup
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        tracing::warn!("Requested snapshot {} not found, skipping seeding", requested);
        return Ok(SeedOutcome::RestoreRequested(None));
    }

    let client = NetBoxClient::new(&config.netbox_url, config.netbox_token.clone(), config.http_timeout)
        .context("Failed to create NetBox client")?;
    seed_store(config, &client, runner).await.map(SeedOutcome::Reconciled)
}

async fn restore_snapshot(config: &SeedConfig, runner: &dyn CommandRunner) -> Option<RestoreOutcome> {
    let snapshot = restore::select_snapshot(config.preload_backup.as_deref(), &config.preload_dir)?;
    let pipeline = RestorePipeline::new(runner, &config.postgres, &config.paths, snapshot);
    Some(pipeline.run().await)
}

/// Reconcile against `store`, then hand off to netbox-initializers and the
/// device-type library importer
pub async fn seed_store<S: NetBoxStore + ?Sized>(
    config: &SeedConfig,
    store: &S,
    runner: &dyn CommandRunner,
) -> Result<ReconcileReport> {
    let mut reconciler = Reconciler::new(store, &config.catalog)
        .with_network_map(config.net_map.clone())
        .with_retry_interval(config.retry_interval);

    reconciler
        .wait_until_ready(config.wait)
        .await
        .with_context(|| format!("NetBox at {} is not reachable", config.netbox_url))?;

    let report = reconciler.run().await;

    if let Err(e) = preload::load_initializers(
        runner,
        &config.paths,
        &config.preload_dir,
        config.catalog.default_site(),
        config.preload_prefixes,
    )
    .await
    {
        tracing::error!("{} processing netbox-initializers: {:#}", error_kind(&e), e);
    }

    if let Err(e) = preload::import_device_type_library(
        runner,
        &config.paths,
        &config.library_dir,
        &config.netbox_url,
        config.netbox_token.as_deref(),
    )
    .await
    {
        tracing::error!("{} processing library: {:#}", error_kind(&e), e);
    }

    Ok(report)
}
