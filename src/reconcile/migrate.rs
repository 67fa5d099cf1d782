use anyhow::Result;

use crate::netbox::types::PrefixUpdate;
use crate::netbox::NetBoxStore;

use super::StageReport;

/// Older NetBox releases kept a prefix's label on its VRF. Copy that label
/// into any prefix whose own description is still empty.
pub async fn backfill_prefix_descriptions<S: NetBoxStore + ?Sized>(
    store: &S,
    report: &mut StageReport,
) -> Result<()> {
    let prefixes = store.list_prefixes_without_description().await?;
    tracing::debug!("{} prefix(es) without description", prefixes.len());

    for prefix in prefixes {
        if !prefix.description.is_empty() {
            continue;
        }
        let Some(vrf) = prefix.vrf.as_ref() else {
            continue;
        };
        let label = vrf.label();
        if label.is_empty() {
            continue;
        }

        let update = PrefixUpdate {
            description: label.clone(),
        };
        match store.update_prefix(prefix.id, &update).await {
            Ok(_) => {
                tracing::info!("Set description of prefix {} to {:?}", prefix.prefix, label);
                report.updated += 1;
            }
            Err(e) => {
                tracing::warn!("{} updating prefix {}: {}", e.kind(), prefix.prefix, e);
                report.skip();
            }
        }
    }

    Ok(())
}
