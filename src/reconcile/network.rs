//! Materialize a network map: prefixes, then devices with one interface
//! each, then host addresses bound to those interfaces.

use anyhow::Result;
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;

use crate::netbox::types::*;
use crate::netbox::NetBoxStore;
use crate::netmap::{Host, HostAddress, NetworkMap, Segment};

use super::filler::lowest_id;
use super::{create_missing, Index, Inventory, StageReport};

const DEFAULT_INTERFACE: &str = "default";

pub async fn import_network_map<S: NetBoxStore + ?Sized>(
    store: &S,
    map: &NetworkMap,
    inventory: &Inventory,
    report: &mut StageReport,
) -> Result<()> {
    tracing::info!(
        "Importing network map: {} segment(s), {} host(s)",
        map.segments.len(),
        map.hosts.len()
    );

    ensure_prefixes(store, &map.segments, inventory, report).await?;
    let devices = ensure_devices(store, &map.hosts, inventory, report).await?;
    let interfaces = interface_index(store).await?;
    assign_addresses(store, &map.hosts, &devices, &interfaces, report).await?;
    Ok(())
}

async fn prefix_index<S: NetBoxStore + ?Sized>(store: &S) -> Result<Index> {
    Ok(store
        .list_prefixes()
        .await?
        .into_iter()
        .map(|p| (p.prefix, p.id))
        .collect())
}

async fn device_index<S: NetBoxStore + ?Sized>(store: &S) -> Result<Index> {
    Ok(store
        .list_devices()
        .await?
        .into_iter()
        .filter_map(|d| d.name.map(|name| (name, d.id)))
        .collect())
}

/// Device id to interface id; an interface named `default` wins
async fn interface_index<S: NetBoxStore + ?Sized>(store: &S) -> Result<BTreeMap<i32, i32>> {
    let mut index = BTreeMap::new();
    for iface in store.list_interfaces().await? {
        let Some(device) = iface.device else { continue };
        if iface.name == DEFAULT_INTERFACE {
            index.insert(device.id, iface.id);
        } else {
            index.entry(device.id).or_insert(iface.id);
        }
    }
    tracing::debug!("interfaces: {:?}", index);
    Ok(index)
}

async fn ensure_prefixes<S: NetBoxStore + ?Sized>(
    store: &S,
    segments: &[Segment],
    inventory: &Inventory,
    report: &mut StageReport,
) -> Result<Index> {
    let existing = prefix_index(store).await?;
    tracing::debug!("prefixes (before): {:?}", existing);

    let site = lowest_id(&inventory.sites);
    let wanted = segments.iter().map(|segment| {
        let prefix = segment.network.to_string();
        (
            prefix.clone(),
            PrefixCreate {
                prefix,
                site,
                description: segment.name.clone(),
            },
        )
    });
    create_missing(report, &existing, wanted, |req| async move { store.create_prefix(&req).await }).await?;

    let prefixes = prefix_index(store).await?;
    tracing::debug!("prefixes (after): {:?}", prefixes);
    Ok(prefixes)
}

fn interface_for(device: i32, address: &HostAddress) -> Option<InterfaceCreate> {
    let mac_address = match address {
        HostAddress::Ip(_) => None,
        HostAddress::Mac(mac) => Some(mac.clone()),
        HostAddress::Unrecognized(_) => return None,
    };
    Some(InterfaceCreate {
        device,
        name: DEFAULT_INTERFACE.to_string(),
        iface_type: "other".to_string(),
        mac_address,
    })
}

async fn ensure_devices<S: NetBoxStore + ?Sized>(
    store: &S,
    hosts: &[Host],
    inventory: &Inventory,
    report: &mut StageReport,
) -> Result<Index> {
    let existing = device_index(store).await?;
    tracing::debug!("devices (before): {:?}", existing);

    let site = lowest_id(&inventory.sites);
    let device_type = lowest_id(&inventory.device_types);
    let role = lowest_id(&inventory.roles);
    let mut attempted: HashSet<&str> = HashSet::new();

    for host in hosts {
        if existing.contains_key(&host.name) || !attempted.insert(host.name.as_str()) {
            continue;
        }

        let req = DeviceCreate {
            name: host.name.clone(),
            device_type,
            role,
            site,
        };
        let device = match store.create_device(&req).await {
            Ok(device) => device,
            Err(e) if e.is_rejected() => {
                report.reject(&host.name, &e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!("Created device {:?}", host.name);
        report.created += 1;

        let Some(iface) = interface_for(device.id, &host.address) else {
            tracing::debug!("No interface for {:?}: address {:?} not recognized", host.name, host.address);
            continue;
        };
        match store.create_interface(&iface).await {
            Ok(_) => report.created += 1,
            Err(e) if e.is_rejected() => report.reject(&format!("{} interface", host.name), &e),
            Err(e) => return Err(e.into()),
        }
    }

    let devices = device_index(store).await?;
    tracing::debug!("devices (after): {:?}", devices);
    Ok(devices)
}

async fn assign_addresses<S: NetBoxStore + ?Sized>(
    store: &S,
    hosts: &[Host],
    devices: &Index,
    interfaces: &BTreeMap<i32, i32>,
    report: &mut StageReport,
) -> Result<()> {
    let existing: Index = store
        .list_ip_addresses()
        .await?
        .into_iter()
        .map(|a| (a.address, a.id))
        .collect();
    tracing::debug!("ip addresses (before): {:?}", existing);

    let mut assigned: HashSet<i32> = HashSet::new();

    for host in hosts {
        let (Some(ip), Some(key)) = (host.address.ip(), host.address.host_key()) else {
            continue;
        };
        let Some(&device) = devices.get(&host.name) else {
            continue;
        };
        if existing.contains_key(&key) || assigned.contains(&device) {
            report.skip();
            continue;
        }
        let Some(&interface) = interfaces.get(&device) else {
            tracing::warn!("Device {:?} has no interface, not assigning {}", host.name, key);
            report.skip();
            continue;
        };

        let req = IpAddressCreate {
            address: key.clone(),
            assigned_object_type: "dcim.interface".to_string(),
            assigned_object_id: interface,
        };
        let address = match store.create_ip_address(&req).await {
            Ok(address) => address,
            Err(e) if e.is_rejected() => {
                report.reject(&key, &e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!("Created IP address {} on {:?}", key, host.name);
        report.created += 1;
        assigned.insert(device);

        let primary = match ip {
            IpAddr::V4(_) => PrimaryIp::V4(address.id),
            IpAddr::V6(_) => PrimaryIp::V6(address.id),
        };
        match store.set_primary_ip(device, primary).await {
            Ok(_) => report.updated += 1,
            Err(e) if e.is_rejected() => report.reject(&format!("{} {}", host.name, primary.field()), &e),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
