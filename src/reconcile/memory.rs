//! In-memory `NetBoxStore` for exercising the reconciler.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::netbox::types::*;
use crate::netbox::{NetBoxStore, StoreError, StoreResult};
use crate::utils::slugify;

#[derive(Default)]
struct Inner {
    next_id: i32,
    groups: Vec<NbGroup>,
    permissions: Vec<NbPermission>,
    permission_payloads: Vec<PermissionCreate>,
    object_types: Vec<NbObjectType>,
    manufacturers: Vec<NbManufacturer>,
    roles: Vec<NbDeviceRole>,
    device_types: Vec<NbDeviceType>,
    sites: Vec<NbSite>,
    prefixes: Vec<NbPrefix>,
    devices: Vec<NbDevice>,
    interfaces: Vec<NbInterface>,
    ip_addresses: Vec<NbIPAddress>,
    rejected_names: HashSet<String>,
    failing_lists: HashMap<&'static str, Option<u32>>,
    failing_updates: bool,
    create_calls: u32,
    device_creates: Vec<DeviceCreate>,
}

impl Inner {
    fn allocate(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_list(&mut self, kind: &'static str) -> StoreResult<()> {
        match self.failing_lists.get_mut(kind) {
            Some(None) => Err(StoreError::Connectivity(format!("{} listing unavailable", kind))),
            Some(Some(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Connectivity(format!("{} listing unavailable", kind)))
            }
            _ => Ok(()),
        }
    }

    fn check_create(&mut self, key: &str, duplicate: bool) -> StoreResult<()> {
        self.create_calls += 1;
        if self.rejected_names.contains(key) {
            return Err(StoreError::rejected(400, format!("{} is not allowed", key)));
        }
        if duplicate {
            return Err(StoreError::rejected(400, format!("{} already exists", key)));
        }
        Ok(())
    }

    fn nested_site(&self, id: Option<i32>) -> Option<NestedRef> {
        let id = id?;
        self.sites.iter().find(|s| s.id == id).map(|s| NestedRef::new(s.id, &s.name))
    }

    fn nested_role(&self, id: Option<i32>) -> Option<NestedRef> {
        let id = id?;
        self.roles.iter().find(|r| r.id == id).map(|r| NestedRef::new(r.id, &r.name))
    }

    fn nested_device_type(&self, id: Option<i32>) -> Option<NestedRef> {
        let id = id?;
        self.device_types
            .iter()
            .find(|t| t.id == id)
            .map(|t| NestedRef::new(t.id, &t.model))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_types(names: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for name in names {
                let (app_label, model) = name.split_once('.').unwrap_or((*name, ""));
                let id = inner.allocate();
                inner.object_types.push(NbObjectType {
                    id,
                    app_label: app_label.to_string(),
                    model: model.to_string(),
                });
            }
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Creates whose key equals `name` are rejected
    pub fn reject_name(&self, name: &str) {
        self.lock().rejected_names.insert(name.to_string());
    }

    /// Every listing of `kind` fails
    pub fn fail_listing(&self, kind: &'static str) {
        self.lock().failing_lists.insert(kind, None);
    }

    /// The next `times` listings of `kind` fail
    pub fn fail_listing_times(&self, kind: &'static str, times: u32) {
        self.lock().failing_lists.insert(kind, Some(times));
    }

    pub fn list_failures_remaining(&self, kind: &'static str) -> u32 {
        match self.lock().failing_lists.get(kind) {
            Some(Some(n)) => *n,
            Some(None) => u32::MAX,
            None => 0,
        }
    }

    pub fn fail_updates(&self) {
        self.lock().failing_updates = true;
    }

    pub fn create_calls(&self) -> u32 {
        self.lock().create_calls
    }

    pub fn device_creates(&self) -> Vec<DeviceCreate> {
        self.lock().device_creates.clone()
    }

    pub fn permission_payloads(&self) -> Vec<PermissionCreate> {
        self.lock().permission_payloads.clone()
    }

    pub fn add_site(&self, name: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        inner.sites.push(NbSite {
            id,
            name: name.to_string(),
            slug: slugify(name),
        });
        id
    }

    pub fn add_manufacturer(&self, name: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        inner.manufacturers.push(NbManufacturer {
            id,
            name: name.to_string(),
            slug: slugify(name),
        });
        id
    }

    pub fn add_role(&self, name: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        inner.roles.push(NbDeviceRole {
            id,
            name: name.to_string(),
            slug: slugify(name),
            color: "9e9e9e".to_string(),
        });
        id
    }

    pub fn add_device_type(&self, model: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        inner.device_types.push(NbDeviceType {
            id,
            model: model.to_string(),
            slug: slugify(model),
            manufacturer: None,
        });
        id
    }

    pub fn add_device(&self, name: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        inner.devices.push(NbDevice {
            id,
            name: Some(name.to_string()),
            device_type: None,
            role: None,
            site: None,
            primary_ip4: None,
            primary_ip: None,
        });
        id
    }

    pub fn add_prefix(&self, prefix: &str, description: &str, vrf: Option<&str>) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        let vrf = vrf.map(|name| {
            let vrf_id = inner.allocate();
            NestedRef::new(vrf_id, name)
        });
        inner.prefixes.push(NbPrefix {
            id,
            prefix: prefix.to_string(),
            description: description.to_string(),
            site: None,
            vrf,
        });
        id
    }

    pub fn add_ip_address(&self, address: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.allocate();
        inner.ip_addresses.push(NbIPAddress {
            id,
            address: address.to_string(),
            assigned_object_type: None,
            assigned_object_id: None,
        });
        id
    }
}

#[async_trait]
impl NetBoxStore for MemoryStore {
    async fn list_groups(&self) -> StoreResult<Vec<NbGroup>> {
        let mut inner = self.lock();
        inner.check_list("group")?;
        Ok(inner.groups.clone())
    }

    async fn create_group(&self, req: &GroupCreate) -> StoreResult<NbGroup> {
        let mut inner = self.lock();
        let duplicate = inner.groups.iter().any(|g| g.name == req.name);
        inner.check_create(&req.name, duplicate)?;
        let group = NbGroup {
            id: inner.allocate(),
            name: req.name.clone(),
        };
        inner.groups.push(group.clone());
        Ok(group)
    }

    async fn list_object_types(&self) -> StoreResult<Vec<NbObjectType>> {
        let mut inner = self.lock();
        inner.check_list("object type")?;
        Ok(inner.object_types.clone())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<NbPermission>> {
        let mut inner = self.lock();
        inner.check_list("permission")?;
        Ok(inner.permissions.clone())
    }

    async fn create_permission(&self, req: &PermissionCreate) -> StoreResult<NbPermission> {
        let mut inner = self.lock();
        let duplicate = inner.permissions.iter().any(|p| p.name == req.name);
        inner.check_create(&req.name, duplicate)?;
        let permission = NbPermission {
            id: inner.allocate(),
            name: req.name.clone(),
            enabled: req.enabled,
        };
        inner.permissions.push(permission.clone());
        inner.permission_payloads.push(req.clone());
        Ok(permission)
    }

    async fn list_manufacturers(&self) -> StoreResult<Vec<NbManufacturer>> {
        let mut inner = self.lock();
        inner.check_list("manufacturer")?;
        Ok(inner.manufacturers.clone())
    }

    async fn create_manufacturer(&self, req: &ManufacturerCreate) -> StoreResult<NbManufacturer> {
        let mut inner = self.lock();
        let duplicate = inner.manufacturers.iter().any(|m| m.name == req.name || m.slug == req.slug);
        inner.check_create(&req.name, duplicate)?;
        let manufacturer = NbManufacturer {
            id: inner.allocate(),
            name: req.name.clone(),
            slug: req.slug.clone(),
        };
        inner.manufacturers.push(manufacturer.clone());
        Ok(manufacturer)
    }

    async fn list_device_roles(&self) -> StoreResult<Vec<NbDeviceRole>> {
        let mut inner = self.lock();
        inner.check_list("role")?;
        Ok(inner.roles.clone())
    }

    async fn create_device_role(&self, req: &DeviceRoleCreate) -> StoreResult<NbDeviceRole> {
        let mut inner = self.lock();
        let duplicate = inner.roles.iter().any(|r| r.name == req.name || r.slug == req.slug);
        inner.check_create(&req.name, duplicate)?;
        let role = NbDeviceRole {
            id: inner.allocate(),
            name: req.name.clone(),
            slug: req.slug.clone(),
            color: req.color.clone(),
        };
        inner.roles.push(role.clone());
        Ok(role)
    }

    async fn list_device_types(&self) -> StoreResult<Vec<NbDeviceType>> {
        let mut inner = self.lock();
        inner.check_list("device type")?;
        Ok(inner.device_types.clone())
    }

    async fn create_device_type(&self, req: &DeviceTypeCreate) -> StoreResult<NbDeviceType> {
        let mut inner = self.lock();
        let duplicate = inner.device_types.iter().any(|t| t.model == req.model);
        inner.check_create(&req.model, duplicate)?;
        let manufacturer = req
            .manufacturer
            .and_then(|id| inner.manufacturers.iter().find(|m| m.id == id))
            .map(|m| NestedRef::new(m.id, &m.name))
            .ok_or_else(|| StoreError::rejected(400, "manufacturer: This field is required."))?;
        let device_type = NbDeviceType {
            id: inner.allocate(),
            model: req.model.clone(),
            slug: req.slug.clone(),
            manufacturer: Some(manufacturer),
        };
        inner.device_types.push(device_type.clone());
        Ok(device_type)
    }

    async fn list_sites(&self) -> StoreResult<Vec<NbSite>> {
        let mut inner = self.lock();
        inner.check_list("site")?;
        Ok(inner.sites.clone())
    }

    async fn create_site(&self, req: &SiteCreate) -> StoreResult<NbSite> {
        let mut inner = self.lock();
        let duplicate = inner.sites.iter().any(|s| s.name == req.name || s.slug == req.slug);
        inner.check_create(&req.name, duplicate)?;
        let site = NbSite {
            id: inner.allocate(),
            name: req.name.clone(),
            slug: req.slug.clone(),
        };
        inner.sites.push(site.clone());
        Ok(site)
    }

    async fn list_prefixes(&self) -> StoreResult<Vec<NbPrefix>> {
        let mut inner = self.lock();
        inner.check_list("prefix")?;
        Ok(inner.prefixes.clone())
    }

    async fn list_prefixes_without_description(&self) -> StoreResult<Vec<NbPrefix>> {
        let mut inner = self.lock();
        inner.check_list("prefix")?;
        Ok(inner
            .prefixes
            .iter()
            .filter(|p| p.description.is_empty())
            .cloned()
            .collect())
    }

    async fn create_prefix(&self, req: &PrefixCreate) -> StoreResult<NbPrefix> {
        let mut inner = self.lock();
        inner.check_create(&req.prefix, false)?;
        let site = inner.nested_site(req.site);
        let prefix = NbPrefix {
            id: inner.allocate(),
            prefix: req.prefix.clone(),
            description: req.description.clone(),
            site,
            vrf: None,
        };
        inner.prefixes.push(prefix.clone());
        Ok(prefix)
    }

    async fn update_prefix(&self, id: i32, req: &PrefixUpdate) -> StoreResult<NbPrefix> {
        let mut inner = self.lock();
        if inner.failing_updates {
            return Err(StoreError::Unexpected("update failed".to_string()));
        }
        let prefix = inner
            .prefixes
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::rejected(404, "Not found."))?;
        prefix.description = req.description.clone();
        Ok(prefix.clone())
    }

    async fn list_devices(&self) -> StoreResult<Vec<NbDevice>> {
        let mut inner = self.lock();
        inner.check_list("device")?;
        Ok(inner.devices.clone())
    }

    async fn create_device(&self, req: &DeviceCreate) -> StoreResult<NbDevice> {
        let mut inner = self.lock();
        let duplicate = inner.devices.iter().any(|d| d.name.as_deref() == Some(req.name.as_str()));
        inner.check_create(&req.name, duplicate)?;
        let site = inner.nested_site(req.site);
        let role = inner.nested_role(req.role);
        let device_type = inner.nested_device_type(req.device_type);
        if site.is_none() || role.is_none() || device_type.is_none() {
            return Err(StoreError::rejected(400, "site, role and device_type are required"));
        }
        let device = NbDevice {
            id: inner.allocate(),
            name: Some(req.name.clone()),
            device_type,
            role,
            site,
            primary_ip4: None,
            primary_ip: None,
        };
        inner.devices.push(device.clone());
        inner.device_creates.push(req.clone());
        Ok(device)
    }

    async fn set_primary_ip(&self, device_id: i32, ip: PrimaryIp) -> StoreResult<NbDevice> {
        let mut inner = self.lock();
        if inner.failing_updates {
            return Err(StoreError::Unexpected("update failed".to_string()));
        }
        let address = inner
            .ip_addresses
            .iter()
            .find(|a| a.id == ip.ip_id())
            .cloned()
            .ok_or_else(|| StoreError::rejected(400, "unknown IP address"))?;
        let device = inner
            .devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| StoreError::rejected(404, "Not found."))?;
        match ip {
            PrimaryIp::V4(_) => device.primary_ip4 = Some(address),
            PrimaryIp::V6(_) => device.primary_ip = Some(address),
        }
        Ok(device.clone())
    }

    async fn list_interfaces(&self) -> StoreResult<Vec<NbInterface>> {
        let mut inner = self.lock();
        inner.check_list("interface")?;
        Ok(inner.interfaces.clone())
    }

    async fn create_interface(&self, req: &InterfaceCreate) -> StoreResult<NbInterface> {
        let mut inner = self.lock();
        inner.check_create(&req.name, false)?;
        let device = inner
            .devices
            .iter()
            .find(|d| d.id == req.device)
            .map(|d| NestedRef {
                name: d.name.clone(),
                ..NestedRef::new(d.id, "")
            })
            .ok_or_else(|| StoreError::rejected(400, "device does not exist"))?;
        let interface = NbInterface {
            id: inner.allocate(),
            name: req.name.clone(),
            mac_address: req.mac_address.clone(),
            device: Some(device),
        };
        inner.interfaces.push(interface.clone());
        Ok(interface)
    }

    async fn list_ip_addresses(&self) -> StoreResult<Vec<NbIPAddress>> {
        let mut inner = self.lock();
        inner.check_list("ip address")?;
        Ok(inner.ip_addresses.clone())
    }

    async fn create_ip_address(&self, req: &IpAddressCreate) -> StoreResult<NbIPAddress> {
        let mut inner = self.lock();
        let duplicate = inner.ip_addresses.iter().any(|a| a.address == req.address);
        inner.check_create(&req.address, duplicate)?;
        let address = NbIPAddress {
            id: inner.allocate(),
            address: req.address.clone(),
            assigned_object_type: Some(req.assigned_object_type.clone()),
            assigned_object_id: Some(req.assigned_object_id),
        };
        inner.ip_addresses.push(address.clone());
        Ok(address)
    }
}
