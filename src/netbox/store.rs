use async_trait::async_trait;

use super::error::StoreResult;
use super::types::*;

/// Collection-scoped operations the reconciler needs from NetBox.
///
/// `NetBoxClient` implements this over the REST API. List operations return
/// the whole collection; create operations return the stored record and
/// report validation or duplicate failures as `StoreError::Rejected`.
#[async_trait]
pub trait NetBoxStore: Send + Sync {
    async fn list_groups(&self) -> StoreResult<Vec<NbGroup>>;
    async fn create_group(&self, req: &GroupCreate) -> StoreResult<NbGroup>;

    async fn list_object_types(&self) -> StoreResult<Vec<NbObjectType>>;
    async fn list_permissions(&self) -> StoreResult<Vec<NbPermission>>;
    async fn create_permission(&self, req: &PermissionCreate) -> StoreResult<NbPermission>;

    async fn list_manufacturers(&self) -> StoreResult<Vec<NbManufacturer>>;
    async fn create_manufacturer(&self, req: &ManufacturerCreate) -> StoreResult<NbManufacturer>;

    async fn list_device_roles(&self) -> StoreResult<Vec<NbDeviceRole>>;
    async fn create_device_role(&self, req: &DeviceRoleCreate) -> StoreResult<NbDeviceRole>;

    async fn list_device_types(&self) -> StoreResult<Vec<NbDeviceType>>;
    async fn create_device_type(&self, req: &DeviceTypeCreate) -> StoreResult<NbDeviceType>;

    async fn list_sites(&self) -> StoreResult<Vec<NbSite>>;
    async fn create_site(&self, req: &SiteCreate) -> StoreResult<NbSite>;

    async fn list_prefixes(&self) -> StoreResult<Vec<NbPrefix>>;
    async fn list_prefixes_without_description(&self) -> StoreResult<Vec<NbPrefix>>;
    async fn create_prefix(&self, req: &PrefixCreate) -> StoreResult<NbPrefix>;
    async fn update_prefix(&self, id: i32, req: &PrefixUpdate) -> StoreResult<NbPrefix>;

    async fn list_devices(&self) -> StoreResult<Vec<NbDevice>>;
    async fn create_device(&self, req: &DeviceCreate) -> StoreResult<NbDevice>;
    async fn set_primary_ip(&self, device_id: i32, ip: PrimaryIp) -> StoreResult<NbDevice>;

    async fn list_interfaces(&self) -> StoreResult<Vec<NbInterface>>;
    async fn create_interface(&self, req: &InterfaceCreate) -> StoreResult<NbInterface>;

    async fn list_ip_addresses(&self) -> StoreResult<Vec<NbIPAddress>>;
    async fn create_ip_address(&self, req: &IpAddressCreate) -> StoreResult<NbIPAddress>;
}
