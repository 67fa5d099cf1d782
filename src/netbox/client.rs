use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::store::NetBoxStore;
use super::types::*;

const PAGE_LIMIT: u32 = 1000;

/// NetBox API client
pub struct NetBoxClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl NetBoxClient {
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Accept", "application/json");
        match &self.token {
            Some(token) => req.header("Authorization", format!("Token {}", token)),
            None => req,
        }
    }

    /// Send a request and decode the JSON body, classifying failures
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> StoreResult<T> {
        let resp = self.authorize(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(StoreError::rejected(status.as_u16(), body));
            }
            return Err(StoreError::Unexpected(format!("NetBox API error {}: {}", status, body)));
        }

        resp.json()
            .await
            .map_err(|e| StoreError::MalformedInput(format!("NetBox response: {}", e)))
    }

    /// GET every page of a collection, following `next` links
    async fn list_paginated<T: DeserializeOwned>(&self, endpoint: &str) -> StoreResult<Vec<T>> {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let mut url = Some(self.api_url(&format!("{}{}limit={}", endpoint, separator, PAGE_LIMIT)));
        let mut results = Vec::new();

        while let Some(page_url) = url.take() {
            let page: PaginatedResponse<T> = self.send(self.client.get(&page_url)).await?;
            results.extend(page.results);
            url = page.next.filter(|next| !next.is_empty());
        }

        Ok(results)
    }

    /// Helper to create a resource via POST
    async fn create_resource<T, B>(&self, endpoint: &str, body: &B) -> StoreResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.client.post(self.api_url(endpoint)).json(body)).await
    }

    /// Helper to partially update a resource via PATCH
    async fn patch_resource<T, B>(&self, endpoint: &str, id: i32, body: &B) -> StoreResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.api_url(&format!("{}{}/", endpoint, id));
        self.send(self.client.patch(url).json(body)).await
    }
}

#[async_trait]
impl NetBoxStore for NetBoxClient {
    // --- Users ---

    async fn list_groups(&self) -> StoreResult<Vec<NbGroup>> {
        self.list_paginated("/users/groups/").await
    }

    async fn create_group(&self, req: &GroupCreate) -> StoreResult<NbGroup> {
        self.create_resource("/users/groups/", req).await
    }

    async fn list_object_types(&self) -> StoreResult<Vec<NbObjectType>> {
        self.list_paginated("/extras/content-types/").await
    }

    async fn list_permissions(&self) -> StoreResult<Vec<NbPermission>> {
        self.list_paginated("/users/permissions/").await
    }

    async fn create_permission(&self, req: &PermissionCreate) -> StoreResult<NbPermission> {
        self.create_resource("/users/permissions/", req).await
    }

    // --- DCIM catalog ---

    async fn list_manufacturers(&self) -> StoreResult<Vec<NbManufacturer>> {
        self.list_paginated("/dcim/manufacturers/").await
    }

    async fn create_manufacturer(&self, req: &ManufacturerCreate) -> StoreResult<NbManufacturer> {
        self.create_resource("/dcim/manufacturers/", req).await
    }

    async fn list_device_roles(&self) -> StoreResult<Vec<NbDeviceRole>> {
        self.list_paginated("/dcim/device-roles/").await
    }

    async fn create_device_role(&self, req: &DeviceRoleCreate) -> StoreResult<NbDeviceRole> {
        self.create_resource("/dcim/device-roles/", req).await
    }

    async fn list_device_types(&self) -> StoreResult<Vec<NbDeviceType>> {
        self.list_paginated("/dcim/device-types/").await
    }

    async fn create_device_type(&self, req: &DeviceTypeCreate) -> StoreResult<NbDeviceType> {
        self.create_resource("/dcim/device-types/", req).await
    }

    async fn list_sites(&self) -> StoreResult<Vec<NbSite>> {
        self.list_paginated("/dcim/sites/").await
    }

    async fn create_site(&self, req: &SiteCreate) -> StoreResult<NbSite> {
        self.create_resource("/dcim/sites/", req).await
    }

    // --- IPAM prefixes ---

    async fn list_prefixes(&self) -> StoreResult<Vec<NbPrefix>> {
        self.list_paginated("/ipam/prefixes/").await
    }

    async fn list_prefixes_without_description(&self) -> StoreResult<Vec<NbPrefix>> {
        self.list_paginated("/ipam/prefixes/?description__empty=true").await
    }

    async fn create_prefix(&self, req: &PrefixCreate) -> StoreResult<NbPrefix> {
        self.create_resource("/ipam/prefixes/", req).await
    }

    async fn update_prefix(&self, id: i32, req: &PrefixUpdate) -> StoreResult<NbPrefix> {
        self.patch_resource("/ipam/prefixes/", id, req).await
    }

    // --- Devices ---

    async fn list_devices(&self) -> StoreResult<Vec<NbDevice>> {
        self.list_paginated("/dcim/devices/").await
    }

    async fn create_device(&self, req: &DeviceCreate) -> StoreResult<NbDevice> {
        self.create_resource("/dcim/devices/", req).await
    }

    async fn set_primary_ip(&self, device_id: i32, ip: PrimaryIp) -> StoreResult<NbDevice> {
        self.patch_resource("/dcim/devices/", device_id, &ip.to_patch()).await
    }

    // --- Interfaces ---

    async fn list_interfaces(&self) -> StoreResult<Vec<NbInterface>> {
        self.list_paginated("/dcim/interfaces/").await
    }

    async fn create_interface(&self, req: &InterfaceCreate) -> StoreResult<NbInterface> {
        self.create_resource("/dcim/interfaces/", req).await
    }

    // --- IP addresses ---

    async fn list_ip_addresses(&self) -> StoreResult<Vec<NbIPAddress>> {
        self.list_paginated("/ipam/ip-addresses/").await
    }

    async fn create_ip_address(&self, req: &IpAddressCreate) -> StoreResult<NbIPAddress> {
        self.create_resource("/ipam/ip-addresses/", req).await
    }
}
