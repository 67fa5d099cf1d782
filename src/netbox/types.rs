use serde::{Deserialize, Serialize};

// --- NetBox API types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: i32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedRef {
    pub id: i32,
    /// Null for unnamed devices
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

impl NestedRef {
    pub fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()).filter(|n| !n.is_empty()),
            slug: None,
            display: None,
        }
    }

    /// Human-readable label: name, then display string, then the id
    pub fn label(&self) -> String {
        [&self.name, &self.display]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbGroup {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbObjectType {
    pub id: i32,
    pub app_label: String,
    pub model: String,
}

impl NbObjectType {
    /// `app_label.model`, the form permissions reference object types by
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbPermission {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbManufacturer {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbSite {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDeviceRole {
    pub id: i32,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDeviceType {
    pub id: i32,
    pub model: String,
    pub slug: String,
    #[serde(default)]
    pub manufacturer: Option<NestedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbPrefix {
    pub id: i32,
    pub prefix: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub site: Option<NestedRef>,
    #[serde(default)]
    pub vrf: Option<NestedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDevice {
    pub id: i32,
    pub name: Option<String>,
    #[serde(default)]
    pub device_type: Option<NestedRef>,
    #[serde(default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub site: Option<NestedRef>,
    #[serde(default)]
    pub primary_ip4: Option<NbIPAddress>,
    #[serde(default)]
    pub primary_ip: Option<NbIPAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbInterface {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub device: Option<NestedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbIPAddress {
    pub id: i32,
    pub address: String,
    #[serde(default)]
    pub assigned_object_type: Option<String>,
    #[serde(default)]
    pub assigned_object_id: Option<i32>,
}

// --- Create/update request types ---

#[derive(Debug, Clone, Serialize)]
pub struct GroupCreate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionCreate {
    pub name: String,
    pub enabled: bool,
    pub groups: Vec<i32>,
    pub actions: Vec<String>,
    pub object_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManufacturerCreate {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteCreate {
    pub name: String,
    pub slug: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceRoleCreate {
    pub name: String,
    pub slug: String,
    pub vm_role: bool,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceTypeCreate {
    pub manufacturer: Option<i32>,
    pub model: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefixCreate {
    pub prefix: String,
    pub site: Option<i32>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefixUpdate {
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceCreate {
    pub name: String,
    pub device_type: Option<i32>,
    pub role: Option<i32>,
    pub site: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceCreate {
    pub device: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub iface_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IpAddressCreate {
    pub address: String,
    pub assigned_object_type: String,
    pub assigned_object_id: i32,
}

/// Which primary-address field of a device to point at an IP address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryIp {
    V4(i32),
    V6(i32),
}

impl PrimaryIp {
    pub fn field(&self) -> &'static str {
        match self {
            PrimaryIp::V4(_) => "primary_ip4",
            PrimaryIp::V6(_) => "primary_ip",
        }
    }

    pub fn ip_id(&self) -> i32 {
        match self {
            PrimaryIp::V4(id) | PrimaryIp::V6(id) => *id,
        }
    }

    /// PATCH body for the device
    pub fn to_patch(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(self.field().to_string(), serde_json::json!(self.ip_id()));
        serde_json::Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_ip_patch_fields() {
        assert_eq!(PrimaryIp::V4(7).to_patch(), serde_json::json!({"primary_ip4": 7}));
        assert_eq!(PrimaryIp::V6(9).to_patch(), serde_json::json!({"primary_ip": 9}));
    }

    #[test]
    fn test_nested_ref_label_fallbacks() {
        let mut vrf = NestedRef::new(3, "");
        assert_eq!(vrf.label(), "3");
        vrf.display = Some("Office LAN".to_string());
        assert_eq!(vrf.label(), "Office LAN");
        vrf.name = Some("office".to_string());
        assert_eq!(vrf.label(), "office");
    }

    #[test]
    fn test_interface_with_unnamed_device_deserializes() {
        let iface: NbInterface = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "eth0",
            "device": {"id": 9, "display": "Unnamed device", "name": null}
        }))
        .unwrap();
        let device = iface.device.unwrap();
        assert_eq!(device.id, 9);
        assert_eq!(device.name, None);
        assert_eq!(device.label(), "Unnamed device");
    }

    #[test]
    fn test_interface_create_serializes_type_and_skips_missing_mac() {
        let body = serde_json::to_value(InterfaceCreate {
            device: 1,
            name: "default".to_string(),
            iface_type: "other".to_string(),
            mac_address: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"device": 1, "name": "default", "type": "other"}));
    }

    #[test]
    fn test_object_type_qualified_name() {
        let ot = NbObjectType {
            id: 1,
            app_label: "dcim".to_string(),
            model: "device".to_string(),
        };
        assert_eq!(ot.qualified_name(), "dcim.device");
    }
}
