use anyhow::Result;

use crate::config::CatalogConfig;
use crate::netbox::types::*;
use crate::netbox::NetBoxStore;
use crate::utils::slugify;

use super::filler::lowest_id;
use super::{create_missing, Index, RolePalette, StageReport};

const PERMISSION_ACTIONS: [&str; 4] = ["view", "add", "change", "delete"];

/// Object types the default group may not touch
const DEFAULT_GROUP_EXCLUSIONS: [&str; 9] = [
    "admin.logentry",
    "auth.group",
    "auth.permission",
    "auth.user",
    "users.admingroup",
    "users.adminuser",
    "users.objectpermission",
    "users.token",
    "users.userconfig",
];

/// An object permission granted to one group
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionSpec {
    pub name: String,
    pub groups: Vec<String>,
    pub actions: Vec<String>,
    pub exclude_objects: Vec<String>,
}

impl PermissionSpec {
    fn for_group(group: &str, exclude_objects: &[&str]) -> Self {
        Self {
            name: format!("{}_permission", group),
            groups: vec![group.to_string()],
            actions: PERMISSION_ACTIONS.iter().map(|a| a.to_string()).collect(),
            exclude_objects: exclude_objects.iter().map(|o| o.to_string()).collect(),
        }
    }

    /// Resolve group names to ids and expand the exclusion list
    fn to_create(&self, groups: &Index, object_types: &[String]) -> PermissionCreate {
        let group_ids = self
            .groups
            .iter()
            .filter_map(|name| {
                let id = groups.get(name).copied();
                if id.is_none() {
                    tracing::warn!("Group {:?} for permission {:?} does not exist", name, self.name);
                }
                id
            })
            .collect();

        PermissionCreate {
            name: self.name.clone(),
            enabled: true,
            groups: group_ids,
            actions: self.actions.clone(),
            object_types: object_types
                .iter()
                .filter(|ot| !self.exclude_objects.contains(ot))
                .cloned()
                .collect(),
        }
    }
}

/// Staff get everything; the default group gets everything but user administration
pub fn default_permissions(catalog: &CatalogConfig) -> Vec<PermissionSpec> {
    vec![
        PermissionSpec::for_group(&catalog.staff_group, &[]),
        PermissionSpec::for_group(&catalog.default_group, &DEFAULT_GROUP_EXCLUSIONS),
    ]
}

pub async fn ensure_groups<S: NetBoxStore + ?Sized>(
    store: &S,
    catalog: &CatalogConfig,
    report: &mut StageReport,
) -> Result<Index> {
    let existing: Index = store.list_groups().await?.into_iter().map(|g| (g.name, g.id)).collect();
    tracing::debug!("groups (before): {:?}", existing);

    let wanted = [&catalog.staff_group, &catalog.default_group]
        .into_iter()
        .map(|name| (name.clone(), GroupCreate { name: name.clone() }));
    create_missing(report, &existing, wanted, |req| async move { store.create_group(&req).await }).await?;

    let groups: Index = store.list_groups().await?.into_iter().map(|g| (g.name, g.id)).collect();
    tracing::debug!("groups (after): {:?}", groups);
    Ok(groups)
}

pub async fn ensure_permissions<S: NetBoxStore + ?Sized>(
    store: &S,
    catalog: &CatalogConfig,
    groups: &Index,
    report: &mut StageReport,
) -> Result<Index> {
    let object_types: Vec<String> = store
        .list_object_types()
        .await?
        .iter()
        .map(|ot| ot.qualified_name())
        .collect();

    let existing: Index = store
        .list_permissions()
        .await?
        .into_iter()
        .map(|p| (p.name, p.id))
        .collect();
    tracing::debug!("permissions (before): {:?}", existing);

    let wanted = default_permissions(catalog)
        .into_iter()
        .map(|spec| (spec.name.clone(), spec.to_create(groups, &object_types)));
    create_missing(report, &existing, wanted, |req| async move {
        store.create_permission(&req).await
    })
    .await?;

    let permissions: Index = store
        .list_permissions()
        .await?
        .into_iter()
        .map(|p| (p.name, p.id))
        .collect();
    tracing::debug!("permissions (after): {:?}", permissions);
    Ok(permissions)
}

pub async fn ensure_manufacturers<S: NetBoxStore + ?Sized>(
    store: &S,
    names: &[String],
    report: &mut StageReport,
) -> Result<Index> {
    let existing: Index = store
        .list_manufacturers()
        .await?
        .into_iter()
        .map(|m| (m.name, m.id))
        .collect();
    tracing::debug!("manufacturers (before): {:?}", existing);

    let wanted = names.iter().map(|name| {
        (
            name.clone(),
            ManufacturerCreate {
                name: name.clone(),
                slug: slugify(name),
            },
        )
    });
    create_missing(report, &existing, wanted, |req| async move {
        store.create_manufacturer(&req).await
    })
    .await?;

    let manufacturers: Index = store
        .list_manufacturers()
        .await?
        .into_iter()
        .map(|m| (m.name, m.id))
        .collect();
    tracing::debug!("manufacturers (after): {:?}", manufacturers);
    Ok(manufacturers)
}

pub async fn ensure_roles<S: NetBoxStore + ?Sized>(
    store: &S,
    names: &[String],
    palette: &mut RolePalette,
    report: &mut StageReport,
) -> Result<Index> {
    let existing: Index = store
        .list_device_roles()
        .await?
        .into_iter()
        .map(|r| (r.name, r.id))
        .collect();
    tracing::debug!("roles (before): {:?}", existing);

    let wanted = names
        .iter()
        .filter(|name| !existing.contains_key(*name))
        .map(|name| {
            (
                name.clone(),
                DeviceRoleCreate {
                    name: name.clone(),
                    slug: slugify(name),
                    vm_role: true,
                    color: palette.next_color(),
                },
            )
        });
    create_missing(report, &existing, wanted, |req| async move {
        store.create_device_role(&req).await
    })
    .await?;

    let roles: Index = store
        .list_device_roles()
        .await?
        .into_iter()
        .map(|r| (r.name, r.id))
        .collect();
    tracing::debug!("roles (after): {:?}", roles);
    Ok(roles)
}

pub async fn ensure_device_types<S: NetBoxStore + ?Sized>(
    store: &S,
    models: &[String],
    manufacturers: &Index,
    report: &mut StageReport,
) -> Result<Index> {
    let existing: Index = store
        .list_device_types()
        .await?
        .into_iter()
        .map(|t| (t.model, t.id))
        .collect();
    tracing::debug!("device types (before): {:?}", existing);

    let manufacturer = lowest_id(manufacturers);
    let wanted = models.iter().map(|model| {
        (
            model.clone(),
            DeviceTypeCreate {
                manufacturer,
                model: model.clone(),
                slug: slugify(model),
            },
        )
    });
    create_missing(report, &existing, wanted, |req| async move {
        store.create_device_type(&req).await
    })
    .await?;

    let device_types: Index = store
        .list_device_types()
        .await?
        .into_iter()
        .map(|t| (t.model, t.id))
        .collect();
    tracing::debug!("device types (after): {:?}", device_types);
    Ok(device_types)
}

pub async fn ensure_sites<S: NetBoxStore + ?Sized>(
    store: &S,
    names: &[String],
    report: &mut StageReport,
) -> Result<Index> {
    let existing: Index = store.list_sites().await?.into_iter().map(|s| (s.name, s.id)).collect();
    tracing::debug!("sites (before): {:?}", existing);

    let wanted = names.iter().map(|name| {
        (
            name.clone(),
            SiteCreate {
                name: name.clone(),
                slug: slugify(name),
                status: "active".to_string(),
            },
        )
    });
    create_missing(report, &existing, wanted, |req| async move { store.create_site(&req).await }).await?;

    let sites: Index = store.list_sites().await?.into_iter().map(|s| (s.name, s.id)).collect();
    tracing::debug!("sites (after): {:?}", sites);
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::memory::MemoryStore;

    fn catalog() -> CatalogConfig {
        CatalogConfig {
            staff_group: "administrator".to_string(),
            default_group: "standard".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_permissions() {
        let specs = default_permissions(&catalog());
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "administrator_permission");
        assert!(specs[0].exclude_objects.is_empty());
        assert_eq!(specs[1].name, "standard_permission");
        assert_eq!(specs[1].groups, vec!["standard".to_string()]);
        assert!(specs[1].exclude_objects.contains(&"users.token".to_string()));
        assert_eq!(specs[1].actions, vec!["view", "add", "change", "delete"]);
    }

    #[tokio::test]
    async fn test_permissions_exclude_objects_and_resolve_groups() {
        let store = MemoryStore::with_object_types(&["dcim.site", "dcim.device", "auth.user", "users.token"]);
        let catalog = catalog();

        let mut report = StageReport::new("group");
        let groups = ensure_groups(&store, &catalog, &mut report).await.unwrap();
        assert_eq!(report.created, 2);

        let mut report = StageReport::new("permission");
        let permissions = ensure_permissions(&store, &catalog, &groups, &mut report).await.unwrap();
        assert_eq!(permissions.len(), 2);

        let payloads = store.permission_payloads();
        let staff = payloads.iter().find(|p| p.name == "administrator_permission").unwrap();
        assert_eq!(staff.object_types.len(), 4);
        assert_eq!(staff.groups, vec![groups["administrator"]]);

        let standard = payloads.iter().find(|p| p.name == "standard_permission").unwrap();
        assert_eq!(standard.object_types, vec!["dcim.site".to_string(), "dcim.device".to_string()]);
        assert_eq!(standard.groups, vec![groups["standard"]]);
        assert!(standard.enabled);
    }

    #[tokio::test]
    async fn test_device_type_uses_lowest_manufacturer() {
        let store = MemoryStore::new();
        let zeta = store.add_manufacturer("Zeta");
        let mut report = StageReport::new("manufacturer");
        let manufacturers = ensure_manufacturers(&store, &["Alpha".to_string()], &mut report)
            .await
            .unwrap();
        assert!(manufacturers["Alpha"] > zeta);

        let mut report = StageReport::new("device type");
        ensure_device_types(&store, &["Model-X".to_string()], &manufacturers, &mut report)
            .await
            .unwrap();

        let types = store.list_device_types().await.unwrap();
        assert_eq!(types[0].manufacturer.as_ref().map(|m| m.id), Some(zeta));
    }

    #[tokio::test]
    async fn test_roles_get_colors_and_vm_role() {
        let store = MemoryStore::new();
        store.add_role("Existing");
        let mut palette = RolePalette::with_seed(3);
        let mut report = StageReport::new("role");

        let roles = ensure_roles(
            &store,
            &["Existing".to_string(), "Sensor".to_string()],
            &mut palette,
            &mut report,
        )
        .await
        .unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(roles.len(), 2);
        let sensor = store
            .list_device_roles()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == "Sensor")
            .unwrap();
        assert_eq!(sensor.slug, "sensor");
        assert_eq!(sensor.color.len(), 6);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_stage() {
        let store = MemoryStore::new();
        store.fail_listing("site");
        let mut report = StageReport::new("site");

        let err = ensure_sites(&store, &["HQ".to_string()], &mut report).await.unwrap_err();
        let kind = err.downcast_ref::<crate::netbox::StoreError>().map(|e| e.kind());
        assert_eq!(kind, Some("Connectivity"));
        assert_eq!(store.create_calls(), 0);
    }
}
