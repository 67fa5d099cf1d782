//! Bulk fixture loading (netbox-initializers) and the device-type library
//! import. Both run through external NetBox tooling and are best-effort.

use anyhow::{Context, Result};
use std::path::Path;
use tempfile::TempDir;

use crate::config::NetBoxPaths;
use crate::process::{CommandRunner, CommandSpec};
use crate::utils::copy_dir_all;

const SITE_TOKEN: &str = "NETBOX_DEFAULT_SITE";
const DEFAULTED_KINDS: [&str; 2] = ["vrfs", "prefixes"];

/// Copy the fixture directory somewhere writable. With `preload_prefixes`,
/// `<kind>_defaults.yml` becomes `<kind>.yml` (unless one already exists)
/// with the default site name filled in.
pub fn stage_fixtures(src: &Path, default_site: Option<&str>, preload_prefixes: bool) -> Result<TempDir> {
    let staged = tempfile::Builder::new()
        .prefix("netbox-preload-")
        .tempdir()
        .context("Failed to create staging directory")?;
    copy_dir_all(src, staged.path())
        .with_context(|| format!("Failed to copy fixtures from {}", src.display()))?;

    if let (true, Some(site)) = (preload_prefixes, default_site) {
        for kind in DEFAULTED_KINDS {
            let defaults = staged.path().join(format!("{}_defaults.yml", kind));
            let target = staged.path().join(format!("{}.yml", kind));
            if !defaults.is_file() || target.exists() {
                continue;
            }
            match std::fs::read_to_string(&defaults) {
                Ok(text) => {
                    if let Err(e) = std::fs::write(&target, text.replace(SITE_TOKEN, site)) {
                        tracing::warn!("Could not write {}: {}", target.display(), e);
                    } else {
                        tracing::debug!("Staged {} for site {:?}", target.display(), site);
                    }
                }
                Err(e) => tracing::warn!("Could not read {}: {}", defaults.display(), e),
            }
        }
    }

    Ok(staged)
}

/// Run `manage.py load_initializer_data` against a staged copy of the
/// fixtures. Returns false when the NetBox tooling or fixtures are absent.
pub async fn load_initializers(
    runner: &dyn CommandRunner,
    paths: &NetBoxPaths,
    preload_dir: &Path,
    default_site: Option<&str>,
    preload_prefixes: bool,
) -> Result<bool> {
    if !paths.has_manage() || !preload_dir.is_dir() {
        tracing::debug!("Skipping netbox-initializers: tooling or {} missing", preload_dir.display());
        return Ok(false);
    }

    let src = preload_dir.to_path_buf();
    let site = default_site.map(str::to_string);
    let staged = tokio::task::spawn_blocking(move || stage_fixtures(&src, site.as_deref(), preload_prefixes))
        .await
        .context("Fixture staging task failed")??;

    let spec = CommandSpec::new(paths.venv_python().to_string_lossy())
        .arg(manage_name(paths))
        .args(["load_initializer_data", "--path"])
        .arg(staged.path().to_string_lossy())
        .current_dir(paths.manage_dir());

    let output = runner.run(&spec).await?;
    if output.success() {
        tracing::debug!("netbox-initializers: {:?} {:?}", output.code, output.lines);
    } else {
        tracing::error!("Error processing netbox-initializers: {:?} {:?}", output.code, output.lines);
    }
    Ok(true)
}

/// Run `nb-dt-import.py` from the device-type library checkout
pub async fn import_device_type_library(
    runner: &dyn CommandRunner,
    paths: &NetBoxPaths,
    library_dir: &Path,
    netbox_url: &str,
    netbox_token: Option<&str>,
) -> Result<bool> {
    if !library_dir.is_dir() {
        tracing::debug!("Skipping device-type library: {} missing", library_dir.display());
        return Ok(false);
    }

    let spec = CommandSpec::new(paths.venv_python().to_string_lossy())
        .arg("nb-dt-import.py")
        .env("NETBOX_URL", netbox_url)
        .env("NETBOX_TOKEN", netbox_token.unwrap_or_default())
        .env("REPO_URL", "local")
        .current_dir(library_dir);

    let output = runner.run(&spec).await?;
    if !output.success() || !output.has_output() {
        tracing::error!("{:?} running nb-dt-import.py: {:?}", output.code, output.lines);
    }
    Ok(true)
}

fn manage_name(paths: &NetBoxPaths) -> String {
    paths
        .manage_script()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manage.py".to_string())
}

/// Fake NetBox install with the venv interpreter and manage.py in place
#[cfg(test)]
pub(crate) fn fake_install(root: &Path) -> NetBoxPaths {
    let paths = NetBoxPaths {
        netbox_dir: root.to_path_buf(),
        superuser_script: root.join("superuser.py"),
    };
    std::fs::create_dir_all(paths.venv_python().parent().unwrap_or(root)).unwrap();
    std::fs::write(paths.venv_python(), "").unwrap();
    std::fs::create_dir_all(paths.manage_dir()).unwrap();
    std::fs::write(paths.manage_script(), "").unwrap();
    std::fs::write(&paths.superuser_script, "print('superuser')\n").unwrap();
    paths
}
