//! Raspberry Pi image build recipes.
//!
//! A master recipe carries `__TOKEN__` placeholders. Scalar tokens are
//! replaced in place; block tokens replace their whole line with a list of
//! lines at the same indentation. Lines left empty by a substitution are
//! dropped afterwards.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const MASTER_RECIPE: &str = "raspi_master.yaml";

#[derive(Debug, Error, PartialEq)]
pub enum RecipeError {
    #[error("unsupported version {0}")]
    UnsupportedVersion(String),
    #[error("unsupported suite {0}")]
    UnsupportedSuite(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiVersion(u8);

impl PiVersion {
    pub fn number(&self) -> u8 {
        self.0
    }
}

impl FromStr for PiVersion {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "2" | "3" | "4" => s
                .parse()
                .map(PiVersion)
                .map_err(|_| RecipeError::UnsupportedVersion(s.to_string())),
            _ => Err(RecipeError::UnsupportedVersion(s.to_string())),
        }
    }
}

impl fmt::Display for PiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    Bullseye,
    Bookworm,
    Trixie,
}

impl Suite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Bullseye => "bullseye",
            Suite::Bookworm => "bookworm",
            Suite::Trixie => "trixie",
        }
    }
}

impl FromStr for Suite {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bullseye" => Ok(Suite::Bullseye),
            "bookworm" => Ok(Suite::Bookworm),
            "trixie" => Ok(Suite::Trixie),
            _ => Err(RecipeError::UnsupportedSuite(s.to_string())),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source locations the root shell commands copy from, and the build stamp
#[derive(Debug, Clone)]
pub struct RecipeContext {
    pub malcolm_dir: PathBuf,
    pub sensor_dir: PathBuf,
    pub buildtime: String,
}

impl RecipeContext {
    pub fn new(malcolm_dir: impl Into<PathBuf>) -> Self {
        let malcolm_dir = malcolm_dir.into();
        Self {
            sensor_dir: malcolm_dir.join("sensor-iso"),
            malcolm_dir,
            buildtime: chrono::Utc::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeVariant {
    pub version: PiVersion,
    pub suite: Suite,
}

impl RecipeVariant {
    pub fn new(version: PiVersion, suite: Suite) -> Self {
        Self { version, suite }
    }

    pub fn output_name(&self) -> String {
        format!("raspi_{}_{}.yaml", self.version, self.suite)
    }

    pub fn arch(&self) -> &'static str {
        match self.version.0 {
            1 => "armel",
            2 => "armhf",
            _ => "arm64",
        }
    }

    pub fn linux_image(&self) -> &'static str {
        match self.version.0 {
            1 => "linux-image-rpi",
            2 => "linux-image-armmp",
            _ => "linux-image-arm64",
        }
    }

    pub fn dtb(&self) -> &'static str {
        match self.version.0 {
            1 => "/usr/lib/linux-image-*-rpi/bcm*rpi-*.dtb",
            2 => "/usr/lib/linux-image-*-armmp/bcm*rpi*.dtb",
            _ => "/usr/lib/linux-image-*-arm64/broadcom/bcm*rpi*.dtb",
        }
    }

    /// Bookworm moved raspi-firmware from `non-free` to `non-free-firmware`
    pub fn firmware_component(&self) -> &'static str {
        match self.suite {
            Suite::Bullseye => "non-free",
            _ => "non-free-firmware",
        }
    }

    pub fn firmware_component_old(&self) -> &'static str {
        match self.suite {
            Suite::Bullseye => "",
            _ => "non-free",
        }
    }

    pub fn wireless_firmware(&self) -> &'static str {
        if self.version.0 == 2 {
            ""
        } else {
            "firmware-brcm80211"
        }
    }

    pub fn bluetooth_firmware(&self) -> &'static str {
        if self.version.0 == 2 {
            ""
        } else {
            "bluez-firmware"
        }
    }

    pub fn serial_console(&self) -> &'static str {
        match self.version.0 {
            1 | 2 => "ttyAMA0,115200",
            _ => "ttyS1,115200",
        }
    }

    pub fn hostname(&self) -> String {
        format!("Hedgehog-rpi-{}", self.version)
    }

    pub fn extra_chroot_shell_cmds(&self) -> Vec<String> {
        let mut cmds = Vec::new();
        if self.version.0 == 4 {
            cmds.push("sed -i 's/cma=64M //' /boot/firmware/cmdline.txt".to_string());
        }
        cmds.push("chmod 755 /root/sensor_install.sh".to_string());
        cmds.push("/root/sensor_install.sh 2>&1 | tee -a /root/sensor_install_debug".to_string());
        cmds
    }

    pub fn extra_root_shell_cmds(&self, ctx: &RecipeContext) -> Vec<String> {
        let malcolm = ctx.malcolm_dir.display();
        let sensor = ctx.sensor_dir.display();
        vec![
            r#"cp sensor_install.sh "${ROOT?}/root/""#.to_string(),
            r#"/bin/bash -c 'mkdir -p "${ROOT?}/opt/"{buildshared,deps,hooks,patches,sensor/sensor_ctl/suricata/rules-default,arkime/etc,zeek/bin}'"#.to_string(),
            format!(r#"cp "{}/arkime/patch/"* "${{ROOT?}}/opt/patches/" || true"#, malcolm),
            format!(r#"cp "{}/arkime/etc/"* "${{ROOT?}}/opt/arkime/etc" || true"#, sensor),
            format!(
                r#"cp -r "{}/suricata/rules-default/"* "${{ROOT?}}/opt/sensor/sensor_ctl/suricata/rules-default/" || true"#,
                malcolm
            ),
            r#"cp -r shared/* "${ROOT?}/opt/buildshared""#.to_string(),
            format!(r#"cp -r "{}/interface/"* "${{ROOT?}}/opt/sensor""#, sensor),
            format!(r#"cp -r "{}/shared/bin/"* "${{ROOT?}}/usr/local/bin""#, malcolm),
            format!(r#"cp "{}/scripts/malcolm_utils.py" "${{ROOT?}}/usr/local/bin/""#, malcolm),
            format!(
                r#"cp "{}/config/archives/beats.list.chroot" "${{ROOT?}}/etc/apt/sources.list.d/beats.list""#,
                sensor
            ),
            format!(r#"cp "{}/config/archives/beats.key.chroot" "${{ROOT?}}/etc/apt/keyrings/""#, sensor),
            format!(
                r#"cp "{}/config/archives/fluentbit.list.chroot" "${{ROOT?}}/etc/apt/sources.list.d/fluentbit.list""#,
                sensor
            ),
            format!(r#"cp "{}/config/archives/fluentbit.key.chroot" "${{ROOT?}}/etc/apt/keyrings/""#, sensor),
            format!(r#"cp -r "{}/config/includes.chroot/"* "${{ROOT?}}/""#, sensor),
            r#"rm -r "${ROOT?}/etc/live""#.to_string(),
            format!(r#"cp -r "{}/config/hooks/normal/"* "${{ROOT?}}/opt/hooks/""#, sensor),
            format!(r#"cp -r "{}/config/package-lists/"* "${{ROOT?}}/opt/deps/""#, sensor),
            format!(
                r#"cp -r "{}/docs/images/hedgehog/logo/hedgehog-ascii-text.txt"* "${{ROOT?}}/root/""#,
                malcolm
            ),
        ]
    }

    /// Backports stay disabled; the stanza only documents how to enable them
    pub fn backports_stanza(&self) -> Vec<String> {
        vec![
            String::new(),
            "# Backports are _not_ enabled by default.".to_string(),
            "# Enable them by uncommenting the following line:".to_string(),
            format!(
                "# deb http://deb.debian.org/debian {}-backports main {}",
                self.suite,
                self.firmware_component()
            ),
        ]
    }
}

/// Fill every placeholder of `template` for one variant
pub fn render(template: &str, variant: &RecipeVariant, ctx: &RecipeContext) -> String {
    let hostname = variant.hostname();
    let substitutions: [(&str, &str); 11] = [
        ("__RELEASE__", variant.suite.as_str()),
        ("__ARCH__", variant.arch()),
        ("__FIRMWARE_COMPONENT__", variant.firmware_component()),
        ("__FIRMWARE_COMPONENT_OLD__", variant.firmware_component_old()),
        ("__LINUX_IMAGE__", variant.linux_image()),
        ("__DTB__", variant.dtb()),
        ("__WIRELESS_FIRMWARE__", variant.wireless_firmware()),
        ("__BLUETOOTH_FIRMWARE__", variant.bluetooth_firmware()),
        ("__SERIAL_CONSOLE__", variant.serial_console()),
        ("__HOST__", hostname.as_str()),
        ("__BUILDTIME__", ctx.buildtime.as_str()),
    ];

    let mut text = template.to_string();
    for (token, value) in substitutions {
        text = text.replace(token, value);
    }

    let text = align_replace(&text, "__EXTRA_ROOT_SHELL_CMDS__", &variant.extra_root_shell_cmds(ctx));
    let text = align_replace(&text, "__EXTRA_CHROOT_SHELL_CMDS__", &variant.extra_chroot_shell_cmds());
    let text = align_replace(&text, "__BACKPORTS__", &variant.backports_stanza());
    drop_empty_lines(&text)
}

/// Replace the first indented line starting with `token` by `replacement`,
/// each line carrying that line's indentation. Output ends with a newline.
pub fn align_replace(text: &str, token: &str, replacement: &[String]) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    let found = lines.iter().enumerate().find_map(|(i, line)| {
        let rest = line.trim_start();
        let indent = &line[..line.len() - rest.len()];
        (!indent.is_empty() && rest.starts_with(token)).then(|| (i, indent.to_string()))
    });

    if let Some((i, indent)) = found {
        let block = replacement.iter().map(|r| format!("{}{}", indent, r));
        lines.splice(i..=i, block);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Drop whitespace-only lines and indented list markers with no item.
/// Truly empty lines are kept.
pub fn drop_empty_lines(text: &str) -> String {
    let kept: Vec<&str> = text.lines().filter(|line| !is_blank_placeholder(line)).collect();
    let mut out = kept.join("\n");
    out.push('\n');
    out
}

fn is_blank_placeholder(line: &str) -> bool {
    let rest = line.trim_start();
    if rest.len() == line.len() {
        return false;
    }
    rest.is_empty() || rest.trim_end() == "-"
}

/// Render `<template_dir>/raspi_master.yaml` (or `template`) into
/// `<output_dir>/raspi_<v>_<suite>.yaml`
pub fn generate(
    variant: &RecipeVariant,
    ctx: &RecipeContext,
    template: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let master = std::fs::read_to_string(template)
        .with_context(|| format!("Failed to read {}", template.display()))?;
    let target = output_dir.join(variant.output_name());
    std::fs::write(&target, render(&master, variant, ctx))
        .with_context(|| format!("Failed to write {}", target.display()))?;
    tracing::info!("Wrote {}", target.display());
    Ok(target)
}
