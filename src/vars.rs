// src/vars.rs

//! Resolved environment facts for a provisioning run
//!
//! The variable set layers configuration overrides onto defaults detected
//! from the host. It is constructed once, validated eagerly, and read-only
//! afterwards; the URI resolver and the reconciler both consume it as plain
//! data.

use crate::platform::{is_wsl_kernel, OsInfo};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Unit symbols accepted in structured size specs, by power of 1024
const SIZE_UNITS: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];

/// A size limit from the configuration document
///
/// Either a plain byte count or a `{size, unit}` pair scaled by powers
/// of 1024. A missing or `null` limit means unlimited.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Bytes(f64),
    Scaled { size: f64, unit: String },
}

impl SizeSpec {
    /// Normalize to a byte count
    pub fn to_bytes(&self) -> Result<f64> {
        match self {
            SizeSpec::Bytes(n) => Ok(*n),
            SizeSpec::Scaled { size, unit } => {
                let symbol = unit.to_uppercase();
                let index = SIZE_UNITS
                    .iter()
                    .position(|u| *u == symbol)
                    .ok_or_else(|| Error::Config(format!("unknown size unit '{unit}'")))?;
                Ok(size * 1024f64.powi(index as i32))
            }
        }
    }
}

/// Recognized variable overrides from the `variables` configuration key
///
/// The field list is closed; an unrecognized key fails the parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VarOverrides {
    pub codename: Option<String>,
    pub release: Option<String>,
    pub desktop: Option<bool>,
    pub virtualized: Option<bool>,
    pub prune: Option<bool>,
    pub autoremove: Option<bool>,
    pub upgrade: Option<bool>,
    pub max_download_size: Option<SizeSpec>,
    pub max_install_size: Option<SizeSpec>,
}

/// Environment facts driving a provisioning run
///
/// Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct VariableSet {
    pub codename: String,
    pub release: String,
    pub desktop: bool,
    pub virtualized: bool,
    pub prune: bool,
    pub autoremove: bool,
    pub upgrade: bool,
    pub max_download_size: f64,
    pub max_install_size: f64,
}

impl VariableSet {
    /// Layer overrides onto host-detected defaults and apply consistency rules
    pub fn build(overrides: &VarOverrides, os: &OsInfo) -> Result<Self> {
        let mut virtualized = overrides.virtualized.unwrap_or(true);
        if virtualized && !is_wsl_kernel(&os.kernel) {
            warn!(
                "Kernel '{}' does not match the WSL2 signature, disabling virtualized provisioning",
                os.kernel
            );
            virtualized = false;
        }

        // Desktop environments are unsupported inside the virtualization layer
        let desktop = if virtualized {
            false
        } else {
            overrides.desktop.unwrap_or(false)
        };

        Ok(Self {
            codename: overrides
                .codename
                .clone()
                .unwrap_or_else(|| os.codename.clone()),
            release: overrides
                .release
                .clone()
                .unwrap_or_else(|| os.release.clone()),
            desktop,
            virtualized,
            prune: overrides.prune.unwrap_or(true),
            autoremove: overrides.autoremove.unwrap_or(true),
            upgrade: overrides.upgrade.unwrap_or(true),
            max_download_size: normalize_size(overrides.max_download_size.as_ref())?,
            max_install_size: normalize_size(overrides.max_install_size.as_ref())?,
        })
    }

    /// Look up an attribute by its configuration name, rendered as a string
    ///
    /// This is the lookup surface the URI resolver substitutes from.
    pub fn get(&self, name: &str) -> Option<String> {
        let value = match name {
            "codename" => self.codename.clone(),
            "release" => self.release.clone(),
            "desktop" => self.desktop.to_string(),
            "virtualized" => self.virtualized.to_string(),
            "prune" => self.prune.to_string(),
            "autoremove" => self.autoremove.to_string(),
            "upgrade" => self.upgrade.to_string(),
            "max_download_size" => self.max_download_size.to_string(),
            "max_install_size" => self.max_install_size.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Absent and `null` limits mean unlimited
fn normalize_size(spec: Option<&SizeSpec>) -> Result<f64> {
    match spec {
        None => Ok(f64::INFINITY),
        Some(spec) => spec.to_bytes(),
    }
}
