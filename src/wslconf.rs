// src/wslconf.rs

//! WSL interoperability configuration
//!
//! Virtualized hosts get an `/etc/wsl.conf` rendered from a fixed option set
//! with sensible defaults. The `wsl` configuration section can override any
//! option; unknown sections or options are rejected at parse time.

use serde::Deserialize;
use tracing::info;

use crate::Result;
use crate::sources::AptLayout;

/// Overrides from the `wsl` configuration section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WslOverrides {
    pub automount: AutomountOverrides,
    pub network: NetworkOverrides,
    pub interop: InteropOverrides,
    pub user: UserOverrides,
    pub wsl2: Wsl2Overrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutomountOverrides {
    pub enabled: Option<bool>,
    #[serde(rename = "mountFsTab")]
    pub mount_fs_tab: Option<bool>,
    pub options: Option<String>,
    pub root: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkOverrides {
    #[serde(rename = "generateHosts")]
    pub generate_hosts: Option<bool>,
    #[serde(rename = "generateResolvConf")]
    pub generate_resolv_conf: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteropOverrides {
    pub enabled: Option<bool>,
    #[serde(rename = "appendWindowsPath")]
    pub append_windows_path: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserOverrides {
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Wsl2Overrides {
    pub guiapplications: Option<bool>,
}

/// Fully resolved wsl.conf contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WslConfig {
    pub automount_enabled: bool,
    pub mount_fs_tab: bool,
    pub automount_options: String,
    pub automount_root: String,
    pub generate_hosts: bool,
    pub generate_resolv_conf: bool,
    pub interop_enabled: bool,
    pub append_windows_path: bool,
    pub default_user: String,
    pub gui_applications: bool,
}

impl WslConfig {
    /// Defaults for a freshly provisioned WSL distribution
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            automount_enabled: true,
            mount_fs_tab: true,
            automount_options: "metadata,umask=0022,fmask=0022,dmask=0022".to_string(),
            automount_root: "/mnt/".to_string(),
            generate_hosts: true,
            generate_resolv_conf: true,
            interop_enabled: true,
            append_windows_path: false,
            default_user: user.into(),
            gui_applications: true,
        }
    }

    pub fn apply(&mut self, overrides: &WslOverrides) {
        if let Some(v) = overrides.automount.enabled {
            self.automount_enabled = v;
        }
        if let Some(v) = overrides.automount.mount_fs_tab {
            self.mount_fs_tab = v;
        }
        if let Some(options) = &overrides.automount.options {
            self.automount_options = options.clone();
        }
        if let Some(root) = &overrides.automount.root {
            self.automount_root = root.clone();
        }
        if let Some(v) = overrides.network.generate_hosts {
            self.generate_hosts = v;
        }
        if let Some(v) = overrides.network.generate_resolv_conf {
            self.generate_resolv_conf = v;
        }
        if let Some(v) = overrides.interop.enabled {
            self.interop_enabled = v;
        }
        if let Some(v) = overrides.interop.append_windows_path {
            self.append_windows_path = v;
        }
        if let Some(user) = &overrides.user.default {
            self.default_user = user.clone();
        }
        if let Some(v) = overrides.wsl2.guiapplications {
            self.gui_applications = v;
        }
    }

    /// Render in wsl.conf INI form, booleans lowercase
    pub fn render(&self) -> String {
        format!(
            "[automount]\n\
             enabled = {}\n\
             mountFsTab = {}\n\
             options = {}\n\
             root = {}\n\
             \n\
             [network]\n\
             generateHosts = {}\n\
             generateResolvConf = {}\n\
             \n\
             [interop]\n\
             enabled = {}\n\
             appendWindowsPath = {}\n\
             \n\
             [user]\n\
             default = {}\n\
             \n\
             [wsl2]\n\
             guiapplications = {}\n",
            self.automount_enabled,
            self.mount_fs_tab,
            self.automount_options,
            self.automount_root,
            self.generate_hosts,
            self.generate_resolv_conf,
            self.interop_enabled,
            self.append_windows_path,
            self.default_user,
            self.gui_applications,
        )
    }

    /// Write `etc/wsl.conf` under the layout root
    pub fn write(&self, layout: &AptLayout) -> Result<()> {
        let path = layout.wsl_conf();
        layout.write_atomic(&path, self.render().as_bytes(), 0o644)?;
        info!("Wrote WSL configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_rendering() {
        let conf = WslConfig::for_user("alice");
        assert_eq!(
            conf.render(),
            "[automount]\n\
             enabled = true\n\
             mountFsTab = true\n\
             options = metadata,umask=0022,fmask=0022,dmask=0022\n\
             root = /mnt/\n\
             \n\
             [network]\n\
             generateHosts = true\n\
             generateResolvConf = true\n\
             \n\
             [interop]\n\
             enabled = true\n\
             appendWindowsPath = false\n\
             \n\
             [user]\n\
             default = alice\n\
             \n\
             [wsl2]\n\
             guiapplications = true\n"
        );
    }

    #[test]
    fn test_overrides_apply() {
        let overrides: WslOverrides = serde_json::from_str(
            r#"{
                "automount": {"enabled": false, "root": "/win/"},
                "interop": {"appendWindowsPath": true},
                "user": {"default": "builder"}
            }"#,
        )
        .unwrap();

        let mut conf = WslConfig::for_user("alice");
        conf.apply(&overrides);

        assert!(!conf.automount_enabled);
        assert_eq!(conf.automount_root, "/win/");
        assert!(conf.append_windows_path);
        assert_eq!(conf.default_user, "builder");
        assert!(conf.mount_fs_tab);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = serde_json::from_str::<WslOverrides>(r#"{"boot": {"systemd": true}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let result =
            serde_json::from_str::<WslOverrides>(r#"{"automount": {"ldconfig": false}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_places_conf_under_root() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        WslConfig::for_user("alice").write(&layout).unwrap();

        let body = fs::read_to_string(layout.wsl_conf()).unwrap();
        assert!(body.starts_with("[automount]\n"));
        assert!(body.contains("default = alice"));
    }
}
