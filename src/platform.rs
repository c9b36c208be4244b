// src/platform.rs

//! Host platform facts and provisioning preconditions
//!
//! Everything the rest of the crate needs to know about the machine is
//! collected here once, at startup, and passed down as plain data. Detection
//! never fails; the precondition checks decide what is fatal.

use crate::{Error, Result};
use std::env;
use std::fs;

/// Kernel release signature of a WSL2 guest
pub const WSL_KERNEL_PATTERN: &str = "*-microsoft-standard-WSL2";

/// Facts about the running distribution and kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    /// Distribution identifier (`ID` in os-release)
    pub id: String,
    /// Space-separated parent distributions (`ID_LIKE`)
    pub id_like: String,
    /// Release codename (`VERSION_CODENAME`)
    pub codename: String,
    /// Release number (`VERSION_ID`)
    pub release: String,
    /// Kernel release string
    pub kernel: String,
}

impl OsInfo {
    /// Collect facts from the current system
    pub fn from_current_system() -> Self {
        let os_release = fs::read_to_string("/etc/os-release").unwrap_or_default();
        let kernel = fs::read_to_string("/proc/sys/kernel/osrelease")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self::from_parts(&os_release, kernel)
    }

    /// Build facts from an os-release document and a kernel release string
    pub fn from_parts(os_release: &str, kernel: String) -> Self {
        Self {
            id: os_release_value(os_release, "ID").unwrap_or_else(|| "unknown".to_string()),
            id_like: os_release_value(os_release, "ID_LIKE").unwrap_or_default(),
            codename: os_release_value(os_release, "VERSION_CODENAME")
                .unwrap_or_else(|| "unknown".to_string()),
            release: os_release_value(os_release, "VERSION_ID")
                .unwrap_or_else(|| "unknown".to_string()),
            kernel,
        }
    }

    /// True when the distribution uses apt for package management
    pub fn is_apt_based(&self) -> bool {
        if self.id == "debian" || self.id == "ubuntu" {
            return true;
        }
        self.id_like
            .split_whitespace()
            .any(|parent| parent == "debian" || parent == "ubuntu")
    }
}

/// Extract a single `KEY=value` entry from an os-release document
fn os_release_value(content: &str, key: &str) -> Option<String> {
    for line in content.lines() {
        if let Some(value) = line.strip_prefix(key)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// True when a kernel release string identifies a WSL2 guest
pub fn is_wsl_kernel(kernel: &str) -> bool {
    glob::Pattern::new(WSL_KERNEL_PATTERN)
        .map(|pattern| pattern.matches(kernel))
        .unwrap_or(false)
}

/// Fail unless running with root privileges
pub fn ensure_root() -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(Error::PrivilegeRequired)
    }
}

/// Fail unless the detected distribution is apt-based
pub fn ensure_supported(os: &OsInfo) -> Result<()> {
    if os.is_apt_based() {
        Ok(())
    } else {
        Err(Error::UnsupportedPlatform(format!(
            "{} is not an apt-based distribution",
            os.id
        )))
    }
}

/// Name of the user who invoked the tool, looking through sudo
pub fn invoking_user() -> Option<String> {
    env::var("SUDO_USER")
        .ok()
        .filter(|u| !u.is_empty())
        .or_else(|| env::var("USER").ok().filter(|u| !u.is_empty()))
}
