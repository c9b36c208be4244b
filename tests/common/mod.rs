// tests/common/mod.rs

//! Shared fixtures for provisioning integration tests.

use outfit::config::Config;
use outfit::{Catalog, OsInfo, VariableSet};

pub const FOCAL_OS_RELEASE: &str = "NAME=\"Ubuntu\"\n\
    ID=ubuntu\n\
    ID_LIKE=debian\n\
    VERSION_ID=\"20.04\"\n\
    VERSION_CODENAME=focal\n";

pub const HOST_KERNEL: &str = "5.15.0-89-generic";
pub const WSL_KERNEL: &str = "5.15.90.1-microsoft-standard-WSL2";

/// Ubuntu focal on bare metal
pub fn focal_host() -> OsInfo {
    OsInfo::from_parts(FOCAL_OS_RELEASE, HOST_KERNEL.to_string())
}

/// Ubuntu focal under WSL2
pub fn wsl_host() -> OsInfo {
    OsInfo::from_parts(FOCAL_OS_RELEASE, WSL_KERNEL.to_string())
}

/// Parse a configuration document and resolve it against a host
pub fn resolve(config: &str, os: &OsInfo) -> (Config, VariableSet, Catalog) {
    let config = outfit::parse_config_string(config).expect("configuration should parse");
    let vars = VariableSet::build(&config.variables, os).expect("variables should resolve");
    let catalog = Catalog::build(&config.apt, &vars).expect("catalog should resolve");
    (config, vars, catalog)
}
