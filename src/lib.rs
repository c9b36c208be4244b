// src/lib.rs

//! Outfit System Provisioner
//!
//! Declarative provisioning for apt-based systems: a single JSON document
//! describes repositories, signing keys and the wanted package set, and a
//! run reconciles the machine against it.
//!
//! # Architecture
//!
//! - Environment facts: host inspection plus overrides resolve to a fixed
//!   variable set (codename, release, desktop, virtualized, ...)
//! - URI templates: source and key locations may reference variables and
//!   derive values from them
//! - Catalog: repository definitions grouped into `.list` files, signing
//!   keys and the requested package union
//! - Reconciliation: five ordered phases, each mutating phase committing
//!   exactly one grouped transaction against the package cache

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
mod error;
pub mod fetch;
pub mod keys;
pub mod platform;
pub mod reconcile;
pub mod sources;
pub mod uri;
pub mod vars;
pub mod wslconf;

pub use cache::{AptCache, DryRunCache, MemoryCache, PackageCache, PackageState, Transaction};
pub use catalog::Catalog;
pub use config::{Config, parse_config_file, parse_config_string};
pub use error::{Error, Result};
pub use platform::OsInfo;
pub use reconcile::{Phase, ReconcileReport, Reconciler, RepositoryWriter};
pub use sources::{AptLayout, SystemWriter};
pub use vars::VariableSet;
pub use wslconf::WslConfig;
