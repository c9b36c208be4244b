// src/catalog.rs

//! Repository catalog construction
//!
//! The catalog is pure data: named source entries resolved against the
//! variable set, grouped under their output list file, plus the signing-key
//! map and the union of declared package names. Writing any of it to disk
//! belongs to the writer collaborators.

use crate::config::SourceMap;
use crate::uri;
use crate::vars::VariableSet;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Packages always provisioned inside the virtualization layer
const WSL_PACKAGES: [&str; 2] = ["wsl", "ubuntu-wsl"];

/// Output group subject to the mirror override under the virtualization layer
const CUDA_GROUP: &str = "cuda";

/// NVIDIA serves WSL guests from a dedicated mirror; the regional endpoints
/// declared in the config are substituted wholesale. Not user-configurable.
const WSL_CUDA_URI: &str =
    "https://developer.download.nvidia.com/compute/cuda/repos/wsl-ubuntu/x86_64";
const WSL_CUDA_KEY_URI: &str =
    "https://developer.download.nvidia.com/compute/cuda/repos/wsl-ubuntu/x86_64/3bf863cc.pub";

/// A structured deb source with resolved URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub uri: String,
    /// Ordered distribution names, one deb line each
    pub dists: Vec<String>,
    pub components: BTreeSet<String>,
    /// Empty means all architectures
    pub architectures: BTreeSet<String>,
}

/// A remote list whose payload is spliced into the group file verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteListEntry {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    Repo(RepoEntry),
    RemoteList(RemoteListEntry),
}

/// Fully resolved repository catalog for one provisioning run
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Output group name to ordered (source name, entry) pairs
    pub groups: BTreeMap<String, Vec<(String, CatalogEntry)>>,
    /// Source name to resolved signing-key URI
    pub keys: BTreeMap<String, String>,
    /// Union of declared package names across all sources
    pub packages: BTreeSet<String>,
}

impl Catalog {
    /// Assemble the catalog from declared sources and the variable set
    pub fn build(apt: &SourceMap, vars: &VariableSet) -> Result<Self> {
        let mut catalog = Catalog::default();

        for (name, source) in apt.iter() {
            if let Some(key_spec) = &source.key {
                if catalog.keys.contains_key(name) {
                    return Err(Error::DuplicateKey(name.clone()));
                }
                catalog
                    .keys
                    .insert(name.clone(), uri::resolve(key_spec, vars)?);
            }

            let entry = if let Some(url_spec) = &source.url {
                CatalogEntry::RemoteList(RemoteListEntry {
                    url: uri::resolve(url_spec, vars)?,
                })
            } else if let Some(uri_spec) = &source.uri {
                let dists = match (&source.dists, &source.dist_suffices) {
                    (Some(dists), _) => dists.clone(),
                    (None, Some(suffices)) => suffices
                        .iter()
                        .map(|suffix| format!("{}{}", vars.codename, suffix))
                        .collect(),
                    (None, None) => vec![vars.codename.clone()],
                };
                CatalogEntry::Repo(RepoEntry {
                    uri: uri::resolve(uri_spec, vars)?,
                    dists,
                    components: source
                        .components
                        .clone()
                        .map(BTreeSet::from_iter)
                        .unwrap_or_else(|| BTreeSet::from(["main".to_string()])),
                    architectures: source
                        .architectures
                        .clone()
                        .map(BTreeSet::from_iter)
                        .unwrap_or_default(),
                })
            } else {
                // Config validation rejects this before catalog construction
                return Err(Error::Config(format!(
                    "source '{name}' declares neither 'uri' nor 'url'"
                )));
            };

            let output = source.output.clone().unwrap_or_else(|| name.clone());
            let group = catalog.groups.entry(output).or_default();
            match group.iter_mut().find(|slot| slot.0 == *name) {
                Some(slot) => slot.1 = entry,
                None => group.push((name.clone(), entry)),
            }

            catalog.packages.extend(source.packages.iter().cloned());
        }

        if vars.virtualized {
            catalog
                .packages
                .extend(WSL_PACKAGES.iter().map(|p| p.to_string()));

            if let Some(group) = catalog.groups.get_mut(CUDA_GROUP) {
                for (name, entry) in group.iter_mut() {
                    if let CatalogEntry::Repo(repo) = entry {
                        repo.uri = WSL_CUDA_URI.to_string();
                    }
                    if let Some(key) = catalog.keys.get_mut(name) {
                        *key = WSL_CUDA_KEY_URI.to_string();
                    }
                }
            }
        }

        Ok(catalog)
    }
}
