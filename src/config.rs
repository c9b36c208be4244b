// src/config.rs

//! Declarative configuration document
//!
//! The document is JSON with three top-level keys: `variables` (optional
//! overrides), `apt` (required mapping of source name to source definition)
//! and `wsl` (optional virtualization config overrides). Parsing validates
//! the whole document before anything touches the system.

use crate::uri::UriSpec;
use crate::vars::VarOverrides;
use crate::wslconf::WslOverrides;
use crate::{Error, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;

/// Parsed configuration document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub variables: VarOverrides,
    pub apt: SourceMap,
    #[serde(default)]
    pub wsl: WslOverrides,
}

/// One declared package source
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Base URI of a structured deb source
    pub uri: Option<UriSpec>,
    /// Ready-made repository list to fetch and splice verbatim
    pub url: Option<UriSpec>,
    /// Explicit distribution list; takes precedence over suffixes
    pub dists: Option<Vec<String>>,
    /// Suffixes appended to the codename when `dists` is absent
    pub dist_suffices: Option<Vec<String>>,
    pub components: Option<Vec<String>>,
    pub architectures: Option<Vec<String>>,
    /// Signing key to fetch for this source
    pub key: Option<UriSpec>,
    pub packages: Vec<String>,
    /// List file this source is grouped into; defaults to the source name
    pub output: Option<String>,
}

/// Declared sources in document order
///
/// A plain map would silently drop a repeated source name; catalog
/// construction needs to see repeats to reject duplicate key declarations,
/// and rendered list files must follow the document's order.
#[derive(Debug, Clone, Default)]
pub struct SourceMap(pub Vec<(String, SourceConfig)>);

impl SourceMap {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceConfig)> {
        self.0.iter().map(|(name, source)| (name, source))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SourceMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SourceMapVisitor;

        impl<'de> Visitor<'de> for SourceMapVisitor {
            type Value = SourceMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of source name to source definition")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, source)) = map.next_entry::<String, SourceConfig>()? {
                    entries.push((name, source));
                }
                Ok(SourceMap(entries))
            }
        }

        deserializer.deserialize_map(SourceMapVisitor)
    }
}

impl Config {
    /// Semantic checks that serde's shape validation cannot express
    pub fn validate(&self) -> Result<()> {
        for (name, source) in self.apt.iter() {
            match (&source.uri, &source.url) {
                (Some(_), Some(_)) => {
                    return Err(Error::Config(format!(
                        "source '{name}' declares both 'uri' and 'url'"
                    )));
                }
                (None, None) => {
                    return Err(Error::Config(format!(
                        "source '{name}' declares neither 'uri' nor 'url'"
                    )));
                }
                _ => {}
            }
            if source.url.is_some() {
                let structured = [
                    ("dists", source.dists.is_some()),
                    ("dist_suffices", source.dist_suffices.is_some()),
                    ("components", source.components.is_some()),
                    ("architectures", source.architectures.is_some()),
                ];
                if let Some((field, _)) = structured.iter().find(|(_, present)| *present) {
                    return Err(Error::Config(format!(
                        "source '{name}' is a remote list and cannot declare '{field}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse and validate a configuration document from a string
pub fn parse_config_string(content: &str) -> Result<Config> {
    let config: Config = serde_json::from_str(content)
        .map_err(|e| Error::Config(format!("invalid configuration document: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a configuration document from a file
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    parse_config_string(&content)
}
