// src/cache/memory.rs

//! In-memory package cache
//!
//! Deterministic stand-in for the apt backend. Used by `--simulate` runs and
//! the test suite: it applies marks to an in-memory package table and keeps
//! every committed batch for inspection.

use std::collections::BTreeMap;

use crate::cache::{MarkSet, PackageCache, PackageState};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryCache {
    packages: BTreeMap<String, PackageState>,
    committed: Vec<MarkSet>,
    reinitializations: usize,
    fail_next_commit: Option<String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages(packages: impl IntoIterator<Item = PackageState>) -> Self {
        let mut cache = Self::new();
        for state in packages {
            cache.insert(state);
        }
        cache
    }

    pub fn insert(&mut self, state: PackageState) {
        self.packages.insert(state.name.clone(), state);
    }

    pub fn package(&self, name: &str) -> Option<&PackageState> {
        self.packages.get(name)
    }

    /// Every batch committed so far, oldest first
    pub fn committed(&self) -> &[MarkSet] {
        &self.committed
    }

    pub fn reinitializations(&self) -> usize {
        self.reinitializations
    }

    /// Make the next commit fail with a resolver-style message
    pub fn fail_next_commit(&mut self, reason: &str) {
        self.fail_next_commit = Some(reason.to_string());
    }
}

impl PackageCache for MemoryCache {
    fn reinitialize(&mut self) -> Result<()> {
        self.reinitializations += 1;
        Ok(())
    }

    fn packages(&self) -> Result<Vec<PackageState>> {
        Ok(self.packages.values().cloned().collect())
    }

    fn apply(&mut self, marks: &MarkSet) -> Result<()> {
        if let Some(reason) = self.fail_next_commit.take() {
            return Err(Error::Transaction(reason));
        }

        for mark in &marks.installs {
            let state = self
                .packages
                .get_mut(&mark.name)
                .ok_or_else(|| Error::Transaction(format!("unable to locate package {}", mark.name)))?;
            state.installed = true;
            state.upgradable = false;
        }
        for mark in &marks.autos {
            // The automatic flag only exists for packages the cache knows.
            if let Some(state) = self.packages.get_mut(&mark.name) {
                state.auto_installed = mark.auto;
            }
        }
        for mark in &marks.deletes {
            if let Some(state) = self.packages.get_mut(&mark.name) {
                state.installed = false;
                state.upgradable = false;
                state.garbage = false;
            }
        }
        if marks.upgrade_all {
            for state in self.packages.values_mut() {
                if state.installed {
                    state.upgradable = false;
                }
            }
        }

        self.committed.push(marks.clone());
        Ok(())
    }
}
