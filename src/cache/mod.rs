// src/cache/mod.rs

//! Package cache binding and grouped transactions
//!
//! The reconciler never talks to apt directly. It sees a narrow
//! [`PackageCache`] interface: a snapshot of per-package facts, a way to
//! refresh index state, and a way to apply one batch of marks atomically.
//! Marks accumulate in a [`Transaction`] handle and reach the cache in a
//! single resolver pass on commit; a handle dropped without commit discards
//! its marks, so every exit path either commits or aborts.

mod apt;
mod memory;

pub use apt::AptCache;
pub use memory::MemoryCache;

use crate::Result;
use tracing::debug;

/// Cache facts about one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageState {
    pub name: String,
    pub installed: bool,
    /// Pulled in as a dependency rather than explicitly requested
    pub auto_installed: bool,
    pub upgradable: bool,
    /// Auto-installed with no remaining manual dependents
    pub garbage: bool,
}

impl PackageState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            installed: false,
            auto_installed: false,
            upgradable: false,
            garbage: false,
        }
    }
}

/// Requested installation of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallMark {
    pub name: String,
    /// Let the resolver pull in dependencies
    pub auto_deps: bool,
    /// Reinstall even when already satisfied
    pub reinstall: bool,
}

/// Requested change of one package's automatic flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoMark {
    pub name: String,
    pub auto: bool,
}

/// Requested removal of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMark {
    pub name: String,
    /// Drop configuration files as well
    pub purge: bool,
}

/// One grouped batch of marks, applied as a single resolver pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSet {
    pub installs: Vec<InstallMark>,
    pub autos: Vec<AutoMark>,
    pub deletes: Vec<DeleteMark>,
    /// Request a full safe upgrade of everything upgradable
    pub upgrade_all: bool,
}

impl MarkSet {
    pub fn is_empty(&self) -> bool {
        self.installs.is_empty()
            && self.autos.is_empty()
            && self.deletes.is_empty()
            && !self.upgrade_all
    }
}

/// Narrow interface over the system package cache
pub trait PackageCache {
    /// Refresh package index state; mutates no package
    fn reinitialize(&mut self) -> Result<()>;

    /// Snapshot of every package known to the cache
    fn packages(&self) -> Result<Vec<PackageState>>;

    /// Apply one grouped batch; either fully applies or fails
    fn apply(&mut self, marks: &MarkSet) -> Result<()>;
}

/// Grouped transaction handle over a package cache
///
/// Committing consumes the handle and hands the accumulated marks to the
/// cache in one batch. Dropping without commit discards the marks.
pub struct Transaction<'a, C: PackageCache + ?Sized> {
    cache: &'a mut C,
    marks: MarkSet,
    committed: bool,
}

impl<'a, C: PackageCache + ?Sized> Transaction<'a, C> {
    /// Open a transaction; marks accumulate until commit
    pub fn begin(cache: &'a mut C) -> Self {
        Self {
            cache,
            marks: MarkSet::default(),
            committed: false,
        }
    }

    pub fn mark_install(&mut self, name: &str, auto_deps: bool, reinstall: bool) {
        self.marks.installs.push(InstallMark {
            name: name.to_string(),
            auto_deps,
            reinstall,
        });
    }

    pub fn mark_auto(&mut self, name: &str, auto: bool) {
        self.marks.autos.push(AutoMark {
            name: name.to_string(),
            auto,
        });
    }

    pub fn mark_delete(&mut self, name: &str, purge: bool) {
        self.marks.deletes.push(DeleteMark {
            name: name.to_string(),
            purge,
        });
    }

    pub fn request_upgrade(&mut self) {
        self.marks.upgrade_all = true;
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Apply every accumulated mark in one resolver pass
    pub fn commit(mut self) -> Result<()> {
        let marks = std::mem::take(&mut self.marks);
        self.committed = true;
        self.cache.apply(&marks)
    }

    /// Discard every accumulated mark
    pub fn abort(mut self) {
        self.committed = true;
        let discarded = std::mem::take(&mut self.marks);
        debug!(
            "Transaction aborted, {} install / {} auto / {} delete marks discarded",
            discarded.installs.len(),
            discarded.autos.len(),
            discarded.deletes.len()
        );
    }
}

impl<C: PackageCache + ?Sized> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if !self.committed && !self.marks.is_empty() {
            debug!(
                "Transaction dropped without commit, {} marks discarded",
                self.marks.installs.len() + self.marks.autos.len() + self.marks.deletes.len()
            );
        }
    }
}

/// Read-through wrapper that records committed batches instead of applying
/// them. Queries still hit the wrapped cache, so a dry run reports against
/// real package facts.
pub struct DryRunCache<C: PackageCache> {
    inner: C,
    committed: Vec<MarkSet>,
}

impl<C: PackageCache> DryRunCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            committed: Vec::new(),
        }
    }

    pub fn committed(&self) -> &[MarkSet] {
        &self.committed
    }
}

impl<C: PackageCache> PackageCache for DryRunCache<C> {
    fn reinitialize(&mut self) -> Result<()> {
        debug!("Dry run, skipping index refresh");
        Ok(())
    }

    fn packages(&self) -> Result<Vec<PackageState>> {
        self.inner.packages()
    }

    fn apply(&mut self, marks: &MarkSet) -> Result<()> {
        self.committed.push(marks.clone());
        Ok(())
    }
}
