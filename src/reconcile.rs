// src/reconcile.rs

//! Five-phase package reconciliation
//!
//! A run moves the system through Prune, Initialize, Install, AutoRemove and
//! Upgrade, in that order. Each mutating phase accumulates its marks into one
//! grouped transaction and commits it as a single batch; a rejected commit
//! aborts the whole run. Requested packages that no configured repository
//! provides are collected and reported, never fatal.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::Result;
use crate::cache::{PackageCache, Transaction};
use crate::catalog::Catalog;
use crate::vars::VariableSet;

/// Completed reconciliation phases, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pruned,
    Initialized,
    Installed,
    AutoRemoved,
    Upgraded,
}

/// Repository state writer invoked during the prune phase
pub trait RepositoryWriter {
    /// Clear existing repository definitions, keys and pins
    fn reset(&mut self) -> Result<()>;

    /// Write signing keys and source lists for a resolved catalog
    fn materialize(&mut self, catalog: &Catalog) -> Result<()>;
}

/// Writer that counts calls without touching the filesystem
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub resets: usize,
    pub materializations: usize,
}

impl RepositoryWriter for RecordingWriter {
    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        Ok(())
    }

    fn materialize(&mut self, _catalog: &Catalog) -> Result<()> {
        self.materializations += 1;
        Ok(())
    }
}

/// Outcome of a full reconciliation run
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Requested packages unknown to every configured repository
    pub missing: BTreeSet<String>,
    /// Phases completed, in order
    pub phases: Vec<Phase>,
    /// Packages marked for installation
    pub installed: usize,
    /// Orphaned packages removed
    pub removed: usize,
}

pub struct Reconciler<'a, C: PackageCache + ?Sized> {
    vars: &'a VariableSet,
    cache: &'a mut C,
}

impl<'a, C: PackageCache + ?Sized> Reconciler<'a, C> {
    pub fn new(vars: &'a VariableSet, cache: &'a mut C) -> Self {
        Self { vars, cache }
    }

    /// Drive every phase in order; the first error aborts the run
    pub fn run(
        mut self,
        catalog: &Catalog,
        writer: &mut dyn RepositoryWriter,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        self.prune(catalog, writer)?;
        report.phases.push(Phase::Pruned);

        self.initialize()?;
        report.phases.push(Phase::Initialized);

        self.install(catalog, &mut report)?;
        report.phases.push(Phase::Installed);

        self.autoremove(&mut report)?;
        report.phases.push(Phase::AutoRemoved);

        self.upgrade()?;
        report.phases.push(Phase::Upgraded);

        Ok(report)
    }

    fn prune(&mut self, catalog: &Catalog, writer: &mut dyn RepositoryWriter) -> Result<()> {
        if self.vars.prune {
            info!("Resetting repository definitions");
            writer.reset()?;
        } else {
            debug!("Pruning disabled, keeping existing repository definitions");
        }
        writer.materialize(catalog)
    }

    fn initialize(&mut self) -> Result<()> {
        info!("Refreshing package index");
        self.cache.reinitialize()
    }

    /// Mark every requested package for installation and everything else as
    /// automatically installed, then commit the lot in one pass
    fn install(&mut self, catalog: &Catalog, report: &mut ReconcileReport) -> Result<()> {
        let mut requested: BTreeSet<String> = catalog.packages.clone();
        let snapshot = self.cache.packages()?;
        info!(
            "Reconciling {} requested packages against {} known",
            requested.len(),
            snapshot.len()
        );

        let mut tx = Transaction::begin(&mut *self.cache);
        for package in &snapshot {
            if requested.remove(&package.name) {
                tx.mark_install(&package.name, true, true);
                tx.mark_auto(&package.name, false);
                report.installed += 1;
            } else {
                tx.mark_auto(&package.name, true);
            }
        }
        tx.commit()?;

        if !requested.is_empty() {
            warn!(
                "{} requested packages are unknown to the configured repositories",
                requested.len()
            );
        }
        report.missing = requested;
        Ok(())
    }

    fn autoremove(&mut self, report: &mut ReconcileReport) -> Result<()> {
        if !self.vars.autoremove {
            debug!("Autoremoval disabled, skipping");
            return Ok(());
        }
        let garbage: Vec<String> = self
            .cache
            .packages()?
            .into_iter()
            .filter(|package| package.garbage)
            .map(|package| package.name)
            .collect();
        info!("Removing {} orphaned packages", garbage.len());

        let mut tx = Transaction::begin(&mut *self.cache);
        for name in &garbage {
            tx.mark_delete(name, true);
        }
        report.removed = garbage.len();
        tx.commit()
    }

    fn upgrade(&mut self) -> Result<()> {
        if !self.vars.upgrade {
            debug!("Upgrades disabled, skipping");
            return Ok(());
        }
        info!("Upgrading installed packages");
        let mut tx = Transaction::begin(&mut *self.cache);
        tx.request_upgrade();
        tx.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, PackageState};

    fn test_vars() -> VariableSet {
        VariableSet {
            codename: "focal".to_string(),
            release: "20.04".to_string(),
            desktop: false,
            virtualized: false,
            prune: true,
            autoremove: true,
            upgrade: true,
            max_download_size: f64::INFINITY,
            max_install_size: f64::INFINITY,
        }
    }

    fn catalog_with_packages(names: &[&str]) -> Catalog {
        Catalog {
            packages: names.iter().map(ToString::to_string).collect(),
            ..Catalog::default()
        }
    }

    fn seeded_cache() -> MemoryCache {
        MemoryCache::with_packages([
            PackageState::new("curl"),
            PackageState::new("git"),
            PackageState {
                installed: true,
                auto_installed: true,
                garbage: true,
                ..PackageState::new("libobsolete")
            },
            PackageState {
                installed: true,
                upgradable: true,
                ..PackageState::new("vim")
            },
        ])
    }

    #[test]
    fn test_requested_packages_marked_manual_rest_auto() {
        let vars = test_vars();
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();
        let catalog = catalog_with_packages(&["curl", "git", "nonexistent"]);

        let report = Reconciler::new(&vars, &mut cache)
            .run(&catalog, &mut writer)
            .unwrap();

        assert!(cache.package("curl").unwrap().installed);
        assert!(!cache.package("curl").unwrap().auto_installed);
        assert!(cache.package("git").unwrap().installed);
        assert!(cache.package("vim").unwrap().auto_installed);
        assert_eq!(report.installed, 2);
        assert_eq!(
            report.missing,
            BTreeSet::from(["nonexistent".to_string()])
        );
    }

    #[test]
    fn test_missing_packages_are_not_fatal() {
        let vars = test_vars();
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();
        let catalog = catalog_with_packages(&["ghost-one", "ghost-two"]);

        let report = Reconciler::new(&vars, &mut cache)
            .run(&catalog, &mut writer)
            .unwrap();

        assert_eq!(report.missing.len(), 2);
        assert_eq!(report.phases.len(), 5);
    }

    #[test]
    fn test_one_transaction_per_mutating_phase() {
        let vars = test_vars();
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();
        let catalog = catalog_with_packages(&["curl"]);

        Reconciler::new(&vars, &mut cache)
            .run(&catalog, &mut writer)
            .unwrap();

        assert_eq!(cache.committed().len(), 3);
        assert!(!cache.committed()[0].installs.is_empty());
        assert!(!cache.committed()[1].deletes.is_empty());
        assert!(cache.committed()[2].upgrade_all);
        assert_eq!(cache.reinitializations(), 1);
    }

    #[test]
    fn test_autoremove_disabled_opens_no_transaction() {
        let mut vars = test_vars();
        vars.autoremove = false;
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();

        let report = Reconciler::new(&vars, &mut cache)
            .run(&catalog_with_packages(&[]), &mut writer)
            .unwrap();

        assert_eq!(cache.committed().len(), 2);
        assert!(cache.committed().iter().all(|batch| batch.deletes.is_empty()));
        assert!(cache.package("libobsolete").unwrap().installed);
        assert_eq!(report.removed, 0);
        assert_eq!(report.phases.len(), 5);
    }

    #[test]
    fn test_upgrade_disabled_leaves_upgradable_packages() {
        let mut vars = test_vars();
        vars.upgrade = false;
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();

        Reconciler::new(&vars, &mut cache)
            .run(&catalog_with_packages(&[]), &mut writer)
            .unwrap();

        assert!(cache.committed().iter().all(|batch| !batch.upgrade_all));
        assert!(cache.package("vim").unwrap().upgradable);
    }

    #[test]
    fn test_prune_disabled_still_materializes() {
        let mut vars = test_vars();
        vars.prune = false;
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();

        Reconciler::new(&vars, &mut cache)
            .run(&catalog_with_packages(&[]), &mut writer)
            .unwrap();

        assert_eq!(writer.resets, 0);
        assert_eq!(writer.materializations, 1);
    }

    #[test]
    fn test_prune_enabled_resets_then_materializes() {
        let vars = test_vars();
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();

        Reconciler::new(&vars, &mut cache)
            .run(&catalog_with_packages(&[]), &mut writer)
            .unwrap();

        assert_eq!(writer.resets, 1);
        assert_eq!(writer.materializations, 1);
    }

    #[test]
    fn test_rejected_commit_aborts_the_run() {
        let vars = test_vars();
        let mut cache = seeded_cache();
        cache.fail_next_commit("held broken packages");
        let mut writer = RecordingWriter::default();

        let err = Reconciler::new(&vars, &mut cache)
            .run(&catalog_with_packages(&["curl"]), &mut writer)
            .unwrap_err();

        assert!(err.to_string().contains("held broken packages"));
        assert!(cache.committed().is_empty());
        assert!(!cache.package("curl").unwrap().installed);
    }

    #[test]
    fn test_phases_complete_in_order() {
        let vars = test_vars();
        let mut cache = seeded_cache();
        let mut writer = RecordingWriter::default();

        let report = Reconciler::new(&vars, &mut cache)
            .run(&catalog_with_packages(&[]), &mut writer)
            .unwrap();

        assert_eq!(
            report.phases,
            vec![
                Phase::Pruned,
                Phase::Initialized,
                Phase::Installed,
                Phase::AutoRemoved,
                Phase::Upgraded,
            ]
        );
    }
}
