// src/commands.rs
//! Command handlers for the outfit CLI

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use std::path::Path;
use tracing::info;

use crate::cache::{AptCache, DryRunCache};
use crate::catalog::Catalog;
use crate::cli::Cli;
use crate::config::parse_config_file;
use crate::platform::{self, OsInfo};
use crate::reconcile::{ReconcileReport, Reconciler, RecordingWriter};
use crate::sources::{AptLayout, SystemWriter, preview_lists};
use crate::vars::VariableSet;
use crate::wslconf::WslConfig;

/// Reconcile the system against the configuration file
pub fn cmd_apply(config_path: &str, root: &str, simulate: bool) -> Result<()> {
    let config = parse_config_file(Path::new(config_path))
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;
    let os = OsInfo::from_current_system();
    platform::ensure_supported(&os)?;

    let vars = VariableSet::build(&config.variables, &os)?;
    let catalog = Catalog::build(&config.apt, &vars)?;
    info!(
        "Resolved {} source groups, {} signing keys, {} requested packages",
        catalog.groups.len(),
        catalog.keys.len(),
        catalog.packages.len()
    );

    if simulate {
        let mut cache = DryRunCache::new(AptCache::new());
        let mut writer = RecordingWriter::default();
        let report = Reconciler::new(&vars, &mut cache).run(&catalog, &mut writer)?;
        report_missing(&report);
        println!(
            "Simulation: {} packages would be marked for install, {} orphans would be removed",
            report.installed, report.removed
        );
        return Ok(());
    }

    let layout = AptLayout::new(root);
    if layout.is_live_root() {
        platform::ensure_root()?;
    }
    let mut writer = SystemWriter::new(layout.clone())?;
    let mut cache = AptCache::new();
    let report = Reconciler::new(&vars, &mut cache).run(&catalog, &mut writer)?;

    if vars.virtualized {
        let user = platform::invoking_user().unwrap_or_else(|| "root".to_string());
        let mut wsl = WslConfig::for_user(user);
        wsl.apply(&config.wsl);
        wsl.write(&layout)?;
    }

    report_missing(&report);
    println!(
        "Provisioning complete: {} packages requested, {} orphans removed",
        report.installed, report.removed
    );
    Ok(())
}

/// Resolve the configuration and print the catalog it produces
pub fn cmd_render(config_path: &str) -> Result<()> {
    let config = parse_config_file(Path::new(config_path))
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;
    let os = OsInfo::from_current_system();
    let vars = VariableSet::build(&config.variables, &os)?;
    let catalog = Catalog::build(&config.apt, &vars)?;

    println!("# Variables");
    println!("{}", serde_json::to_string_pretty(&vars)?);
    println!();

    for (group, body) in preview_lists(&catalog) {
        println!("# sources.list.d/{group}.list");
        print!("{body}");
        println!();
    }

    if !catalog.keys.is_empty() {
        println!("# Signing keys");
        for (name, uri) in &catalog.keys {
            println!("{name}: {uri}");
        }
        println!();
    }

    println!("# Packages");
    for name in &catalog.packages {
        println!("{name}");
    }
    Ok(())
}

/// Generate shell completions on stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "outfit", &mut std::io::stdout());
    Ok(())
}

fn report_missing(report: &ReconcileReport) {
    if report.missing.is_empty() {
        return;
    }
    eprintln!("The following missing packages were ignored:");
    for name in &report.missing {
        eprintln!("  * {name}");
    }
}
