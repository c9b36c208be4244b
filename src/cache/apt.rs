// src/cache/apt.rs

//! Apt-backed package cache
//!
//! Drives the system cache through `apt-get`, `apt-cache`, `apt-mark` and
//! `dpkg-query`. Queries run with captured output; state-changing commands
//! run non-interactively with a timeout and only their diagnostics captured.
//! Install marks always resolve dependencies, `apt-get install` has no
//! per-package switch for that.

use std::collections::BTreeSet;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, info};
use wait_timeout::ChildExt;

use crate::cache::{MarkSet, PackageCache, PackageState};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

const DPKG_STATUS_QUERY: &[&str] = &["-W", r"-f=${Package}\t${Status}\n"];

pub struct AptCache {
    timeout: Duration,
}

impl AptCache {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a read-only query and capture its stdout
    fn query(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("Querying {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Transaction(format!(
                "{program} {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a state-changing command; bulk progress output is discarded
    fn mutate(&self, program: &str, args: &[&str]) -> Result<()> {
        info!("Running {} {}", program, args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let Some(status) = child.wait_timeout(self.timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Transaction(format!(
                "{program} {} timed out after {}s",
                args.first().copied().unwrap_or_default(),
                self.timeout.as_secs()
            )));
        };

        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!("[{}] {}", program, line);
        }
        if !status.success() {
            return Err(Error::Transaction(format!(
                "{program} {} failed with {}: {}",
                args.join(" "),
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn installed_set(&self) -> Result<BTreeSet<String>> {
        Ok(parse_installed(&self.query("dpkg-query", DPKG_STATUS_QUERY)?))
    }
}

impl Default for AptCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageCache for AptCache {
    fn reinitialize(&mut self) -> Result<()> {
        self.mutate("apt-get", &["update"])
    }

    fn packages(&self) -> Result<Vec<PackageState>> {
        let names = self.query("apt-cache", &["pkgnames"])?;
        let status = self.query("dpkg-query", DPKG_STATUS_QUERY)?;
        let auto = self.query("apt-mark", &["showauto"])?;
        let upgrade_sim = self.query("apt-get", &["-s", "upgrade"])?;
        let autoremove_sim = self.query("apt-get", &["-s", "autoremove"])?;
        Ok(assemble(&names, &status, &auto, &upgrade_sim, &autoremove_sim))
    }

    fn apply(&mut self, marks: &MarkSet) -> Result<()> {
        let installs: Vec<&str> = marks
            .installs
            .iter()
            .filter(|m| !m.reinstall)
            .map(|m| m.name.as_str())
            .collect();
        let reinstalls: Vec<&str> = marks
            .installs
            .iter()
            .filter(|m| m.reinstall)
            .map(|m| m.name.as_str())
            .collect();
        if !installs.is_empty() {
            let mut args = vec!["install", "-y"];
            args.extend(&installs);
            self.mutate("apt-get", &args)?;
        }
        if !reinstalls.is_empty() {
            let mut args = vec!["install", "-y", "--reinstall"];
            args.extend(&reinstalls);
            self.mutate("apt-get", &args)?;
        }

        if !marks.autos.is_empty() {
            // dpkg only stores the automatic flag for installed packages.
            let installed = self.installed_set()?;
            let auto: Vec<&str> = marks
                .autos
                .iter()
                .filter(|m| m.auto && installed.contains(&m.name))
                .map(|m| m.name.as_str())
                .collect();
            let manual: Vec<&str> = marks
                .autos
                .iter()
                .filter(|m| !m.auto && installed.contains(&m.name))
                .map(|m| m.name.as_str())
                .collect();
            if !auto.is_empty() {
                let mut args = vec!["auto"];
                args.extend(&auto);
                self.mutate("apt-mark", &args)?;
            }
            if !manual.is_empty() {
                let mut args = vec!["manual"];
                args.extend(&manual);
                self.mutate("apt-mark", &args)?;
            }
        }

        let purges: Vec<&str> = marks
            .deletes
            .iter()
            .filter(|m| m.purge)
            .map(|m| m.name.as_str())
            .collect();
        let removes: Vec<&str> = marks
            .deletes
            .iter()
            .filter(|m| !m.purge)
            .map(|m| m.name.as_str())
            .collect();
        if !purges.is_empty() {
            let mut args = vec!["purge", "-y"];
            args.extend(&purges);
            self.mutate("apt-get", &args)?;
        }
        if !removes.is_empty() {
            let mut args = vec!["remove", "-y"];
            args.extend(&removes);
            self.mutate("apt-get", &args)?;
        }

        if marks.upgrade_all {
            self.mutate("apt-get", &["upgrade", "-y"])?;
        }
        Ok(())
    }
}

/// Parse `dpkg-query -W -f='${Package}\t${Status}\n'` output
fn parse_installed(status: &str) -> BTreeSet<String> {
    status
        .lines()
        .filter_map(|line| {
            let (name, state) = line.split_once('\t')?;
            (state.split_whitespace().next_back() == Some("installed")).then(|| name.to_string())
        })
        .collect()
}

/// Pull package names out of `apt-get -s` action lines such as
/// `Inst curl [7.81.0-1] (7.81.0-2 ...)` or `Remv libfoo [1.2-3]`
fn parse_simulated(prefix: &str, simulation: &str) -> BTreeSet<String> {
    simulation
        .lines()
        .filter_map(|line| line.strip_prefix(prefix))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(ToString::to_string)
        .collect()
}

fn assemble(
    names: &str,
    status: &str,
    auto: &str,
    upgrade_sim: &str,
    autoremove_sim: &str,
) -> Vec<PackageState> {
    let mut table: std::collections::BTreeMap<String, PackageState> = names
        .lines()
        .filter(|name| !name.is_empty())
        .map(|name| (name.to_string(), PackageState::new(name)))
        .collect();

    for name in parse_installed(status) {
        table
            .entry(name.clone())
            .or_insert_with(|| PackageState::new(&name))
            .installed = true;
    }
    for name in auto.lines().filter(|name| !name.is_empty()) {
        if let Some(state) = table.get_mut(name) {
            state.auto_installed = true;
        }
    }
    for name in parse_simulated("Inst ", upgrade_sim) {
        if let Some(state) = table.get_mut(&name) {
            state.upgradable = true;
        }
    }
    for name in parse_simulated("Remv ", autoremove_sim) {
        if let Some(state) = table.get_mut(&name) {
            state.garbage = true;
        }
    }
    table.into_values().collect()
}
