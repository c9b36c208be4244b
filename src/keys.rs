// src/keys.rs

//! Signing key materialization
//!
//! Every configured key URI is fetched, dearmored when the payload is ASCII
//! armored, and installed as `trusted.gpg.d/<name>.gpg`. Keys are independent
//! of each other, so they download in parallel.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info};
use wait_timeout::ChildExt;

use crate::fetch::Fetcher;
use crate::sources::AptLayout;
use crate::{Error, Result};

const GPG_PROGRAM: &str = "gpg";
const GPG_TIMEOUT: Duration = Duration::from_secs(30);
const ARMOR_HEADER: &[u8] = b"-----BEGIN PGP";

pub struct KeyWriter<'a> {
    fetcher: &'a Fetcher,
}

impl<'a> KeyWriter<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch and install every signing key; the first failure wins
    pub fn write_all(&self, layout: &AptLayout, keys: &BTreeMap<String, String>) -> Result<()> {
        keys.par_iter()
            .try_for_each(|(name, uri)| self.write_one(layout, name, uri))
    }

    fn write_one(&self, layout: &AptLayout, name: &str, uri: &str) -> Result<()> {
        info!("Installing signing key {} from {}", name, uri);
        let bytes = self
            .fetcher
            .download_to_bytes(uri)
            .map_err(|e| Error::KeyFetch {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let material = if is_armored(&bytes) {
            debug!("Dearmoring key {}", name);
            dearmor(GPG_PROGRAM, name, &bytes)?
        } else {
            bytes
        };
        layout.write_atomic(&layout.key_path(name), &material, 0o644)
    }
}

/// Keyrings may carry leading whitespace before the armor header
fn is_armored(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(0);
    bytes[start..].starts_with(ARMOR_HEADER)
}

fn dearmor(program: &str, name: &str, armored: &[u8]) -> Result<Vec<u8>> {
    let mut child = Command::new(program)
        .arg("--dearmor")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // gpg streams while it converts; feed stdin and drain stdout on their own
    // threads so neither pipe fills up and wedges the exchange.
    let mut stdin = child.stdin.take();
    let payload = armored.to_vec();
    let feeder = thread::spawn(move || {
        if let Some(stdin) = stdin.as_mut() {
            let _ = stdin.write_all(&payload);
        }
    });
    let mut stdout = child.stdout.take();
    let drainer = thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut material = Vec::new();
        if let Some(stdout) = stdout.as_mut() {
            stdout.read_to_end(&mut material)?;
        }
        Ok(material)
    });

    let Some(status) = child.wait_timeout(GPG_TIMEOUT)? else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(Error::KeyFetch {
            name: name.to_string(),
            reason: format!("gpg --dearmor timed out after {}s", GPG_TIMEOUT.as_secs()),
        });
    };

    let output = child.wait_with_output()?;
    let _ = feeder.join();
    if !status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::KeyFetch {
            name: name.to_string(),
            reason: format!("gpg --dearmor failed: {}", stderr.trim()),
        });
    }
    let material = drainer.join().map_err(|_| Error::KeyFetch {
        name: name.to_string(),
        reason: "gpg output reader thread panicked".to_string(),
    })??;
    Ok(material)
}
