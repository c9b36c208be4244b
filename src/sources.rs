// src/sources.rs

//! Apt repository layout on disk
//!
//! [`AptLayout`] derives every path the provisioner touches from a single
//! root, so the whole tree can be pointed at a scratch directory. Ownership
//! is only changed when operating on the live root; modes are always applied.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::catalog::{Catalog, CatalogEntry, RepoEntry};
use crate::fetch::Fetcher;
use crate::keys::KeyWriter;
use crate::reconcile::RepositoryWriter;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct AptLayout {
    root: PathBuf,
}

impl AptLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this layout targets the running system rather than a scratch
    /// or image root
    pub fn is_live_root(&self) -> bool {
        self.root == Path::new("/")
    }

    pub fn apt_dir(&self) -> PathBuf {
        self.root.join("etc/apt")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.apt_dir().join("sources.list.d")
    }

    pub fn preferences_dir(&self) -> PathBuf {
        self.apt_dir().join("preferences.d")
    }

    pub fn trusted_dir(&self) -> PathBuf {
        self.apt_dir().join("trusted.gpg.d")
    }

    pub fn sources_file(&self) -> PathBuf {
        self.apt_dir().join("sources.list")
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.apt_dir().join("preferences")
    }

    pub fn trusted_file(&self) -> PathBuf {
        self.apt_dir().join("trusted.gpg")
    }

    fn trusted_backup(&self) -> PathBuf {
        self.apt_dir().join("trusted.gpg~")
    }

    pub fn list_path(&self, group: &str) -> PathBuf {
        self.sources_dir().join(format!("{group}.list"))
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.trusted_dir().join(format!("{name}.gpg"))
    }

    pub fn wsl_conf(&self) -> PathBuf {
        self.root.join("etc/wsl.conf")
    }

    /// Wipe repository definitions, pins and trusted keys back to empty
    ///
    /// Directories come back empty with mode 0755, flat files empty with
    /// mode 0644, and the stale `trusted.gpg~` backup is dropped.
    pub fn reset(&self) -> Result<()> {
        fs::create_dir_all(self.apt_dir())?;

        for dir in [
            self.sources_dir(),
            self.preferences_dir(),
            self.trusted_dir(),
        ] {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
            fs::create_dir_all(&dir)?;
            self.apply_permissions(&dir, 0o755)?;
            debug!("Reset directory {}", dir.display());
        }

        for file in [
            self.sources_file(),
            self.preferences_file(),
            self.trusted_file(),
        ] {
            if file.exists() {
                fs::remove_file(&file)?;
            }
            fs::File::create(&file)?;
            self.apply_permissions(&file, 0o644)?;
            debug!("Reset file {}", file.display());
        }

        let backup = self.trusted_backup();
        if backup.exists() {
            fs::remove_file(&backup)?;
        }
        Ok(())
    }

    /// Write one `.list` file per catalog group, entries in document order
    pub fn write_lists<F>(&self, catalog: &Catalog, mut fetch_remote: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<String>,
    {
        for (group, entries) in &catalog.groups {
            let mut body = String::new();
            for (name, entry) in entries {
                match entry {
                    CatalogEntry::Repo(repo) => {
                        for dist in &repo.dists {
                            body.push_str(&render_repo_line(repo, dist));
                        }
                    }
                    CatalogEntry::RemoteList(remote) => {
                        debug!("Fetching remote source list {} from {}", name, remote.url);
                        let content = fetch_remote(&remote.url)?;
                        body.push_str(content.trim_end());
                        body.push('\n');
                    }
                }
            }
            let path = self.list_path(group);
            self.write_atomic(&path, body.as_bytes(), 0o644)?;
            info!("Wrote {} source entries to {}", entries.len(), path.display());
        }
        Ok(())
    }

    /// Write via a temporary file in the target directory, then rename over
    pub(crate) fn write_atomic(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;
        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(contents)?;
        file.persist(path).map_err(|e| Error::Io(e.error))?;
        self.apply_permissions(path, mode)
    }

    /// Mode is always applied; ownership goes to root only on the live root
    pub(crate) fn apply_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::{PermissionsExt, chown};

        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        if self.is_live_root() {
            chown(path, Some(0), Some(0))?;
        }
        Ok(())
    }
}

fn render_repo_line(repo: &RepoEntry, dist: &str) -> String {
    let mut line = String::from("deb ");
    if !repo.architectures.is_empty() {
        let arches: Vec<&str> = repo.architectures.iter().map(String::as_str).collect();
        line.push_str(&format!("[arch={}] ", arches.join(",")));
    }
    line.push_str(&repo.uri);
    line.push(' ');
    line.push_str(dist);
    for component in &repo.components {
        line.push(' ');
        line.push_str(component);
    }
    line.push('\n');
    line
}

/// Writer that materializes a catalog onto a real filesystem
pub struct SystemWriter {
    layout: AptLayout,
    fetcher: Fetcher,
}

impl SystemWriter {
    pub fn new(layout: AptLayout) -> Result<Self> {
        Ok(Self {
            layout,
            fetcher: Fetcher::new()?,
        })
    }
}

impl RepositoryWriter for SystemWriter {
    fn reset(&mut self) -> Result<()> {
        self.layout.reset()
    }

    fn materialize(&mut self, catalog: &Catalog) -> Result<()> {
        KeyWriter::new(&self.fetcher).write_all(&self.layout, &catalog.keys)?;
        self.layout
            .write_lists(catalog, |url| self.fetcher.download_to_string(url))
    }
}

/// Render the `.list` file bodies a catalog would produce, keyed by group
///
/// Remote entries come out as `# remote list: <url>` placeholders, this is
/// the preview shape used by `outfit render`.
pub fn preview_lists(catalog: &Catalog) -> BTreeMap<String, String> {
    let mut preview = BTreeMap::new();
    for (group, entries) in &catalog.groups {
        let mut body = String::new();
        for (_, entry) in entries {
            match entry {
                CatalogEntry::Repo(repo) => {
                    for dist in &repo.dists {
                        body.push_str(&render_repo_line(repo, dist));
                    }
                }
                CatalogEntry::RemoteList(remote) => {
                    body.push_str(&format!("# remote list: {}\n", remote.url));
                }
            }
        }
        preview.insert(group.clone(), body);
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn repo(uri: &str, dists: &[&str], components: &[&str], arches: &[&str]) -> RepoEntry {
        RepoEntry {
            uri: uri.to_string(),
            dists: dists.iter().map(ToString::to_string).collect(),
            components: components.iter().map(ToString::to_string).collect(),
            architectures: arches.iter().map(ToString::to_string).collect(),
        }
    }

    fn catalog_with_group(group: &str, entries: Vec<(String, CatalogEntry)>) -> Catalog {
        let mut groups = BTreeMap::new();
        groups.insert(group.to_string(), entries);
        Catalog {
            groups,
            keys: BTreeMap::new(),
            packages: BTreeSet::new(),
        }
    }

    #[test]
    fn test_reset_produces_empty_layout() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());

        fs::create_dir_all(layout.sources_dir()).unwrap();
        fs::write(layout.sources_dir().join("stale.list"), "deb http://old x y\n").unwrap();
        fs::write(layout.sources_file(), "deb http://old x y\n").unwrap();
        fs::write(layout.trusted_backup(), "stale").unwrap();

        layout.reset().unwrap();

        assert!(layout.sources_dir().is_dir());
        assert_eq!(fs::read_dir(layout.sources_dir()).unwrap().count(), 0);
        assert!(layout.preferences_dir().is_dir());
        assert!(layout.trusted_dir().is_dir());
        assert_eq!(fs::read(layout.sources_file()).unwrap(), b"");
        assert_eq!(fs::read(layout.preferences_file()).unwrap(), b"");
        assert_eq!(fs::read(layout.trusted_file()).unwrap(), b"");
        assert!(!layout.trusted_backup().exists());
    }

    #[test]
    fn test_reset_applies_modes() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        layout.reset().unwrap();

        let dir_mode = fs::metadata(layout.sources_dir()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        let file_mode = fs::metadata(layout.sources_file()).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o644);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        layout.reset().unwrap();
        layout.reset().unwrap();
        assert!(layout.sources_dir().is_dir());
    }

    #[test]
    fn test_render_basic_line() {
        let entry = repo("http://example/repo", &["focal"], &["main", "universe"], &[]);
        assert_eq!(
            render_repo_line(&entry, "focal"),
            "deb http://example/repo focal main universe\n"
        );
    }

    #[test]
    fn test_render_line_with_architectures() {
        let entry = repo("http://example/repo", &["focal"], &["main"], &["amd64", "i386"]);
        assert_eq!(
            render_repo_line(&entry, "focal"),
            "deb [arch=amd64,i386] http://example/repo focal main\n"
        );
    }

    #[test]
    fn test_write_lists_expands_every_dist() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        let catalog = catalog_with_group(
            "base",
            vec![(
                "base".to_string(),
                CatalogEntry::Repo(repo(
                    "http://archive.ubuntu.com/ubuntu",
                    &["focal", "focal-updates"],
                    &["main"],
                    &[],
                )),
            )],
        );

        layout
            .write_lists(&catalog, |_| panic!("no remote entries expected"))
            .unwrap();

        let body = fs::read_to_string(layout.list_path("base")).unwrap();
        assert_eq!(
            body,
            "deb http://archive.ubuntu.com/ubuntu focal main\n\
             deb http://archive.ubuntu.com/ubuntu focal-updates main\n"
        );
    }

    #[test]
    fn test_write_lists_keeps_document_order_within_group() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        let catalog = catalog_with_group(
            "extras",
            vec![
                (
                    "zeta".to_string(),
                    CatalogEntry::Repo(repo("http://zeta/repo", &["focal"], &["main"], &[])),
                ),
                (
                    "alpha".to_string(),
                    CatalogEntry::Repo(repo("http://alpha/repo", &["focal"], &["main"], &[])),
                ),
            ],
        );

        layout.write_lists(&catalog, |_| unreachable!()).unwrap();

        let body = fs::read_to_string(layout.list_path("extras")).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert!(lines[0].contains("zeta"));
        assert!(lines[1].contains("alpha"));
    }

    #[test]
    fn test_write_lists_splices_remote_content() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        let catalog = catalog_with_group(
            "vendor",
            vec![(
                "vendor".to_string(),
                CatalogEntry::RemoteList(crate::catalog::RemoteListEntry {
                    url: "https://vendor.example/apt.list".to_string(),
                }),
            )],
        );

        layout
            .write_lists(&catalog, |url| {
                assert_eq!(url, "https://vendor.example/apt.list");
                Ok("deb https://vendor.example/apt stable main\n\n".to_string())
            })
            .unwrap();

        let body = fs::read_to_string(layout.list_path("vendor")).unwrap();
        assert_eq!(body, "deb https://vendor.example/apt stable main\n");
    }

    #[test]
    fn test_remote_fetch_failure_propagates() {
        let root = TempDir::new().unwrap();
        let layout = AptLayout::new(root.path());
        let catalog = catalog_with_group(
            "vendor",
            vec![(
                "vendor".to_string(),
                CatalogEntry::RemoteList(crate::catalog::RemoteListEntry {
                    url: "https://vendor.example/apt.list".to_string(),
                }),
            )],
        );

        let err = layout
            .write_lists(&catalog, |url| {
                Err(Error::Download {
                    url: url.to_string(),
                    reason: "HTTP status 404".to_string(),
                })
            })
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_preview_marks_remote_entries() {
        let catalog = catalog_with_group(
            "vendor",
            vec![(
                "vendor".to_string(),
                CatalogEntry::RemoteList(crate::catalog::RemoteListEntry {
                    url: "https://vendor.example/apt.list".to_string(),
                }),
            )],
        );
        let preview = preview_lists(&catalog);
        assert_eq!(
            preview["vendor"],
            "# remote list: https://vendor.example/apt.list\n"
        );
    }
}
