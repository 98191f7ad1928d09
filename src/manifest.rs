//! Version ledgers: the on-disk `path:version` files both sides keep.

use crate::error::{PatchError, Result};
use crate::version::Version;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Separator between the path and version fields of a ledger or wire line.
pub const FIELD_SEPARATOR: char = ':';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub version: Version,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, version: Version) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    /// Parse a `path:version` line. Exactly two fields are required.
    pub fn parse_line(line: &str) -> Result<Self> {
        let (path, version) = split_fields(line)
            .ok_or_else(|| PatchError::format(format!("expected 'path:version', got '{}'", line)))?;
        let version = Version::parse(version)
            .map_err(|_| PatchError::format(format!("invalid version '{}' for {}", version, path)))?;
        Ok(Self::new(path, version))
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.path, FIELD_SEPARATOR, self.version)
    }
}

/// Split into exactly two colon-separated fields.
fn split_fields(line: &str) -> Option<(&str, &str)> {
    let mut fields = line.split(FIELD_SEPARATOR);
    let path = fields.next()?;
    let version = fields.next()?;
    if fields.next().is_some() {
        return None;
    }
    Some((path, version))
}

/// Path field of a raw ledger line, if it has one.
fn line_path(line: &str) -> &str {
    line.split(FIELD_SEPARATOR).next().unwrap_or(line)
}

/// Path to version mapping that remembers insertion order.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; a path already present is a format error.
    pub fn insert(&mut self, entry: ManifestEntry) -> Result<()> {
        if self.index.contains_key(&entry.path) {
            return Err(PatchError::format(format!("duplicate entry for {}", entry.path)));
        }
        self.index.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Version> {
        self.index.get(path).map(|&i| &self.entries[i].version)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Which side owns the ledger. Only the server requires it to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerRole {
    Client,
    Server,
}

/// A ledger file plus the root directory its paths are relative to.
#[derive(Clone, Debug)]
pub struct Ledger {
    path: PathBuf,
    root: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: root.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location on disk of a ledger-relative path.
    pub fn resolve(&self, entry_path: &str) -> PathBuf {
        self.root.join(entry_path)
    }

    /// Load the whole ledger. Any bad line aborts the load.
    pub fn load(&self, role: LedgerRole) -> Result<Manifest> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return match role {
                    LedgerRole::Client => Ok(Manifest::new()),
                    LedgerRole::Server => Err(PatchError::NotFound(format!(
                        "could not find {}",
                        self.path.display()
                    ))),
                };
            }
            Err(e) => return Err(e.into()),
        };

        let mut manifest = Manifest::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (path, version) = split_fields(line).ok_or_else(|| {
                PatchError::format(format!("invalid entry '{}' in {}", line, self.path.display()))
            })?;
            if !self.resolve(path).exists() {
                return Err(PatchError::NotFound(format!("could not find {}", path)));
            }
            let version = Version::parse(version).map_err(|_| {
                PatchError::format(format!(
                    "invalid version '{}' in {}",
                    version,
                    self.path.display()
                ))
            })?;
            manifest.insert(ManifestEntry::new(path, version))?;
        }
        Ok(manifest)
    }

    /// Rewrite the ledger with `updated_path` set to `version`.
    ///
    /// Existing lines for other paths are kept byte for byte; the updated
    /// entry goes last.
    pub fn persist(&self, updated_path: &str, version: &Version) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut out = String::with_capacity(existing.len() + updated_path.len() + 16);
        for line in existing.split('\n') {
            if line.trim().is_empty() || line_path(line) == updated_path {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&ManifestEntry::new(updated_path, *version).to_string());

        fs::write(&self.path, out.trim_end())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, b"x").unwrap();
    }

    #[test]
    fn parse_line_requires_two_fields() {
        let e = ManifestEntry::parse_line("data/a.pak:1.2").unwrap();
        assert_eq!(e.path, "data/a.pak");
        assert_eq!(e.version, v("1.2"));
        assert_eq!(e.to_string(), "data/a.pak:1.2");

        assert!(matches!(ManifestEntry::parse_line("a.pak"), Err(PatchError::Format(_))));
        assert!(matches!(ManifestEntry::parse_line("C:/a.pak:1.0"), Err(PatchError::Format(_))));
        assert!(matches!(ManifestEntry::parse_line("a.pak:x"), Err(PatchError::Format(_))));
    }

    #[test]
    fn manifest_keeps_insertion_order_and_rejects_duplicates() {
        let mut m = Manifest::new();
        for (p, ver) in [("z", "1"), ("a", "2"), ("m", "3")] {
            m.insert(ManifestEntry::new(p, v(ver))).unwrap();
        }
        assert_eq!(m.paths().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(m.get("a"), Some(&v("2")));
        assert!(m.insert(ManifestEntry::new("a", v("9"))).is_err());
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn missing_ledger_depends_on_role() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::new(tmp.path().join("versions.txt"), tmp.path());
        assert!(ledger.load(LedgerRole::Client).unwrap().is_empty());
        assert!(matches!(ledger.load(LedgerRole::Server), Err(PatchError::NotFound(_))));
    }

    #[test]
    fn load_reads_entries_in_file_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.bin");
        touch(tmp.path(), "sub/a.bin");
        let path = tmp.path().join("versions.txt");
        fs::write(&path, "b.bin:1.0\r\n\nsub/a.bin:2.3.4\n").unwrap();

        let m = Ledger::new(&path, tmp.path()).load(LedgerRole::Server).unwrap();
        let entries: Vec<_> = m.iter().map(|e| e.to_string()).collect();
        assert_eq!(entries, vec!["b.bin:1.0", "sub/a.bin:2.3.4"]);
    }

    #[test]
    fn load_aborts_on_any_bad_line() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.bin");
        let path = tmp.path().join("versions.txt");
        let ledger = Ledger::new(&path, tmp.path());

        fs::write(&path, "a.bin:1.0\nno-separator\n").unwrap();
        assert!(matches!(ledger.load(LedgerRole::Client), Err(PatchError::Format(_))));

        fs::write(&path, "a.bin:1.0\nghost.bin:1.0\n").unwrap();
        assert!(matches!(ledger.load(LedgerRole::Client), Err(PatchError::NotFound(_))));

        fs::write(&path, "a.bin:one\n").unwrap();
        assert!(matches!(ledger.load(LedgerRole::Server), Err(PatchError::Format(_))));

        fs::write(&path, "a.bin:1.0\na.bin:1.1\n").unwrap();
        assert!(matches!(ledger.load(LedgerRole::Server), Err(PatchError::Format(_))));
    }

    #[test]
    fn persist_creates_missing_ledger() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("autopatch_versions.txt");
        let ledger = Ledger::new(&path, tmp.path());

        ledger.persist("game.exe", &v("1.4")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "game.exe:1.4");
    }

    #[test]
    fn persist_replaces_only_the_updated_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.txt");
        fs::write(&path, "a.bin:1.0\ngame.exe:1.0\ngame.exe.bak:0.9\nc.bin:3.0.0.1\n\n").unwrap();
        let ledger = Ledger::new(&path, tmp.path());

        ledger.persist("game.exe", &v("1.1")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a.bin:1.0\ngame.exe.bak:0.9\nc.bin:3.0.0.1\ngame.exe:1.1");
        assert_eq!(text.matches("game.exe:").count(), 1);
    }

    #[test]
    fn persisted_ledger_loads_back() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.bin");
        touch(tmp.path(), "b.bin");
        let ledger = Ledger::new(tmp.path().join("versions.txt"), tmp.path());

        ledger.persist("a.bin", &v("1.0")).unwrap();
        ledger.persist("b.bin", &v("2.0")).unwrap();
        ledger.persist("a.bin", &v("1.1")).unwrap();

        let m = ledger.load(LedgerRole::Client).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("a.bin"), Some(&v("1.1")));
        assert_eq!(m.get("b.bin"), Some(&v("2.0")));
    }
}
