//! Diff between an advertised manifest and the local ledger.

use crate::error::{PatchError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::version::Version;
use std::collections::HashSet;

/// Outcome of comparing one advertised entry against the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    UpToDate,
    Pending,
}

/// Files to fetch this session, in advertisement order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingSet {
    entries: Vec<ManifestEntry>,
}

impl PendingSet {
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn get(&self, path: &str) -> Option<&Version> {
        self.entries.iter().find(|e| e.path == path).map(|e| &e.version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for PendingSet {
    type Item = ManifestEntry;
    type IntoIter = std::vec::IntoIter<ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Incremental diff: fed one advertised record at a time as it is read
/// off the connection.
pub struct DiffEngine<'a> {
    local: &'a Manifest,
    seen: HashSet<String>,
    pending: PendingSet,
}

impl<'a> DiffEngine<'a> {
    pub fn new(local: &'a Manifest) -> Self {
        Self {
            local,
            seen: HashSet::new(),
            pending: PendingSet::default(),
        }
    }

    /// Compare one remote entry. Advertising a path twice is a format error.
    pub fn observe(&mut self, remote: ManifestEntry) -> Result<Verdict> {
        if !self.seen.insert(remote.path.clone()) {
            return Err(PatchError::format(format!(
                "{} advertised more than once",
                remote.path
            )));
        }
        match self.local.get(&remote.path) {
            Some(local) if *local == remote.version => Ok(Verdict::UpToDate),
            _ => {
                self.pending.entries.push(remote);
                Ok(Verdict::Pending)
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn finish(self) -> PendingSet {
        self.pending
    }
}

/// Diff a complete remote sequence against `local`.
pub fn diff<I>(local: &Manifest, remote: I) -> Result<PendingSet>
where
    I: IntoIterator<Item = ManifestEntry>,
{
    let mut engine = DiffEngine::new(local);
    for entry in remote {
        engine.observe(entry)?;
    }
    Ok(engine.finish())
}
