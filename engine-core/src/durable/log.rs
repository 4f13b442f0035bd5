//! The `DurableLog` trait and its `sled`-backed implementation (spec §4.13,
//! §4.14; storage engine choice documented in SPEC_FULL.md §4.13).

use crate::errors::DurableLogError;
use crate::ids::Id;

/// Composite key: `(id, version)`. Serializes as `date:counter:version` so
/// `sled`'s byte-lexicographic ordering keeps all versions of one id
/// adjacent and ascending.
fn storage_key(id: Id, version: u32) -> Vec<u8> {
    format!("{:010}:{:020}:{:010}", id.date(), id.counter(), version).into_bytes()
}

fn key_prefix(id: Id) -> Vec<u8> {
    format!("{:010}:{:020}:", id.date(), id.counter()).into_bytes()
}

/// An ordered key/value store where the key is `(id, version)` and the
/// value is an opaque byte payload (spec §4.13).
pub trait DurableLog: Send + Sync {
    fn save(&self, id: Id, bytes: &[u8]) -> Result<(), DurableLogError>;
    fn update(&self, id: Id, bytes: &[u8]) -> Result<u32, DurableLogError>;
    fn replace(&self, id: Id, old_version: u32, bytes: &[u8]) -> Result<u32, DurableLogError>;
    fn erase(&self, id: Id, version: Option<u32>) -> Result<(), DurableLogError>;
    fn max_version(&self, id: Id) -> Option<u32>;
    /// Scans every record in key order, invoking `observer` with
    /// `(id, version, bytes)` between conceptual `startLoad`/`finishLoad`
    /// bookends (here: before/after the scan loop).
    fn load(&self, observer: &mut dyn FnMut(Id, u32, &[u8])) -> Result<LoadStats, DurableLogError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    pub records_loaded: u64,
    pub records_skipped: u64,
}

pub struct SledLog {
    tree: sled::Db,
}

impl SledLog {
    pub fn open(data_dir: &std::path::Path) -> Result<Self, DurableLogError> {
        let tree = sled::open(data_dir).map_err(|e| DurableLogError::Backend(e.to_string()))?;
        Ok(SledLog { tree })
    }

    fn parse_key(raw: &[u8]) -> Option<(Id, u32)> {
        let text = std::str::from_utf8(raw).ok()?;
        let mut parts = text.split(':');
        let date: u32 = parts.next()?.parse().ok()?;
        let counter: u64 = parts.next()?.parse().ok()?;
        let version: u32 = parts.next()?.parse().ok()?;
        Some((Id::new(counter, date), version))
    }
}

impl DurableLog for SledLog {
    fn save(&self, id: Id, bytes: &[u8]) -> Result<(), DurableLogError> {
        let key = storage_key(id, 0);
        if self.tree.contains_key(&key).map_err(|e| DurableLogError::Backend(e.to_string()))? {
            return Err(DurableLogError::DuplicateKey { id, version: 0 });
        }
        self.tree.insert(key, bytes).map_err(|e| DurableLogError::Backend(e.to_string()))?;
        Ok(())
    }

    fn update(&self, id: Id, bytes: &[u8]) -> Result<u32, DurableLogError> {
        let new_version = self.max_version(id).map(|v| v + 1).unwrap_or(0);
        let key = storage_key(id, new_version);
        self.tree.insert(key, bytes).map_err(|e| DurableLogError::Backend(e.to_string()))?;
        Ok(new_version)
    }

    fn replace(&self, id: Id, old_version: u32, bytes: &[u8]) -> Result<u32, DurableLogError> {
        let old_key = storage_key(id, old_version);
        if !self.tree.contains_key(&old_key).map_err(|e| DurableLogError::Backend(e.to_string()))? {
            return Err(DurableLogError::VersionNotFound { id, version: old_version });
        }
        self.tree.remove(&old_key).map_err(|e| DurableLogError::Backend(e.to_string()))?;
        let new_version = old_version + 1;
        let new_key = storage_key(id, new_version);
        self.tree.insert(new_key, bytes).map_err(|e| DurableLogError::Backend(e.to_string()))?;
        Ok(new_version)
    }

    fn erase(&self, id: Id, version: Option<u32>) -> Result<(), DurableLogError> {
        match version {
            Some(v) => {
                self.tree.remove(storage_key(id, v)).map_err(|e| DurableLogError::Backend(e.to_string()))?;
            }
            None => {
                let prefix = key_prefix(id);
                for kv in self.tree.scan_prefix(&prefix) {
                    let (key, _) = kv.map_err(|e| DurableLogError::Backend(e.to_string()))?;
                    self.tree.remove(key).map_err(|e| DurableLogError::Backend(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    fn max_version(&self, id: Id) -> Option<u32> {
        let prefix = key_prefix(id);
        self.tree
            .scan_prefix(&prefix)
            .filter_map(|kv| kv.ok())
            .filter_map(|(key, _)| Self::parse_key(&key).map(|(_, version)| version))
            .max()
    }

    fn load(&self, observer: &mut dyn FnMut(Id, u32, &[u8])) -> Result<LoadStats, DurableLogError> {
        let mut stats = LoadStats::default();
        for kv in self.tree.iter() {
            match kv {
                Ok((key, value)) => match Self::parse_key(&key) {
                    Some((id, version)) => {
                        observer(id, version, &value);
                        stats.records_loaded += 1;
                    }
                    None => stats.records_skipped += 1,
                },
                Err(_) => stats.records_skipped += 1,
            }
        }
        Ok(stats)
    }
}
