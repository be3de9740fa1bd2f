use std::{
    fs::{self, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use resources::objects::{ScrapeEntry, TargetGroup};
use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;

use crate::error::ReconcileError;

const SCRAPE_CONFIGS: &str = "scrape_configs";
const DEFAULT_MODE: u32 = 0o644;

/// Keep every foreign entry in its original order, drop every managed one,
/// then append the fresh managed entries.
pub fn merge_entries<E: ScrapeEntry>(existing: Vec<E>, fresh: Vec<E>) -> Vec<E> {
    existing
        .into_iter()
        .filter(|entry| !entry.has_discovery_source())
        .chain(fresh)
        .collect()
}

/// The Prometheus configuration file.
/// Only `scrape_configs` is interpreted; everything else is written back as read.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Mapping,
}

impl ConfigDocument {
    pub fn parse(contents: &str) -> Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self {
                root: Mapping::new(),
            });
        }
        match serde_yaml::from_str::<Value>(contents).map_err(|e| e.to_string())? {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self {
                root: Mapping::new(),
            }),
            _ => Err("top level is not a mapping".to_string()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ReconcileError::persistence(path, e))?;
        Self::parse(&contents).map_err(|reason| ReconcileError::document(path, reason))
    }

    pub fn scrape_configs(&self) -> Result<Vec<Value>, String> {
        match self.root.get(&Value::from(SCRAPE_CONFIGS)) {
            None | Some(Value::Null) => Ok(vec![]),
            Some(Value::Sequence(entries)) => Ok(entries.to_owned()),
            Some(_) => Err(format!("{} is not a list", SCRAPE_CONFIGS)),
        }
    }

    /// Replace the managed subset of `scrape_configs` with `groups`.
    pub fn replace_managed(&mut self, groups: &[TargetGroup]) -> Result<(), String> {
        let fresh = groups
            .iter()
            .map(serde_yaml::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        let merged = merge_entries(self.scrape_configs()?, fresh);
        self.root
            .insert(Value::from(SCRAPE_CONFIGS), Value::Sequence(merged));
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, String> {
        serde_yaml::to_string(&self.root).map_err(|e| e.to_string())
    }

    /// Write the document next to `path` and rename it into place, so readers
    /// never observe a partially written file. A symlinked `path` is followed
    /// and its target replaced; the file keeps its permissions, or gets 0644
    /// when it is new.
    pub fn persist(&self, path: &Path) -> Result<(), ReconcileError> {
        let contents = self
            .to_yaml()
            .map_err(|reason| ReconcileError::document(path, reason))?;
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_owned());
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
            _ => PathBuf::from("."),
        };
        let permissions = fs::metadata(&target)
            .map(|metadata| metadata.permissions())
            .unwrap_or_else(|_| Permissions::from_mode(DEFAULT_MODE));

        let mut file =
            NamedTempFile::new_in(&dir).map_err(|e| ReconcileError::persistence(&dir, e))?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.as_file().set_permissions(permissions))
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| ReconcileError::persistence(file.path(), e))?;
        file.persist(&target)
            .map_err(|e| ReconcileError::persistence(&target, e.error))?;
        Ok(())
    }
}
