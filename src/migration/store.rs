use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Schema version recorded for one tenant index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexVersioning {
    pub index_name: String,     // Logical name, e.g. `000042-ec2-reports`
    pub template_name: String,
    pub version: u32,
}

impl IndexVersioning {
    pub fn new(index_name: impl Into<String>, template_name: impl Into<String>, version: u32) -> Self {
        IndexVersioning {
            index_name: index_name.into(),
            template_name: template_name.into(),
            version,
        }
    }
}

/// Keyed persistence of `IndexVersioning` rows.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn select_by_index_name(&self, index_name: &str) -> Result<Option<IndexVersioning>>;

    async fn select_by_template(&self, template_name: &str) -> Result<Vec<IndexVersioning>>;

    /// Rows of `template_name` below `current_version`.
    async fn select_outdated(&self, template_name: &str, current_version: u32) -> Result<Vec<IndexVersioning>>;

    /// Fails with `AlreadyExists` when the index is already recorded.
    async fn insert(&self, record: &IndexVersioning) -> Result<()>;

    /// Fails with `NotFound` when the index was never recorded.
    async fn update(&self, record: &IndexVersioning) -> Result<()>;
}

fn insert_row(rows: &mut BTreeMap<String, IndexVersioning>, record: &IndexVersioning) -> Result<()> {
    if rows.contains_key(&record.index_name) {
        return Err(Error::new(
            ErrorKind::AlreadyExists,
            format!("versioning for {} already recorded", record.index_name),
        ));
    }
    rows.insert(record.index_name.clone(), record.clone());
    Ok(())
}

fn update_row(rows: &mut BTreeMap<String, IndexVersioning>, record: &IndexVersioning) -> Result<()> {
    match rows.get_mut(&record.index_name) {
        Some(row) => {
            *row = record.clone();
            Ok(())
        }
        None => Err(Error::not_found(format!("no versioning for {}", record.index_name))),
    }
}

fn by_template(rows: &BTreeMap<String, IndexVersioning>, template_name: &str, below: Option<u32>) -> Vec<IndexVersioning> {
    rows.values()
        .filter(|r| r.template_name == template_name)
        .filter(|r| below.map_or(true, |v| r.version < v))
        .cloned()
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    rows: RwLock<BTreeMap<String, IndexVersioning>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn select_by_index_name(&self, index_name: &str) -> Result<Option<IndexVersioning>> {
        Ok(self.rows.read().get(index_name).cloned())
    }

    async fn select_by_template(&self, template_name: &str) -> Result<Vec<IndexVersioning>> {
        Ok(by_template(&self.rows.read(), template_name, None))
    }

    async fn select_outdated(&self, template_name: &str, current_version: u32) -> Result<Vec<IndexVersioning>> {
        Ok(by_template(&self.rows.read(), template_name, Some(current_version)))
    }

    async fn insert(&self, record: &IndexVersioning) -> Result<()> {
        insert_row(&mut self.rows.write(), record)
    }

    async fn update(&self, record: &IndexVersioning) -> Result<()> {
        update_row(&mut self.rows.write(), record)
    }
}

/// Version store persisted as a bincode snapshot, rewritten after every change.
#[derive(Debug)]
pub struct FileVersionStore {
    path: PathBuf,
    rows: Mutex<BTreeMap<String, IndexVersioning>>,
}

impl FileVersionStore {
    /// Opens the store at `path`, empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = if path.exists() {
            let data = fs::read(&path)?;
            let list: Vec<IndexVersioning> = bincode::deserialize(&data)?;
            list.into_iter().map(|r| (r.index_name.clone(), r)).collect()
        } else {
            BTreeMap::new()
        };
        Ok(FileVersionStore {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, rows: &BTreeMap<String, IndexVersioning>) -> Result<()> {
        let list: Vec<&IndexVersioning> = rows.values().collect();
        let data = bincode::serialize(&list)?;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        // Replace atomically.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, IndexVersioning>) -> Result<()>,
    {
        let mut rows = self.rows.lock();
        let mut next = rows.clone();
        change(&mut next)?;
        self.save(&next)?;
        *rows = next;
        Ok(())
    }
}

#[async_trait]
impl VersionStore for FileVersionStore {
    async fn select_by_index_name(&self, index_name: &str) -> Result<Option<IndexVersioning>> {
        Ok(self.rows.lock().get(index_name).cloned())
    }

    async fn select_by_template(&self, template_name: &str) -> Result<Vec<IndexVersioning>> {
        Ok(by_template(&self.rows.lock(), template_name, None))
    }

    async fn select_outdated(&self, template_name: &str, current_version: u32) -> Result<Vec<IndexVersioning>> {
        Ok(by_template(&self.rows.lock(), template_name, Some(current_version)))
    }

    async fn insert(&self, record: &IndexVersioning) -> Result<()> {
        self.mutate(|rows| insert_row(rows, record))
    }

    async fn update(&self, record: &IndexVersioning) -> Result<()> {
        self.mutate(|rows| update_row(rows, record))
    }
}
