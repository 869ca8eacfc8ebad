//! Snapshot cache
//!
//! Each source file is parsed once and kept behind a lock until its
//! modification time changes. Readers share the parsed index through an
//! `Arc`; the first request after a file changes reloads it synchronously.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use chrono::NaiveDate;
use serde::Serialize;
use shared::sources::{CatalogIndex, HistoryIndex, WarehouseSnapshot};
use shared::{LoadReport, SnapshotSet, SourceError, SourceKind, SourceOptions};

use crate::config::SnapshotConfig;

type Loader<T> = fn(&Path, SourceOptions) -> Result<(T, LoadReport), SourceError>;

struct Loaded<T> {
    value: Arc<T>,
    report: LoadReport,
    modified: SystemTime,
}

/// One snapshot file and its parsed form
pub struct SourceCache<T> {
    kind: SourceKind,
    path: PathBuf,
    options: SourceOptions,
    loader: Loader<T>,
    state: RwLock<Option<Loaded<T>>>,
}

impl<T> SourceCache<T> {
    pub fn new(kind: SourceKind, path: PathBuf, options: SourceOptions, loader: Loader<T>) -> Self {
        Self {
            kind,
            path,
            options,
            loader,
            state: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&self) -> Result<SystemTime, SourceError> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|error| SourceError::Io {
                kind: self.kind,
                error,
            })
    }

    fn fresh(state: &Option<Loaded<T>>, modified: SystemTime) -> Option<(Arc<T>, LoadReport)> {
        state
            .as_ref()
            .filter(|loaded| loaded.modified == modified)
            .map(|loaded| (Arc::clone(&loaded.value), loaded.report))
    }

    /// Current parsed snapshot, reloading it if the file changed
    pub fn get(&self) -> Result<(Arc<T>, LoadReport), SourceError> {
        let modified = self.modified()?;
        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = Self::fresh(&state, modified) {
                return Ok(hit);
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        // another request may have reloaded while we waited for the lock
        if let Some(hit) = Self::fresh(&state, modified) {
            return Ok(hit);
        }

        let (value, report) = (self.loader)(&self.path, self.options)?;
        tracing::info!(
            source = %self.kind,
            path = %self.path.display(),
            rows_loaded = report.rows_loaded,
            rows_skipped = report.rows_skipped,
            "snapshot reloaded"
        );

        let value = Arc::new(value);
        *state = Some(Loaded {
            value: Arc::clone(&value),
            report,
            modified,
        });
        Ok((value, report))
    }
}

/// One consistent read of the three snapshots.
///
/// History and warehouse failures degrade to empty data with a warning; only
/// the catalog is required.
pub struct Snapshots {
    pub catalog: Arc<CatalogIndex>,
    pub history: Arc<HistoryIndex>,
    pub warehouse: Arc<WarehouseSnapshot>,
    pub warnings: Vec<String>,
}

impl Snapshots {
    pub fn set(&self) -> SnapshotSet<'_> {
        SnapshotSet {
            catalog: &self.catalog,
            history: &self.history,
            warehouse: &self.warehouse,
        }
    }
}

/// Load state of one source, as shown by the status endpoint
#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub source: SourceKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<LoadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotStatus {
    pub sources: Vec<SourceStatus>,
    pub warehouse_date: Option<NaiveDate>,
}

pub struct SnapshotCache {
    catalog: SourceCache<CatalogIndex>,
    history: SourceCache<HistoryIndex>,
    warehouse: SourceCache<WarehouseSnapshot>,
}

impl SnapshotCache {
    pub fn new(config: &SnapshotConfig, options: SourceOptions) -> Self {
        Self {
            catalog: SourceCache::new(
                SourceKind::Catalog,
                config.catalog_path.clone(),
                options,
                CatalogIndex::load,
            ),
            history: SourceCache::new(
                SourceKind::History,
                config.history_path.clone(),
                options,
                HistoryIndex::load,
            ),
            warehouse: SourceCache::new(
                SourceKind::Warehouse,
                config.warehouse_path.clone(),
                options,
                WarehouseSnapshot::load,
            ),
        }
    }

    pub fn current(&self) -> Result<Snapshots, SourceError> {
        let (catalog, _) = self.catalog.get()?;
        let mut warnings = Vec::new();
        let history = degrade(self.history.get(), &mut warnings);
        let warehouse = degrade(self.warehouse.get(), &mut warnings);
        Ok(Snapshots {
            catalog,
            history,
            warehouse,
            warnings,
        })
    }

    pub fn status(&self) -> SnapshotStatus {
        let mut warehouse_date = None;
        let sources = vec![
            status_of(&self.catalog, |_| ()),
            status_of(&self.history, |_| ()),
            status_of(&self.warehouse, |snapshot| {
                warehouse_date = snapshot.snapshot_date()
            }),
        ];
        SnapshotStatus {
            sources,
            warehouse_date,
        }
    }
}

fn degrade<T: Default>(
    loaded: Result<(Arc<T>, LoadReport), SourceError>,
    warnings: &mut Vec<String>,
) -> Arc<T> {
    match loaded {
        Ok((value, _)) => value,
        Err(err) => {
            tracing::warn!(
                source = %err.kind(),
                error = %err,
                "snapshot unavailable, continuing without it"
            );
            warnings.push(err.to_string());
            Arc::new(T::default())
        }
    }
}

fn status_of<T>(cache: &SourceCache<T>, mut inspect: impl FnMut(&T)) -> SourceStatus {
    let path = cache.path().display().to_string();
    match cache.get() {
        Ok((value, report)) => {
            inspect(&value);
            SourceStatus {
                source: cache.kind,
                path,
                report: Some(report),
                error: None,
            }
        }
        Err(err) => SourceStatus {
            source: cache.kind,
            path,
            report: None,
            error: Some(err.to_string()),
        },
    }
}
