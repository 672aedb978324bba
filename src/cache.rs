//! Process-lifetime caches.
//!
//! Both caches are populated lazily, at most once, and never invalidated.
//! Population is single-flight: concurrent first callers wait on one run
//! instead of fetching the sources again. A failed run stores nothing, so the
//! next caller starts over.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::config::SourcesConfig;
use crate::domain::DatasetName;
use crate::error::AtlasError;
use crate::pipeline::{Dataset, DatasetSnapshot, run_pipeline};
use crate::records::{Record, to_records};
use crate::source::SourceReader;

pub struct DatasetCache<S: SourceReader> {
    reader: S,
    sources: SourcesConfig,
    snapshot: RwLock<Option<Arc<DatasetSnapshot>>>,
    populate: Mutex<()>,
}

impl<S: SourceReader> DatasetCache<S> {
    pub fn new(reader: S, sources: SourcesConfig) -> Self {
        Self {
            reader,
            sources,
            snapshot: RwLock::new(None),
            populate: Mutex::new(()),
        }
    }

    pub fn dataset(&self, name: DatasetName) -> Result<Dataset, AtlasError> {
        Ok(self.snapshot()?.get(name))
    }

    /// All datasets, running the pipeline on first use.
    pub fn snapshot(&self) -> Result<Arc<DatasetSnapshot>, AtlasError> {
        if let Some(snapshot) = self.cached() {
            return Ok(snapshot);
        }

        let _guard = self.populate.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = self.cached() {
            debug!("dataset cache populated by a concurrent caller");
            return Ok(snapshot);
        }

        info!("populating dataset cache");
        let snapshot = Arc::new(run_pipeline(&self.reader, &self.sources)?);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        info!("dataset cache populated");
        Ok(snapshot)
    }

    pub fn is_populated(&self) -> bool {
        self.cached().is_some()
    }

    fn cached(&self) -> Option<Arc<DatasetSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Transport-ready records per dataset, derived from a [`DatasetCache`].
#[derive(Default)]
pub struct RecordCache {
    entries: RwLock<HashMap<DatasetName, Arc<[Record]>>>,
    populate: Mutex<()>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: DatasetName) -> Option<Arc<[Record]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
    }

    /// Records for `name`, converting the dataset on first use.
    pub fn get_or_convert<S: SourceReader>(
        &self,
        name: DatasetName,
        datasets: &DatasetCache<S>,
    ) -> Result<Arc<[Record]>, AtlasError> {
        if let Some(records) = self.get(name) {
            debug!(dataset = %name, "record cache hit");
            return Ok(records);
        }

        let _guard = self.populate.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(records) = self.get(name) {
            return Ok(records);
        }

        let dataset = datasets.dataset(name)?;
        let records: Arc<[Record]> = to_records(&dataset)?.into();
        info!(dataset = %name, items = records.len(), "records cached");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, records.clone());
        Ok(records)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
