use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cache::{DatasetCache, RecordCache};
use crate::clean::mean_of_present;
use crate::config::SourcesConfig;
use crate::domain::{CampaignLabel, DatasetName, PredictionKind};
use crate::error::AtlasError;
use crate::forecast::{CampaignSeries, Prediction, aggregate_campaigns, predict_campaign};
use crate::pagination::{Connection, paginate};
use crate::pipeline::{Dataset, DatasetSnapshot};
use crate::records::{Record, to_records};
use crate::source::SourceReader;

#[derive(Debug, Clone, Serialize)]
pub struct PreloadResult {
    pub datasets: Vec<PreloadEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreloadEntry {
    pub dataset: DatasetName,
    pub items: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResult {
    pub stats_urgences: Option<f64>,
    pub stats_couverture: Option<f64>,
}

/// Query facade over the two caches. Everything after the first population
/// is in-memory.
pub struct App<S: SourceReader> {
    datasets: DatasetCache<S>,
    records: RecordCache,
}

impl<S: SourceReader> App<S> {
    pub fn new(reader: S, sources: SourcesConfig) -> Self {
        Self {
            datasets: DatasetCache::new(reader, sources),
            records: RecordCache::new(),
        }
    }

    pub fn dataset(&self, name: DatasetName) -> Result<Dataset, AtlasError> {
        self.datasets.dataset(name)
    }

    pub fn dataset_cache(&self) -> &DatasetCache<S> {
        &self.datasets
    }

    pub fn record_cache(&self) -> &RecordCache {
        &self.records
    }

    /// Populate both caches for every dataset up front.
    pub fn preload(&self) -> Result<PreloadResult, AtlasError> {
        let mut datasets = Vec::with_capacity(DatasetName::ALL.len());
        for name in DatasetName::ALL {
            let records = self.records.get_or_convert(name, &self.datasets)?;
            datasets.push(PreloadEntry {
                dataset: name,
                items: records.len(),
            });
        }
        info!("caches preloaded");
        Ok(PreloadResult { datasets })
    }

    /// Every record of a dataset, unpaginated.
    pub fn records(&self, name: DatasetName) -> Result<Arc<[Record]>, AtlasError> {
        self.records.get_or_convert(name, &self.datasets)
    }

    pub fn page(
        &self,
        name: DatasetName,
        first: usize,
        after: Option<&str>,
    ) -> Result<Connection<Record>, AtlasError> {
        let records = self.records(name)?;
        Ok(paginate(&records[..], first, after))
    }

    pub fn urgences_by_department(&self, code: &str) -> Result<Vec<Record>, AtlasError> {
        let snapshot = self.snapshot()?;
        let rows = snapshot
            .urgences
            .iter()
            .filter(|row| row.code.as_deref() == Some(code))
            .cloned()
            .collect::<Vec<_>>();
        to_records(&Dataset::Urgences(rows.into()))
    }

    /// Rows whose week-start date contains `date` (`2024-01` matches the month).
    pub fn urgences_by_date(&self, date: &str) -> Result<Vec<Record>, AtlasError> {
        let snapshot = self.snapshot()?;
        let rows = snapshot
            .urgences
            .iter()
            .filter(|row| row.data.week_start.to_string().contains(date))
            .cloned()
            .collect::<Vec<_>>();
        to_records(&Dataset::Urgences(rows.into()))
    }

    pub fn couvertures_by_department(&self, code: &str) -> Result<Vec<Record>, AtlasError> {
        let snapshot = self.snapshot()?;
        let rows = snapshot
            .couverture
            .iter()
            .filter(|row| row.code.as_deref() == Some(code))
            .cloned()
            .collect::<Vec<_>>();
        to_records(&Dataset::Couverture(rows.into()))
    }

    pub fn couvertures_by_year(&self, year: i32) -> Result<Vec<Record>, AtlasError> {
        let snapshot = self.snapshot()?;
        let rows = snapshot
            .couverture
            .iter()
            .filter(|row| row.data.annee == year)
            .cloned()
            .collect::<Vec<_>>();
        to_records(&Dataset::Couverture(rows.into()))
    }

    pub fn doses_by_campaign(&self, campaign: &str) -> Result<Vec<Record>, AtlasError> {
        let label: CampaignLabel = campaign.parse()?;
        let snapshot = self.snapshot()?;
        let rows = snapshot
            .doses
            .iter()
            .filter(|row| row.campagne == label)
            .cloned()
            .collect::<Vec<_>>();
        to_records(&Dataset::Doses(rows.into()))
    }

    pub fn stats(&self) -> Result<StatsResult, AtlasError> {
        let snapshot = self.snapshot()?;
        let er_rates = snapshot
            .urgences
            .iter()
            .map(|row| row.data.taux_grippe)
            .collect::<Vec<_>>();
        let coverage = snapshot
            .couverture
            .iter()
            .map(|row| row.data.grippe_totale)
            .collect::<Vec<_>>();
        Ok(StatsResult {
            stats_urgences: mean_of_present(&er_rates),
            stats_couverture: mean_of_present(&coverage),
        })
    }

    pub fn campaign_series(&self, kind: PredictionKind) -> Result<CampaignSeries, AtlasError> {
        let snapshot = self.snapshot()?;
        Ok(aggregate_campaigns(&snapshot.doses, kind.variable()))
    }

    pub fn predict(&self, start_year: i32, kind: PredictionKind) -> Result<Prediction, AtlasError> {
        let snapshot = self.snapshot()?;
        predict_campaign(&snapshot.doses, kind, start_year)
    }

    fn snapshot(&self) -> Result<Arc<DatasetSnapshot>, AtlasError> {
        self.datasets.snapshot()
    }
}
