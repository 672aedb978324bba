//! The extract -> clean -> merge workflow behind the dataset cache.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::boundary::read_boundaries;
use crate::clean::{
    CampagneRow, CouvertureCampagneRow, CouvertureRow, DoseRow, UrgenceRow, clean_campagnes,
    clean_couverture, clean_couvertures_campagnes, clean_doses, clean_pharmacies, clean_urgences,
};
use crate::config::SourcesConfig;
use crate::domain::DatasetName;
use crate::error::AtlasError;
use crate::merge::{GeoRow, PharmacyDepartment, merge_couverture, merge_pharmacies, merge_urgences};
use crate::source::{SourceReader, read_multi_campaign, read_source};

/// One cleaned dataset. Clones share the underlying rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Urgences(Arc<[GeoRow<UrgenceRow>]>),
    Couverture(Arc<[GeoRow<CouvertureRow>]>),
    Pharmacies(Arc<[PharmacyDepartment]>),
    Doses(Arc<[DoseRow]>),
    CouverturesCampagnes(Arc<[CouvertureCampagneRow]>),
    Campagnes(Arc<[CampagneRow]>),
}

impl Dataset {
    pub fn name(&self) -> DatasetName {
        match self {
            Dataset::Urgences(_) => DatasetName::Urgences,
            Dataset::Couverture(_) => DatasetName::Couverture,
            Dataset::Pharmacies(_) => DatasetName::Pharmacies,
            Dataset::Doses(_) => DatasetName::Doses,
            Dataset::CouverturesCampagnes(_) => DatasetName::CouverturesCampagnes,
            Dataset::Campagnes(_) => DatasetName::Campagnes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::Urgences(rows) => rows.len(),
            Dataset::Couverture(rows) => rows.len(),
            Dataset::Pharmacies(rows) => rows.len(),
            Dataset::Doses(rows) => rows.len(),
            Dataset::CouverturesCampagnes(rows) => rows.len(),
            Dataset::Campagnes(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every dataset produced by one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSnapshot {
    pub urgences: Arc<[GeoRow<UrgenceRow>]>,
    pub couverture: Arc<[GeoRow<CouvertureRow>]>,
    pub pharmacies: Arc<[PharmacyDepartment]>,
    pub doses: Arc<[DoseRow]>,
    pub couvertures_campagnes: Arc<[CouvertureCampagneRow]>,
    pub campagnes: Arc<[CampagneRow]>,
}

impl DatasetSnapshot {
    pub fn get(&self, name: DatasetName) -> Dataset {
        match name {
            DatasetName::Urgences => Dataset::Urgences(self.urgences.clone()),
            DatasetName::Couverture => Dataset::Couverture(self.couverture.clone()),
            DatasetName::Pharmacies => Dataset::Pharmacies(self.pharmacies.clone()),
            DatasetName::Doses => Dataset::Doses(self.doses.clone()),
            DatasetName::CouverturesCampagnes => {
                Dataset::CouverturesCampagnes(self.couvertures_campagnes.clone())
            }
            DatasetName::Campagnes => Dataset::Campagnes(self.campagnes.clone()),
        }
    }
}

/// Run the full workflow once. Any failure aborts the whole run.
pub fn run_pipeline(
    reader: &dyn SourceReader,
    sources: &SourcesConfig,
) -> Result<DatasetSnapshot, AtlasError> {
    let start = Instant::now();

    let urgences = read_source(
        reader,
        DatasetName::Urgences.as_str(),
        &sources.urgences.url,
        sources.urgences.separator,
    )?;
    let couverture = read_source(
        reader,
        DatasetName::Couverture.as_str(),
        &sources.couverture_vaccinale.url,
        sources.couverture_vaccinale.separator,
    )?;
    let boundaries = read_boundaries(reader, &sources.geo_departements.url)?;
    let pharmacies = read_source(
        reader,
        DatasetName::Pharmacies.as_str(),
        &sources.pharmacies.url,
        sources.pharmacies.separator,
    )?;
    let doses = read_multi_campaign(
        reader,
        DatasetName::Doses.as_str(),
        &sources.doses_campaigns,
        ',',
    )?;
    let couvertures_campagnes = read_multi_campaign(
        reader,
        DatasetName::CouverturesCampagnes.as_str(),
        &sources.couverture_campaigns,
        ',',
    )?;
    let campagnes = read_multi_campaign(
        reader,
        DatasetName::Campagnes.as_str(),
        &sources.campagne_campaigns,
        ',',
    )?;

    let urgences = merge_urgences(&boundaries, clean_urgences(&urgences)?);
    let couverture = merge_couverture(&boundaries, clean_couverture(&couverture)?);
    let pharmacies = merge_pharmacies(&boundaries, &clean_pharmacies(&pharmacies)?);

    let snapshot = DatasetSnapshot {
        urgences: urgences.into(),
        couverture: couverture.into(),
        pharmacies: pharmacies.into(),
        doses: clean_doses(&doses)?.into(),
        couvertures_campagnes: clean_couvertures_campagnes(&couvertures_campagnes)?.into(),
        campagnes: clean_campagnes(&campagnes)?.into(),
    };

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pipeline finished"
    );
    Ok(snapshot)
}
