//! Flat, transport-ready records derived from cached datasets.
//!
//! Conversion is deterministic: records come out in dataset row order and
//! geometry is pre-serialized to GeoJSON text.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::boundary::Geometry;
use crate::error::AtlasError;
use crate::pipeline::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgenceRecord {
    pub code: Option<String>,
    pub nom: Option<String>,
    pub date: String,
    pub semaine: String,
    pub classe_age: String,
    pub region: String,
    pub taux_grippe: Option<f64>,
    pub taux_hospitalisation: Option<f64>,
    pub taux_sos_medecins: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouvertureRecord {
    pub code: Option<String>,
    pub nom: String,
    pub annee: i32,
    pub hpv_filles_1_dose: Option<f64>,
    pub hpv_filles_2_doses: Option<f64>,
    pub hpv_garcons_1_dose: Option<f64>,
    pub hpv_garcons_2_doses: Option<f64>,
    pub meningocoque_c_10_14: Option<f64>,
    pub meningocoque_c_15_19: Option<f64>,
    pub meningocoque_c_20_24: Option<f64>,
    pub grippe_moins_65_risque: Option<f64>,
    pub grippe_65_plus: Option<f64>,
    pub grippe_65_74: Option<f64>,
    pub grippe_75_plus: Option<f64>,
    pub covid_65_plus: Option<f64>,
    pub grippe_totale: Option<f64>,
    pub region: Option<String>,
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacieRecord {
    pub code: String,
    pub nom: String,
    pub nombre_pharmacies: u64,
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseRecord {
    pub campagne: String,
    pub date: String,
    pub jour: Option<i64>,
    pub variable: String,
    pub groupe: String,
    pub valeur: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouvertureCampagneRecord {
    pub region: String,
    pub code: Option<i64>,
    pub variable: String,
    pub groupe: String,
    pub valeur: Option<i64>,
    pub campagne: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampagneRecord {
    pub campagne: String,
    pub date: String,
    pub variable: String,
    pub valeur: Option<i64>,
    pub cible: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Urgence(UrgenceRecord),
    Couverture(CouvertureRecord),
    Pharmacie(PharmacieRecord),
    Dose(DoseRecord),
    CouvertureCampagne(CouvertureCampagneRecord),
    Campagne(CampagneRecord),
}

/// Serializes each distinct geometry once; rows of the same department share
/// one `Arc`.
#[derive(Default)]
struct GeometryText {
    seen: HashMap<usize, String>,
}

impl GeometryText {
    fn text(&mut self, geometry: Option<&Arc<Geometry>>) -> Result<Option<String>, AtlasError> {
        let Some(geometry) = geometry else {
            return Ok(None);
        };
        let key = Arc::as_ptr(geometry) as usize;
        if let Some(text) = self.seen.get(&key) {
            return Ok(Some(text.clone()));
        }
        let text = geometry.to_geojson()?;
        self.seen.insert(key, text.clone());
        Ok(Some(text))
    }
}

fn whole(value: Option<f64>) -> Option<i64> {
    value.map(|v| v.trunc() as i64)
}

pub fn to_records(dataset: &Dataset) -> Result<Vec<Record>, AtlasError> {
    let mut geometry = GeometryText::default();
    let records = match dataset {
        Dataset::Urgences(rows) => rows
            .iter()
            .map(|row| {
                Record::Urgence(UrgenceRecord {
                    code: row.code.clone(),
                    nom: row.nom.clone(),
                    date: row.data.week_start.to_string(),
                    semaine: row.data.semaine.clone(),
                    classe_age: row.data.classe_age.clone(),
                    region: row.data.region.clone(),
                    taux_grippe: row.data.taux_grippe,
                    taux_hospitalisation: row.data.taux_hospitalisation,
                    taux_sos_medecins: row.data.taux_sos_medecins,
                })
            })
            .collect(),
        Dataset::Couverture(rows) => rows
            .iter()
            .map(|row| {
                let rates = &row.data.rates;
                Ok(Record::Couverture(CouvertureRecord {
                    code: row.code.clone(),
                    nom: row.data.departement.clone(),
                    annee: row.data.annee,
                    hpv_filles_1_dose: rates.hpv_filles_1_dose,
                    hpv_filles_2_doses: rates.hpv_filles_2_doses,
                    hpv_garcons_1_dose: rates.hpv_garcons_1_dose,
                    hpv_garcons_2_doses: rates.hpv_garcons_2_doses,
                    meningocoque_c_10_14: rates.meningocoque_c_10_14,
                    meningocoque_c_15_19: rates.meningocoque_c_15_19,
                    meningocoque_c_20_24: rates.meningocoque_c_20_24,
                    grippe_moins_65_risque: rates.grippe_moins_65_risque,
                    grippe_65_plus: rates.grippe_65_plus,
                    grippe_65_74: rates.grippe_65_74,
                    grippe_75_plus: rates.grippe_75_plus,
                    covid_65_plus: rates.covid_65_plus,
                    grippe_totale: row.data.grippe_totale,
                    region: row.data.region.clone(),
                    geometry: geometry.text(row.geometry.as_ref())?,
                }))
            })
            .collect::<Result<Vec<_>, AtlasError>>()?,
        Dataset::Pharmacies(rows) => rows
            .iter()
            .map(|row| {
                Ok(Record::Pharmacie(PharmacieRecord {
                    code: row.code.clone(),
                    nom: row.nom.clone(),
                    nombre_pharmacies: row.pharmacy_count,
                    geometry: geometry.text(row.geometry.as_ref())?,
                }))
            })
            .collect::<Result<Vec<_>, AtlasError>>()?,
        Dataset::Doses(rows) => rows
            .iter()
            .map(|row| {
                Record::Dose(DoseRecord {
                    campagne: row.campagne.to_string(),
                    date: row.date.clone(),
                    jour: row.jour,
                    variable: row.variable.clone(),
                    groupe: row.groupe.clone(),
                    valeur: whole(row.valeur),
                })
            })
            .collect(),
        Dataset::CouverturesCampagnes(rows) => rows
            .iter()
            .map(|row| {
                Record::CouvertureCampagne(CouvertureCampagneRecord {
                    region: row.region.clone(),
                    code: row.code,
                    variable: row.variable.clone(),
                    groupe: row.groupe.clone(),
                    valeur: whole(row.valeur),
                    campagne: row.campagne.to_string(),
                })
            })
            .collect(),
        Dataset::Campagnes(rows) => rows
            .iter()
            .map(|row| {
                Record::Campagne(CampagneRecord {
                    campagne: row.campagne.to_string(),
                    date: row.date.clone(),
                    variable: row.variable.clone(),
                    valeur: whole(row.valeur),
                    cible: whole(row.cible),
                })
            })
            .collect(),
    };
    Ok(records)
}
