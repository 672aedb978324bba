//! Per-dataset cleaning: raw string tables become typed rows.
//!
//! Required columns are resolved up front and a missing one fails the whole
//! dataset. Empty cells in measure columns become `None`; anything else that
//! does not parse is an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::CampaignLabel;
use crate::error::AtlasError;
use crate::source::{CAMPAIGN_COLUMN, RawDataset};

pub mod columns {
    pub const WEEK_START: &str = "1er jour de la semaine";
    pub const WEEK: &str = "Semaine";
    pub const AGE_CLASS: &str = "Classe d'âge";
    pub const REGION: &str = "Région";
    pub const DEPARTMENT: &str = "Département";
    pub const DEPARTMENT_CODE: &str = "Département Code";
    pub const ER_FLU_RATE: &str = "Taux de passages aux urgences pour grippe";
    pub const ER_HOSPITALISATION_RATE: &str =
        "Taux d'hospitalisations après passages aux urgences pour grippe";
    pub const SOS_MEDECINS_RATE: &str = "Taux d'actes médicaux SOS médecins pour grippe";

    pub const YEAR: &str = "Année";
    pub const FLU_UNDER_65_AT_RISK: &str = "Grippe moins de 65 ans à risque";
    pub const FLU_65_PLUS: &str = "Grippe 65 ans et plus";
    pub const FLU_65_74: &str = "Grippe 65-74 ans";
    pub const FLU_75_PLUS: &str = "Grippe 75 ans et plus";
    pub const HPV_GIRLS_1_DOSE: &str = "HPV filles 1 dose à 15 ans";
    pub const HPV_GIRLS_2_DOSES: &str = "HPV filles 2 doses à 16 ans";
    pub const HPV_BOYS_1_DOSE: &str = "HPV garçons 1 dose à 15 ans";
    pub const HPV_BOYS_2_DOSES: &str = "HPV garçons 2 doses à 16 ans";
    pub const MENINGOCOCCUS_C_10_14: &str = "Méningocoque C 10-14 ans";
    pub const MENINGOCOCCUS_C_15_19: &str = "Méningocoque C 15-19 ans";
    pub const MENINGOCOCCUS_C_20_24: &str = "Méningocoque C 20-24 ans";
    pub const COVID_65_PLUS: &str = "Covid-19 65 ans et plus";

    pub const POSTAL_CODE: &str = "Adresse_codepostal";
}

/// One weekly emergency-room row, rates already divided by 100.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgenceRow {
    pub week_start: NaiveDate,
    pub semaine: String,
    pub classe_age: String,
    pub region: String,
    pub departement_code: String,
    pub departement: Option<String>,
    pub taux_grippe: Option<f64>,
    pub taux_hospitalisation: Option<f64>,
    pub taux_sos_medecins: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageRates {
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
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouvertureRow {
    pub departement: String,
    pub departement_code: Option<String>,
    pub annee: i32,
    pub region: Option<String>,
    pub rates: CoverageRates,
    /// Mean of the two flu age brackets that are present.
    pub grippe_totale: Option<f64>,
}

/// Number of pharmacies per two-character department code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PharmacyCounts(BTreeMap<String, u64>);

impl PharmacyCounts {
    pub fn get(&self, code: &str) -> Option<u64> {
        self.0.get(code).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(code, count)| (code.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoseRow {
    pub campagne: CampaignLabel,
    pub date: String,
    pub jour: Option<i64>,
    pub variable: String,
    pub groupe: String,
    pub valeur: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouvertureCampagneRow {
    pub region: String,
    pub code: Option<i64>,
    pub variable: String,
    pub groupe: String,
    pub valeur: Option<f64>,
    pub campagne: CampaignLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampagneRow {
    pub campagne: CampaignLabel,
    pub date: String,
    pub variable: String,
    pub valeur: Option<f64>,
    pub cible: Option<f64>,
}

pub fn clean_urgences(raw: &RawDataset) -> Result<Vec<UrgenceRow>, AtlasError> {
    let week_start = raw.column(columns::WEEK_START)?;
    let week = raw.column(columns::WEEK)?;
    let age_class = raw.column(columns::AGE_CLASS)?;
    let region = raw.column(columns::REGION)?;
    let code = raw.column(columns::DEPARTMENT_CODE)?;
    let name = raw.optional_column(columns::DEPARTMENT);
    let er_rate = raw.column(columns::ER_FLU_RATE)?;
    let hosp_rate = raw.column(columns::ER_HOSPITALISATION_RATE)?;
    let sos_rate = raw.column(columns::SOS_MEDECINS_RATE)?;

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            Ok(UrgenceRow {
                week_start: parse_date(&row[week_start])?,
                semaine: row[week].clone(),
                classe_age: row[age_class].clone(),
                region: row[region].clone(),
                departement_code: row[code].clone(),
                departement: name.and_then(|index| non_empty(&row[index])),
                taux_grippe: percent(parse_number(&row[er_rate], columns::ER_FLU_RATE)?),
                taux_hospitalisation: percent(parse_number(
                    &row[hosp_rate],
                    columns::ER_HOSPITALISATION_RATE,
                )?),
                taux_sos_medecins: percent(parse_number(
                    &row[sos_rate],
                    columns::SOS_MEDECINS_RATE,
                )?),
            })
        })
        .collect::<Result<Vec<_>, AtlasError>>()?;

    info!(rows = rows.len(), "urgences cleaned");
    Ok(rows)
}

pub fn clean_couverture(raw: &RawDataset) -> Result<Vec<CouvertureRow>, AtlasError> {
    let name = raw.column(columns::DEPARTMENT)?;
    let year = raw.column(columns::YEAR)?;
    let under_65 = raw.column(columns::FLU_UNDER_65_AT_RISK)?;
    let over_65 = raw.column(columns::FLU_65_PLUS)?;
    let code = raw.optional_column(columns::DEPARTMENT_CODE);
    let region = raw.optional_column(columns::REGION);

    let optional_rate = |row: &[String], column: &str| -> Result<Option<f64>, AtlasError> {
        match raw.optional_column(column) {
            Some(index) => parse_number(&row[index], column),
            None => Ok(None),
        }
    };

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            let row = row.as_slice();
            let rates = CoverageRates {
                hpv_filles_1_dose: optional_rate(row, columns::HPV_GIRLS_1_DOSE)?,
                hpv_filles_2_doses: optional_rate(row, columns::HPV_GIRLS_2_DOSES)?,
                hpv_garcons_1_dose: optional_rate(row, columns::HPV_BOYS_1_DOSE)?,
                hpv_garcons_2_doses: optional_rate(row, columns::HPV_BOYS_2_DOSES)?,
                meningocoque_c_10_14: optional_rate(row, columns::MENINGOCOCCUS_C_10_14)?,
                meningocoque_c_15_19: optional_rate(row, columns::MENINGOCOCCUS_C_15_19)?,
                meningocoque_c_20_24: optional_rate(row, columns::MENINGOCOCCUS_C_20_24)?,
                grippe_moins_65_risque: parse_number(&row[under_65], columns::FLU_UNDER_65_AT_RISK)?,
                grippe_65_plus: parse_number(&row[over_65], columns::FLU_65_PLUS)?,
                grippe_65_74: optional_rate(row, columns::FLU_65_74)?,
                grippe_75_plus: optional_rate(row, columns::FLU_75_PLUS)?,
                covid_65_plus: optional_rate(row, columns::COVID_65_PLUS)?,
            };
            let grippe_totale = mean_of_present(&[rates.grippe_moins_65_risque, rates.grippe_65_plus]);
            Ok(CouvertureRow {
                departement: row[name].clone(),
                departement_code: code.and_then(|index| non_empty(&row[index])),
                annee: parse_integer(&row[year], columns::YEAR)?
                    .ok_or_else(|| missing_value(columns::YEAR))? as i32,
                region: region.and_then(|index| non_empty(&row[index])),
                rates,
                grippe_totale,
            })
        })
        .collect::<Result<Vec<_>, AtlasError>>()?;

    info!(rows = rows.len(), "couverture cleaned");
    Ok(rows)
}

pub fn clean_pharmacies(raw: &RawDataset) -> Result<PharmacyCounts, AtlasError> {
    let postal = raw.column(columns::POSTAL_CODE)?;
    let mut counts = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &raw.rows {
        match department_from_postal_code(&row[postal]) {
            Some(code) => *counts.entry(code).or_insert(0u64) += 1,
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "pharmacies without postal code");
    }
    info!(departments = counts.len(), "pharmacies counted");
    Ok(PharmacyCounts(counts))
}

/// Left-pad a postal code to five characters and keep the first two.
pub fn department_from_postal_code(postal_code: &str) -> Option<String> {
    let trimmed = postal_code.trim();
    if trimmed.is_empty() {
        return None;
    }
    let padded = format!("{trimmed:0>5}");
    Some(padded.chars().take(2).collect())
}

pub fn clean_doses(raw: &RawDataset) -> Result<Vec<DoseRow>, AtlasError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let campaign = raw.column(CAMPAIGN_COLUMN)?;
    let date = raw.column("date")?;
    let day = raw.column("jour")?;
    let variable = raw.column("variable")?;
    let group = raw.column("groupe")?;
    let value = raw.column("valeur")?;

    raw.rows
        .iter()
        .map(|row| {
            Ok(DoseRow {
                campagne: row[campaign].parse()?,
                date: row[date].clone(),
                jour: parse_integer(&row[day], "jour")?,
                variable: row[variable].clone(),
                groupe: row[group].clone(),
                valeur: parse_number(&row[value], "valeur")?,
            })
        })
        .collect()
}

pub fn clean_couvertures_campagnes(
    raw: &RawDataset,
) -> Result<Vec<CouvertureCampagneRow>, AtlasError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let region = raw.column("region")?;
    let code = raw.column("code")?;
    let variable = raw.column("variable")?;
    let group = raw.column("groupe")?;
    let value = raw.column("valeur")?;
    let campaign = raw.column(CAMPAIGN_COLUMN)?;

    raw.rows
        .iter()
        .map(|row| {
            Ok(CouvertureCampagneRow {
                region: row[region].clone(),
                code: parse_integer(&row[code], "code")?,
                variable: row[variable].clone(),
                groupe: row[group].clone(),
                valeur: parse_number(&row[value], "valeur")?,
                campagne: row[campaign].parse()?,
            })
        })
        .collect()
}

pub fn clean_campagnes(raw: &RawDataset) -> Result<Vec<CampagneRow>, AtlasError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let campaign = raw.column(CAMPAIGN_COLUMN)?;
    let date = raw.column("date")?;
    let variable = raw.column("variable")?;
    let value = raw.column("valeur")?;
    let target = raw.column("cible")?;

    raw.rows
        .iter()
        .map(|row| {
            Ok(CampagneRow {
                campagne: row[campaign].parse()?,
                date: row[date].clone(),
                variable: row[variable].clone(),
                valeur: parse_number(&row[value], "valeur")?,
                cible: parse_number(&row[target], "cible")?,
            })
        })
        .collect()
}

/// Average of the values that are present; `None` when none are.
pub fn mean_of_present(values: &[Option<f64>]) -> Option<f64> {
    let present = values.iter().flatten().copied().collect::<Vec<_>>();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

fn percent(value: Option<f64>) -> Option<f64> {
    value.map(|v| v / 100.0)
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

fn is_missing(cell: &str) -> bool {
    matches!(cell, "" | "NA" | "N/A" | "NaN" | "nan" | "null")
}

fn missing_value(column: &str) -> AtlasError {
    AtlasError::UnexpectedShape(format!("empty value in required column '{column}'"))
}

fn parse_number(cell: &str, column: &str) -> Result<Option<f64>, AtlasError> {
    let cell = cell.trim();
    if is_missing(cell) {
        return Ok(None);
    }
    cell.parse::<f64>().map(Some).map_err(|_| {
        AtlasError::UnexpectedShape(format!("column '{column}': '{cell}' is not a number"))
    })
}

fn parse_integer(cell: &str, column: &str) -> Result<Option<i64>, AtlasError> {
    let Some(value) = parse_number(cell, column)? else {
        return Ok(None);
    };
    if value.fract() != 0.0 {
        return Err(AtlasError::UnexpectedShape(format!(
            "column '{column}': '{cell}' is not an integer"
        )));
    }
    Ok(Some(value as i64))
}

fn parse_date(cell: &str) -> Result<NaiveDate, AtlasError> {
    let cell = cell.trim();
    let head = cell.get(..10).unwrap_or(cell);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(cell, "%d/%m/%Y"))
        .map_err(|_| {
            AtlasError::UnexpectedShape(format!(
                "column '{}': '{cell}' is not a date",
                columns::WEEK_START
            ))
        })
}
