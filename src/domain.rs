use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AtlasError;

/// Dash-like characters that sources use between the two years of a season.
const SEASON_DASHES: [char; 7] = [
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2212}', '/',
];

static SEASON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{4})$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    Urgences,
    Couverture,
    Pharmacies,
    Doses,
    CouverturesCampagnes,
    Campagnes,
}

impl DatasetName {
    pub const ALL: [DatasetName; 6] = [
        DatasetName::Urgences,
        DatasetName::Couverture,
        DatasetName::Pharmacies,
        DatasetName::Doses,
        DatasetName::CouverturesCampagnes,
        DatasetName::Campagnes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::Urgences => "urgences",
            DatasetName::Couverture => "couverture",
            DatasetName::Pharmacies => "pharmacies",
            DatasetName::Doses => "doses",
            DatasetName::CouverturesCampagnes => "couvertures_campagnes",
            DatasetName::Campagnes => "campagnes",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = AtlasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        DatasetName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| AtlasError::UnknownDataset(value.to_string()))
    }
}

/// Season label such as `2023-2024`, stored with an ASCII hyphen whatever
/// dash the source used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CampaignLabel {
    label: String,
    start_year: i32,
}

impl CampaignLabel {
    pub fn for_start_year(start_year: i32) -> Result<Self, AtlasError> {
        let end_year = start_year.checked_add(1).ok_or_else(|| {
            AtlasError::Validation(format!("no campaign can start in year {start_year}"))
        })?;
        Ok(Self {
            label: format!("{start_year}-{end_year}"),
            start_year,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }
}

impl fmt::Display for CampaignLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl FromStr for CampaignLabel {
    type Err = AtlasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_season_delimiter(value.trim());
        let captures = SEASON_RE.captures(&normalized).ok_or_else(|| {
            AtlasError::UnexpectedShape(format!("invalid campaign label '{value}'"))
        })?;
        let start_year = captures[1]
            .parse::<i32>()
            .map_err(|err| AtlasError::UnexpectedShape(format!("campaign label '{value}': {err}")))?;
        Ok(Self {
            label: normalized,
            start_year,
        })
    }
}

impl TryFrom<String> for CampaignLabel {
    type Error = AtlasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CampaignLabel> for String {
    fn from(value: CampaignLabel) -> Self {
        value.label
    }
}

pub fn normalize_season_delimiter(value: &str) -> String {
    value
        .chars()
        .map(|ch| if SEASON_DASHES.contains(&ch) { '-' } else { ch })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    Doses,
    Actes,
}

impl PredictionKind {
    /// Value of the `variable` column aggregated for this kind.
    pub fn variable(&self) -> &'static str {
        match self {
            PredictionKind::Doses => "DOSES(J07E1)",
            PredictionKind::Actes => "ACTE(VGP)",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionKind::Doses => write!(f, "doses"),
            PredictionKind::Actes => write!(f, "actes"),
        }
    }
}

impl FromStr for PredictionKind {
    type Err = AtlasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "doses" => Ok(PredictionKind::Doses),
            "actes" => Ok(PredictionKind::Actes),
            other => Err(AtlasError::Validation(format!(
                "prediction type must be 'doses' or 'actes', got '{other}'"
            ))),
        }
    }
}
