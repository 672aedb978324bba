//! Linear trend over campaign seasons.
//!
//! The predictor is the position of a season in its series, never the label
//! itself: a series is trusted to already be in chronological order.
//!
//! ```text
//! value = intercept + slope * index        index = 0..N-1
//! ```
//!
//! Extrapolation assumes one campaign per calendar year with no gaps, so the
//! season starting in `year` sits at `N + (year - (last_start + 1))`.

use serde::Serialize;
use tracing::debug;

use crate::clean::DoseRow;
use crate::domain::{CampaignLabel, PredictionKind};
use crate::error::AtlasError;

/// Relative distance to an integer under which a prediction is snapped before
/// truncation, so that `159.99999999999997` does not become `159`.
const INTEGER_SNAP: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignPoint {
    pub label: CampaignLabel,
    pub value: f64,
}

/// Campaign aggregates in chronological (= list) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignSeries(Vec<CampaignPoint>);

impl CampaignSeries {
    pub fn new(points: Vec<CampaignPoint>) -> Self {
        Self(points)
    }

    /// Build from `(label, value)` pairs, normalizing label delimiters.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, AtlasError> {
        pairs
            .into_iter()
            .map(|(label, value)| {
                Ok(CampaignPoint {
                    label: label.parse()?,
                    value,
                })
            })
            .collect::<Result<Vec<_>, AtlasError>>()
            .map(Self)
    }

    pub fn points(&self) -> &[CampaignPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&CampaignPoint> {
        self.0.last()
    }
}

/// Sum `valeur` per campaign for one `variable`, keeping campaigns in the
/// order they first appear. Empty cells do not contribute.
pub fn aggregate_campaigns(rows: &[DoseRow], variable: &str) -> CampaignSeries {
    let mut points: Vec<CampaignPoint> = Vec::new();
    for row in rows.iter().filter(|row| row.variable == variable) {
        let value = row.valeur.unwrap_or(0.0);
        match points.iter_mut().find(|point| point.label == row.campagne) {
            Some(point) => point.value += value,
            None => points.push(CampaignPoint {
                label: row.campagne.clone(),
                value,
            }),
        }
    }
    CampaignSeries(points)
}

/// Ordinary least squares line over series positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearTrend {
    /// Fit `values[i] ~ intercept + slope * i`. A single value gives a flat
    /// line through it.
    pub fn fit(values: &[f64]) -> Result<Self, AtlasError> {
        match values {
            [] => Err(AtlasError::Validation(
                "cannot fit a trend on an empty campaign series".to_string(),
            )),
            [only] => Ok(Self {
                intercept: *only,
                slope: 0.0,
            }),
            _ => {
                let n = values.len() as f64;
                let mean_x = (n - 1.0) / 2.0;
                let mean_y = values.iter().sum::<f64>() / n;
                let (sxy, sxx) = values.iter().enumerate().fold(
                    (0.0, 0.0),
                    |(sxy, sxx), (i, y)| {
                        let dx = i as f64 - mean_x;
                        (sxy + dx * (y - mean_y), sxx + dx * dx)
                    },
                );
                let slope = sxy / sxx;
                Ok(Self {
                    intercept: mean_y - slope * mean_x,
                    slope,
                })
            }
        }
    }

    pub fn predict(&self, index: f64) -> f64 {
        self.intercept + self.slope * index
    }
}

/// Predict the value of the season starting in `start_year`, truncated toward
/// zero.
pub fn forecast(series: &CampaignSeries, start_year: i32) -> Result<i64, AtlasError> {
    let Some(last) = series.last() else {
        return Err(AtlasError::Validation(
            "no campaign data available to forecast from".to_string(),
        ));
    };
    let last_start = last.label.start_year();
    if start_year <= last_start {
        return Err(AtlasError::Validation(format!(
            "year {start_year} is already known or too old; choose a year after {last_start}"
        )));
    }

    let values = series.points().iter().map(|p| p.value).collect::<Vec<_>>();
    let trend = LinearTrend::fit(&values)?;

    let target_index =
        series.len() as f64 + (i64::from(start_year) - (i64::from(last_start) + 1)) as f64;
    let raw = trend.predict(target_index);
    if !raw.is_finite() {
        return Err(AtlasError::UnexpectedShape(format!(
            "trend produced a non-finite prediction for {start_year}"
        )));
    }
    debug!(
        intercept = trend.intercept,
        slope = trend.slope,
        target_index,
        raw,
        "campaign forecast"
    );

    let tolerance = INTEGER_SNAP * raw.abs().max(1.0);
    let snapped = if (raw - raw.round()).abs() < tolerance {
        raw.round()
    } else {
        raw
    };
    Ok(snapped.trunc() as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub campagne: CampaignLabel,
    pub annee_debut: i32,
    pub valeur_predite: i64,
    pub type_prediction: PredictionKind,
}

/// Aggregate the dose rows for `kind` and forecast the season starting in
/// `start_year`.
pub fn predict_campaign(
    rows: &[DoseRow],
    kind: PredictionKind,
    start_year: i32,
) -> Result<Prediction, AtlasError> {
    let campagne = CampaignLabel::for_start_year(start_year)?;
    let series = aggregate_campaigns(rows, kind.variable());
    let valeur_predite = forecast(&series, start_year)?;
    Ok(Prediction {
        campagne,
        annee_debut: start_year,
        valeur_predite,
        type_prediction: kind,
    })
}
