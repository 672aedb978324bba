//! Source reading: the fetch primitive and raw tabular datasets.
//!
//! Nothing here caches. Every call goes back to the location, which is why
//! the pipeline only runs behind [`crate::cache::DatasetCache`].

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::config::CampaignSources;
use crate::error::AtlasError;

pub const CAMPAIGN_COLUMN: &str = "campagne";

/// Fetches the raw bytes behind a configured location.
pub trait SourceReader: Send + Sync {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, AtlasError>;
}

#[derive(Clone)]
pub struct HttpSourceReader {
    client: Client,
}

impl HttpSourceReader {
    pub fn new() -> Result<Self, AtlasError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("epi-atlas/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AtlasError::fetch("client", err))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AtlasError::fetch("client", err))?;
        Ok(Self { client })
    }

    fn fetch_remote(&self, location: &str) -> Result<Vec<u8>, AtlasError> {
        let response = self
            .client
            .get(location)
            .send()
            .map_err(|err| AtlasError::fetch(location, err))?;
        if !response.status().is_success() {
            return Err(AtlasError::FetchStatus {
                location: location.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .map_err(|err| AtlasError::fetch(location, err))?;
        Ok(bytes.to_vec())
    }
}

impl SourceReader for HttpSourceReader {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, AtlasError> {
        let bytes = if is_remote(location) {
            self.fetch_remote(location)?
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            std::fs::read(path).map_err(|err| AtlasError::fetch(location, err))?
        };

        if location.ends_with(".gz") {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|err| AtlasError::fetch(location, err))?;
            return Ok(out);
        }
        Ok(bytes)
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// A loosely-typed table exactly as fetched: headers plus string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataset {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawDataset {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a required column.
    pub fn column(&self, column: &str) -> Result<usize, AtlasError> {
        self.optional_column(column)
            .ok_or_else(|| AtlasError::MissingColumn {
                dataset: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn optional_column(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }

    pub fn parse_csv(name: &str, bytes: &[u8], separator: char) -> Result<Self, AtlasError> {
        let delimiter = u8::try_from(separator).map_err(|_| {
            AtlasError::UnexpectedShape(format!("separator '{separator}' is not a single byte"))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|err| AtlasError::fetch(name, err))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| AtlasError::fetch(name, err))?;
            let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }
}

/// Fetch and parse one tabular source.
pub fn read_source(
    reader: &dyn SourceReader,
    name: &str,
    location: &str,
    separator: char,
) -> Result<RawDataset, AtlasError> {
    let bytes = reader.fetch(location)?;
    let dataset = RawDataset::parse_csv(name, &bytes, separator)?;
    info!(dataset = name, rows = dataset.len(), "source loaded");
    Ok(dataset)
}

/// Fetch every season in caller order, tag rows with their season label and
/// concatenate them. Columns are the union of all seasons' headers in
/// first-seen order; cells a season lacks stay empty.
pub fn read_multi_campaign(
    reader: &dyn SourceReader,
    name: &str,
    sources: &CampaignSources,
    separator: char,
) -> Result<RawDataset, AtlasError> {
    let mut combined = RawDataset::empty(name);
    for (label, location) in sources.iter() {
        debug!(dataset = name, campaign = label, "loading campaign");
        let season = RawDataset::parse_csv(name, &reader.fetch(location)?, separator)?;
        append_season(&mut combined, season, label);
    }
    info!(
        dataset = name,
        campaigns = sources.len(),
        rows = combined.len(),
        "campaign sources loaded"
    );
    Ok(combined)
}

fn append_season(combined: &mut RawDataset, season: RawDataset, label: &str) {
    let mut mapping = Vec::with_capacity(season.headers.len());
    for header in &season.headers {
        if header == CAMPAIGN_COLUMN {
            mapping.push(None);
            continue;
        }
        let index = match combined.optional_column(header) {
            Some(index) => index,
            None => {
                combined.headers.push(header.clone());
                for row in &mut combined.rows {
                    row.push(String::new());
                }
                combined.headers.len() - 1
            }
        };
        mapping.push(Some(index));
    }

    let campaign_index = match combined.optional_column(CAMPAIGN_COLUMN) {
        Some(index) => index,
        None => {
            combined.headers.push(CAMPAIGN_COLUMN.to_string());
            for row in &mut combined.rows {
                row.push(String::new());
            }
            combined.headers.len() - 1
        }
    };

    for cells in season.rows {
        let mut row = vec![String::new(); combined.headers.len()];
        for (cell, target) in cells.into_iter().zip(&mapping) {
            if let Some(index) = target {
                row[*index] = cell;
            }
        }
        row[campaign_index] = label.to_string();
        combined.rows.push(row);
    }
}
