use std::fmt;
use std::fs;

use camino::Utf8PathBuf;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AtlasError;

pub const DEFAULT_CONFIG_FILE: &str = "epi-atlas.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    pub urgences: SourceEntry,
    pub couverture_vaccinale: SourceEntry,
    pub geo_departements: SourceEntry,
    pub pharmacies: SourceEntry,
    #[serde(default)]
    pub doses_campaigns: CampaignSources,
    #[serde(default)]
    pub couverture_campaigns: CampaignSources,
    #[serde(default)]
    pub campagne_campaigns: CampaignSources,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceEntry {
    pub url: String,
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl SourceEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            separator: default_separator(),
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }
}

fn default_separator() -> char {
    ','
}

/// `label -> location` pairs in the order they appear in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignSources(Vec<(String, String)>);

impl CampaignSources {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(label, location)| (label.as_str(), location.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for CampaignSources {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = CampaignSources;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of campaign label to source location")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, location)) = map.next_entry::<String, String>()? {
                    entries.push((label, location));
                }
                Ok(CampaignSources(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

impl Serialize for CampaignSources {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<SourcesConfig, AtlasError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Err(AtlasError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| AtlasError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<SourcesConfig, AtlasError> {
        let config: Config =
            serde_json::from_str(content).map_err(|err| AtlasError::ConfigParse(err.to_string()))?;
        Ok(config.sources)
    }
}
