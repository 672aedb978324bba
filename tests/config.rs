use std::fs;

use assert_matches::assert_matches;
use tempfile::TempDir;

use epi_atlas::config::{ConfigLoader, SourceEntry};
use epi_atlas::error::AtlasError;

const CONFIG: &str = r#"{
  "sources": {
    "urgences": { "url": "https://example.org/urgences.csv", "separator": ";" },
    "couverture_vaccinale": { "url": "https://example.org/couverture.csv" },
    "geo_departements": { "url": "data/departements.geojson" },
    "pharmacies": { "url": "file:///srv/pharmacies.csv.gz", "separator": ";" },
    "doses_campaigns": {
      "2021-2022": "https://example.org/doses-2021.csv",
      "2022-2023": "https://example.org/doses-2022.csv"
    }
  }
}"#;

#[test]
fn resolve_reads_explicit_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("atlas.json");
    fs::write(&path, CONFIG).unwrap();

    let sources = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(
        sources.urgences,
        SourceEntry::new("https://example.org/urgences.csv").with_separator(';')
    );
    assert_eq!(sources.couverture_vaccinale.separator, ',');
    assert_eq!(sources.doses_campaigns.len(), 2);
    let labels = sources
        .doses_campaigns
        .iter()
        .map(|(label, _)| label)
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["2021-2022", "2022-2023"]);
    assert!(sources.couverture_campaigns.is_empty());
    assert!(sources.campagne_campaigns.is_empty());
}

#[test]
fn unreadable_path_is_a_read_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(AtlasError::ConfigRead(_))
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert_matches!(
        ConfigLoader::parse(r#"{ "sources": { "urgences": 3 } }"#),
        Err(AtlasError::ConfigParse(_))
    );
}
