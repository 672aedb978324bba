use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use epi_atlas::app::App;
use epi_atlas::config::{CampaignSources, SourceEntry, SourcesConfig};
use epi_atlas::domain::{DatasetName, PredictionKind};
use epi_atlas::error::AtlasError;
use epi_atlas::pipeline::Dataset;
use epi_atlas::records::Record;
use epi_atlas::source::SourceReader;

const URGENCES: &str = "\
1er jour de la semaine;Semaine;Classe d'âge;Région;Département Code;Département;Taux de passages aux urgences pour grippe;Taux d'hospitalisations après passages aux urgences pour grippe;Taux d'actes médicaux SOS médecins pour grippe
2024-01-01;2024-S01;Tous âges;Auvergne-Rhône-Alpes;01;Ain;2.5;10;3
2024-01-08;2024-S02;Tous âges;Auvergne-Rhône-Alpes;01;Ain;1.5;NA;1
2024-02-05;2024-S06;Tous âges;Atlantis;99;Atlantide;;;
";

const COUVERTURE: &str = "\
Département,Département Code,Année,Région,Grippe moins de 65 ans à risque,Grippe 65 ans et plus
Ain,01,2023,Auvergne-Rhône-Alpes,30,50
Corse-du-Sud,2A,2023,Corse,20,
Ain,01,2022,Auvergne-Rhône-Alpes,28,52
Paris,75,2023,Île-de-France,25,45
";

const DEPARTEMENTS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "code": "01", "nom": "Ain" },
      "geometry": { "type": "Polygon", "coordinates": [[[5.0, 46.0], [5.5, 46.0], [5.5, 46.5], [5.0, 46.0]]] }
    },
    {
      "type": "Feature",
      "properties": { "code": "2A", "nom": "Corse-du-Sud" },
      "geometry": { "type": "Polygon", "coordinates": [[[8.5, 41.5], [9.0, 41.5], [9.0, 42.0], [8.5, 41.5]]] }
    },
    {
      "type": "Feature",
      "properties": { "code": "07", "nom": "Ardèche" },
      "geometry": null
    }
  ]
}"#;

const PHARMACIES: &str = "\
Nom;Adresse_codepostal
Pharmacie du Centre;01000
Pharmacie de la Gare;1500
Pharmacie sans adresse;
Pharmacie du Rhône;07000
";

const DOSES_2021: &str = "\
date,jour,variable,groupe,valeur
2021-10-22,1,DOSES(J07E1),65 ans et plus,60
2021-10-22,1,DOSES(J07E1),moins de 65 ans,40
2021-10-22,1,ACTE(VGP),65 ans et plus,7
";

const DOSES_2022: &str = "\
date,jour,variable,groupe,valeur
2022-10-18,1,DOSES(J07E1),65 ans et plus,120
2022-10-18,1,ACTE(VGP),65 ans et plus,9
";

const DOSES_2023: &str = "\
date,jour,variable,groupe,valeur
2023-10-17,1,DOSES(J07E1),65 ans et plus,140
2023-10-17,1,ACTE(VGP),65 ans et plus,11
";

/// Serves fixtures from memory. `calls` is shared so tests can keep counting
/// after the reader moves into the app.
struct MockReader {
    files: HashMap<&'static str, &'static str>,
    calls: Arc<Mutex<usize>>,
    failures: Mutex<usize>,
}

impl MockReader {
    fn new(calls: Arc<Mutex<usize>>) -> Self {
        let files = HashMap::from([
            ("urgences.csv", URGENCES),
            ("couverture.csv", COUVERTURE),
            ("departements.geojson", DEPARTEMENTS),
            ("pharmacies.csv", PHARMACIES),
            ("doses-2021.csv", DOSES_2021),
            ("doses-2022.csv", DOSES_2022),
            ("doses-2023.csv", DOSES_2023),
        ]);
        Self {
            files,
            calls,
            failures: Mutex::new(0),
        }
    }

    fn failing_once(self) -> Self {
        *self.failures.lock().unwrap() = 1;
        self
    }
}

impl SourceReader for MockReader {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, AtlasError> {
        *self.calls.lock().unwrap() += 1;
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(AtlasError::FetchStatus {
                location: location.to_string(),
                status: 503,
            });
        }
        self.files
            .get(location)
            .map(|content| content.as_bytes().to_vec())
            .ok_or_else(|| AtlasError::fetch(location, "no such fixture"))
    }
}

const FETCHES_PER_RUN: usize = 7;

fn sources() -> SourcesConfig {
    SourcesConfig {
        urgences: SourceEntry::new("urgences.csv").with_separator(';'),
        couverture_vaccinale: SourceEntry::new("couverture.csv"),
        geo_departements: SourceEntry::new("departements.geojson"),
        pharmacies: SourceEntry::new("pharmacies.csv").with_separator(';'),
        doses_campaigns: CampaignSources::new(vec![
            ("2021-2022".to_string(), "doses-2021.csv".to_string()),
            ("2022-2023".to_string(), "doses-2022.csv".to_string()),
            ("2023-2024".to_string(), "doses-2023.csv".to_string()),
        ]),
        couverture_campaigns: CampaignSources::default(),
        campagne_campaigns: CampaignSources::default(),
    }
}

fn app() -> (App<MockReader>, Arc<Mutex<usize>>) {
    let calls = Arc::new(Mutex::new(0));
    let app = App::new(MockReader::new(calls.clone()), sources());
    (app, calls)
}

fn calls(counter: &Arc<Mutex<usize>>) -> usize {
    *counter.lock().unwrap()
}

#[test]
fn dataset_cache_fetches_sources_once() {
    let (app, counter) = app();
    assert!(!app.dataset_cache().is_populated());

    let first = app.dataset(DatasetName::Urgences).unwrap();
    assert_eq!(calls(&counter), FETCHES_PER_RUN);

    let second = app.dataset(DatasetName::Urgences).unwrap();
    let doses = app.dataset(DatasetName::Doses).unwrap();
    assert_eq!(calls(&counter), FETCHES_PER_RUN);
    assert_eq!(first, second);
    assert_eq!(doses.len(), 7);
    assert!(app.dataset_cache().is_populated());
}

#[test]
fn record_cache_is_idempotent() {
    let (app, counter) = app();
    let first = app.records(DatasetName::Pharmacies).unwrap();
    let second = app.records(DatasetName::Pharmacies).unwrap();

    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(app.record_cache().len(), 1);
    assert_eq!(calls(&counter), FETCHES_PER_RUN);
}

#[test]
fn failed_population_is_not_cached() {
    let calls_counter = Arc::new(Mutex::new(0));
    let app = App::new(
        MockReader::new(calls_counter.clone()).failing_once(),
        sources(),
    );

    let error = app.records(DatasetName::Urgences).unwrap_err();
    assert_matches!(error, AtlasError::FetchStatus { status: 503, .. });
    assert!(!app.dataset_cache().is_populated());
    assert!(app.record_cache().is_empty());

    let records = app.records(DatasetName::Urgences).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(calls(&calls_counter), 1 + FETCHES_PER_RUN);
}

#[test]
fn concurrent_first_callers_share_one_population() {
    let (app, counter) = app();
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let records = app.records(DatasetName::Doses).unwrap();
                assert_eq!(records.len(), 7);
            });
        }
    });
    assert_eq!(calls(&counter), FETCHES_PER_RUN);
}

#[test]
fn unmatched_rows_keep_source_identity_without_geometry() {
    let (app, _) = app();
    let Dataset::Urgences(rows) = app.dataset(DatasetName::Urgences).unwrap() else {
        panic!("expected urgences rows");
    };

    assert!(rows[0].has_boundary());
    assert_eq!(rows[0].nom.as_deref(), Some("Ain"));
    assert!(!rows[2].has_boundary());
    assert_eq!(rows[2].code.as_deref(), Some("99"));
    assert_eq!(rows[2].nom.as_deref(), Some("Atlantide"));
}

#[test]
fn unmatched_coverage_rows_fall_back_to_their_own_code() {
    let (app, _) = app();
    let records = app.records(DatasetName::Couverture).unwrap();
    let coverage = records
        .iter()
        .map(|record| match record {
            Record::Couverture(c) => c,
            other => panic!("unexpected record {other:?}"),
        })
        .collect::<Vec<_>>();

    assert_eq!(coverage[1].code.as_deref(), Some("2A"));
    assert!(coverage[1].geometry.is_some());

    let paris = coverage[3];
    assert_eq!(paris.nom, "Paris");
    assert_eq!(paris.code.as_deref(), Some("75"));
    assert_eq!(paris.geometry, None);
    assert_eq!(paris.grippe_totale, Some(35.0));
}

#[test]
fn pharmacies_cover_every_boundary() {
    let (app, _) = app();
    let records = app.records(DatasetName::Pharmacies).unwrap();
    let counts = records
        .iter()
        .map(|record| match record {
            Record::Pharmacie(p) => (p.code.as_str(), p.nombre_pharmacies, p.geometry.is_some()),
            other => panic!("unexpected record {other:?}"),
        })
        .collect::<Vec<_>>();

    assert_eq!(
        counts,
        vec![("01", 2, true), ("2A", 0, true), ("07", 1, false)]
    );

    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["nombrePharmacies"], 2);
    let geometry: serde_json::Value =
        serde_json::from_str(json["geometry"].as_str().unwrap()).unwrap();
    assert_eq!(geometry["type"], "Polygon");
}

#[test]
fn preload_reports_every_dataset() {
    let (app, counter) = app();
    let result = app.preload().unwrap();

    let counts = result
        .datasets
        .iter()
        .map(|entry| (entry.dataset, entry.items))
        .collect::<Vec<_>>();
    assert_eq!(
        counts,
        vec![
            (DatasetName::Urgences, 3),
            (DatasetName::Couverture, 4),
            (DatasetName::Pharmacies, 3),
            (DatasetName::Doses, 7),
            (DatasetName::CouverturesCampagnes, 0),
            (DatasetName::Campagnes, 0),
        ]
    );
    assert_eq!(app.record_cache().len(), DatasetName::ALL.len());

    app.preload().unwrap();
    assert_eq!(calls(&counter), FETCHES_PER_RUN);
}

#[test]
fn pages_walk_the_cached_records() {
    let (app, _) = app();
    let first = app.page(DatasetName::Urgences, 2, None).unwrap();
    assert_eq!(first.edges.len(), 2);
    assert_eq!(first.total_count, 3);
    assert!(first.page_info.has_next_page);
    assert!(!first.page_info.has_previous_page);

    let end = first.page_info.end_cursor.clone().unwrap();
    let second = app.page(DatasetName::Urgences, 2, Some(end.as_str())).unwrap();
    assert_eq!(second.edges.len(), 1);
    assert!(!second.page_info.has_next_page);
    assert!(second.page_info.has_previous_page);
    assert_matches!(&second.edges[0].node, Record::Urgence(r) if r.code.as_deref() == Some("99"));
}

#[test]
fn filters_select_matching_rows() {
    let (app, _) = app();
    assert_eq!(app.urgences_by_department("01").unwrap().len(), 2);
    assert_eq!(app.urgences_by_date("2024-01").unwrap().len(), 2);
    assert_eq!(app.urgences_by_date("2024-02-05").unwrap().len(), 1);
    assert_eq!(app.couvertures_by_year(2023).unwrap().len(), 3);
    assert_eq!(app.couvertures_by_department("2A").unwrap().len(), 1);
    assert_eq!(app.couvertures_by_department("75").unwrap().len(), 1);
    assert!(app.couvertures_by_department("13").unwrap().is_empty());
    assert_eq!(app.doses_by_campaign("2022\u{2013}2023").unwrap().len(), 2);
    assert_matches!(
        app.doses_by_campaign("last winter"),
        Err(AtlasError::UnexpectedShape(_))
    );
}

#[test]
fn stats_average_present_values() {
    let (app, _) = app();
    let stats = app.stats().unwrap();
    assert!((stats.stats_urgences.unwrap() - 0.02).abs() < 1e-12);
    assert!((stats.stats_couverture.unwrap() - 33.75).abs() < 1e-9);
}

#[test]
fn predicts_next_campaigns() {
    let (app, _) = app();
    let series = app.campaign_series(PredictionKind::Doses).unwrap();
    let totals = series.points().iter().map(|p| p.value).collect::<Vec<_>>();
    assert_eq!(totals, vec![100.0, 120.0, 140.0]);

    let doses = app.predict(2024, PredictionKind::Doses).unwrap();
    assert_eq!(doses.valeur_predite, 160);
    assert_eq!(doses.campagne.as_str(), "2024-2025");

    let actes = app.predict(2026, PredictionKind::Actes).unwrap();
    assert_eq!(actes.valeur_predite, 17);

    let json = serde_json::to_value(&doses).unwrap();
    assert_eq!(json["anneeDebut"], 2024);
    assert_eq!(json["typePrediction"], "doses");

    assert_matches!(
        app.predict(2023, PredictionKind::Doses),
        Err(AtlasError::Validation(_))
    );
}
