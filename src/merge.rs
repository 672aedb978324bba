//! Joins cleaned tables with department boundaries.
//!
//! Two policies: data-driven joins keep every data row and attach a boundary
//! when one matches, boundary-driven joins keep every boundary and default
//! missing counts to zero. Neither fails on a missing match. When several
//! boundaries share a key the first one wins.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::boundary::{GeoBoundary, Geometry};
use crate::clean::{CouvertureRow, PharmacyCounts, UrgenceRow};

/// A data row with the department attributes of its matching boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRow<T> {
    pub data: T,
    pub code: Option<String>,
    pub nom: Option<String>,
    pub geometry: Option<Arc<Geometry>>,
}

impl<T> GeoRow<T> {
    pub fn has_boundary(&self) -> bool {
        self.geometry.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PharmacyDepartment {
    pub code: String,
    pub nom: String,
    pub pharmacy_count: u64,
    pub geometry: Option<Arc<Geometry>>,
}

fn index_by<'a>(
    boundaries: &'a [GeoBoundary],
    key: impl Fn(&GeoBoundary) -> &str,
) -> HashMap<&'a str, &'a GeoBoundary> {
    let mut index = HashMap::with_capacity(boundaries.len());
    for boundary in boundaries {
        index.entry(key(boundary)).or_insert(boundary);
    }
    index
}

/// ER rows join on department code.
pub fn merge_urgences(boundaries: &[GeoBoundary], rows: Vec<UrgenceRow>) -> Vec<GeoRow<UrgenceRow>> {
    let index = index_by(boundaries, |b| b.code.as_str());
    let mut unmatched = 0usize;
    let merged = rows
        .into_iter()
        .map(|row| match index.get(row.departement_code.as_str()) {
            Some(boundary) => GeoRow {
                code: Some(boundary.code.clone()),
                nom: Some(boundary.nom.clone()),
                geometry: boundary.geometry.clone(),
                data: row,
            },
            None => {
                unmatched += 1;
                GeoRow {
                    code: Some(row.departement_code.clone()),
                    nom: row.departement.clone(),
                    geometry: None,
                    data: row,
                }
            }
        })
        .collect();
    debug!(unmatched, "urgences merged");
    merged
}

/// Coverage rows join on department name.
pub fn merge_couverture(
    boundaries: &[GeoBoundary],
    rows: Vec<CouvertureRow>,
) -> Vec<GeoRow<CouvertureRow>> {
    let index = index_by(boundaries, |b| b.nom.as_str());
    let mut unmatched = 0usize;
    let merged = rows
        .into_iter()
        .map(|row| match index.get(row.departement.as_str()) {
            Some(boundary) => GeoRow {
                code: Some(boundary.code.clone()),
                nom: Some(boundary.nom.clone()),
                geometry: boundary.geometry.clone(),
                data: row,
            },
            None => {
                unmatched += 1;
                GeoRow {
                    code: row.departement_code.clone(),
                    nom: Some(row.departement.clone()),
                    geometry: None,
                    data: row,
                }
            }
        })
        .collect();
    debug!(unmatched, "couverture merged");
    merged
}

/// One row per boundary, in boundary order.
pub fn merge_pharmacies(
    boundaries: &[GeoBoundary],
    counts: &PharmacyCounts,
) -> Vec<PharmacyDepartment> {
    boundaries
        .iter()
        .map(|boundary| PharmacyDepartment {
            code: boundary.code.clone(),
            nom: boundary.nom.clone(),
            pharmacy_count: counts.get(&boundary.code).unwrap_or(0),
            geometry: boundary.geometry.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::source::RawDataset;

    use super::*;

    fn boundary(code: &str, nom: &str) -> GeoBoundary {
        GeoBoundary {
            code: code.to_string(),
            nom: nom.to_string(),
            geometry: Some(Arc::new(Geometry::Polygon(vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.0, 0.0],
            ]]))),
        }
    }

    #[test]
    fn unmatched_pharmacy_departments_count_zero() {
        let raw = RawDataset::parse_csv("pharmacies", b"Adresse_codepostal\n1000\n1200\n", ',').unwrap();
        let counts = crate::clean::clean_pharmacies(&raw).unwrap();
        let merged = merge_pharmacies(&[boundary("01", "Ain"), boundary("02", "Aisne")], &counts);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].pharmacy_count, 2);
        assert_eq!(merged[1].code, "02");
        assert_eq!(merged[1].pharmacy_count, 0);
    }

    #[test]
    fn unmatched_coverage_rows_keep_their_own_identity() {
        let row = |departement: &str, code: Option<&str>| CouvertureRow {
            departement: departement.to_string(),
            departement_code: code.map(str::to_string),
            annee: 2023,
            region: None,
            rates: Default::default(),
            grippe_totale: None,
        };
        let merged = merge_couverture(
            &[boundary("01", "Ain")],
            vec![row("Ain", None), row("Paris", Some("75")), row("Atlantide", None)],
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].code.as_deref(), Some("01"));
        assert!(merged[0].has_boundary());
        assert_eq!(merged[1].code.as_deref(), Some("75"));
        assert_eq!(merged[1].nom.as_deref(), Some("Paris"));
        assert!(!merged[1].has_boundary());
        assert_eq!(merged[2].code, None);
        assert!(!merged[2].has_boundary());
    }

    #[test]
    fn duplicate_boundary_keys_keep_first() {
        let boundaries = vec![boundary("01", "Ain"), boundary("01", "Ain bis")];
        let index = index_by(&boundaries, |b| b.code.as_str());
        assert_eq!(index["01"].nom, "Ain");
    }
}
