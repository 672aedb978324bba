//! Department boundary polygons read from a GeoJSON `FeatureCollection`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::AtlasError;
use crate::source::SourceReader;

/// A GeoJSON position; a third element (altitude) is kept when present.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// GeoJSON text of the geometry, as sent to clients.
    pub fn to_geojson(&self) -> Result<String, AtlasError> {
        serde_json::to_string(self)
            .map_err(|err| AtlasError::UnexpectedShape(format!("geometry serialization: {err}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoBoundary {
    pub code: String,
    pub nom: String,
    pub geometry: Option<Arc<Geometry>>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Map<String, Value>,
    geometry: Option<Geometry>,
}

pub fn parse_boundaries(name: &str, bytes: &[u8]) -> Result<Vec<GeoBoundary>, AtlasError> {
    let collection: FeatureCollection =
        serde_json::from_slice(bytes).map_err(|err| AtlasError::fetch(name, err))?;

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            Ok(GeoBoundary {
                code: property(&feature.properties, "code", index)?,
                nom: property(&feature.properties, "nom", index)?,
                geometry: feature.geometry.map(Arc::new),
            })
        })
        .collect()
}

fn property(properties: &Map<String, Value>, key: &str, index: usize) -> Result<String, AtlasError> {
    match properties.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Number(value)) => Ok(value.to_string()),
        _ => Err(AtlasError::UnexpectedShape(format!(
            "boundary feature {index} has no '{key}' property"
        ))),
    }
}

pub fn read_boundaries(
    reader: &dyn SourceReader,
    location: &str,
) -> Result<Vec<GeoBoundary>, AtlasError> {
    let boundaries = parse_boundaries("departements", &reader.fetch(location)?)?;
    info!(features = boundaries.len(), "boundaries loaded");
    Ok(boundaries)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "code": "01", "nom": "Ain" },
                "geometry": { "type": "Polygon", "coordinates": [[[5.0, 46.0], [5.5, 46.0], [5.0, 46.5], [5.0, 46.0]]] }
            },
            {
                "type": "Feature",
                "properties": { "code": "2A", "nom": "Corse-du-Sud" },
                "geometry": { "type": "MultiPolygon", "coordinates": [[[[8.0, 41.0], [9.0, 41.0], [8.0, 42.0], [8.0, 41.0]]]] }
            }
        ]
    }"#;

    #[test]
    fn parses_polygons_and_multipolygons() {
        let boundaries = parse_boundaries("departements", COLLECTION.as_bytes()).unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].code, "01");
        assert_matches!(boundaries[0].geometry.as_deref(), Some(Geometry::Polygon(_)));
        assert_matches!(boundaries[1].geometry.as_deref(), Some(Geometry::MultiPolygon(_)));
    }

    #[test]
    fn geometry_serializes_back_to_geojson() {
        let boundaries = parse_boundaries("departements", COLLECTION.as_bytes()).unwrap();
        let text = boundaries[0].geometry.as_ref().unwrap().to_geojson().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "Polygon");
        assert_eq!(value["coordinates"][0][1][0], 5.5);
    }

    #[test]
    fn missing_code_property_is_rejected() {
        let json = r#"{"features":[{"properties":{"nom":"Ain"},"geometry":null}]}"#;
        let err = parse_boundaries("departements", json.as_bytes()).unwrap_err();
        assert_matches!(err, AtlasError::UnexpectedShape(_));
    }
}
