/// Area-of-interest geometry for the RVI forecasting service.
///
/// An AOI is a single polygon given in GeoJSON form, either as a Feature
/// (`{"type": "Feature", "geometry": {...}}`) or a bare Polygon geometry.
/// Named AOIs can also be declared in the `[[area]]` tables of the config
/// file, pointing at a GeoJSON file or carrying inline coordinates.

use std::path::{Path, PathBuf};

use geo::BoundingRect;
use geo_types::{Coord, LineString};
use serde::Deserialize;

use crate::model::AoiError;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A `[longitude, latitude]` pair in WGS84 degrees.
pub type Position = [f64; 2];

/// A validated AOI polygon. The first ring is the outer boundary; any
/// further rings are holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    shape: geo_types::Polygon<f64>,
}

impl Polygon {
    /// Validates ring structure and coordinate ranges.
    pub fn new(rings: Vec<Vec<Position>>) -> Result<Self, AoiError> {
        if rings.is_empty() {
            return Err(AoiError::InvalidCoordinates("polygon has no rings".to_string()));
        }
        for (i, ring) in rings.iter().enumerate() {
            if ring.len() < 4 {
                return Err(AoiError::InvalidCoordinates(format!(
                    "ring {} has {} positions, need at least 4",
                    i,
                    ring.len()
                )));
            }
            if ring.first() != ring.last() {
                return Err(AoiError::InvalidCoordinates(format!("ring {} is not closed", i)));
            }
            for [lon, lat] in ring {
                if !(-180.0..=180.0).contains(lon) || !(-90.0..=90.0).contains(lat) {
                    return Err(AoiError::InvalidCoordinates(format!(
                        "position [{}, {}] is out of range",
                        lon, lat
                    )));
                }
            }
        }

        let mut rings = rings.into_iter().map(|ring| {
            LineString::from(ring.into_iter().map(|[x, y]| Coord { x, y }).collect::<Vec<_>>())
        });
        let exterior = rings
            .next()
            .ok_or_else(|| AoiError::InvalidCoordinates("polygon has no rings".to_string()))?;
        Ok(Self {
            shape: geo_types::Polygon::new(exterior, rings.collect()),
        })
    }

    /// Rings as `[lon, lat]` lists, outer ring first.
    pub fn rings(&self) -> Vec<Vec<Position>> {
        std::iter::once(self.shape.exterior())
            .chain(self.shape.interiors())
            .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
            .collect()
    }

    /// `(min_lon, min_lat, max_lon, max_lat)` of the outer ring.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        match self.shape.bounding_rect() {
            Some(rect) => (rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            None => (f64::NAN, f64::NAN, f64::NAN, f64::NAN),
        }
    }

    /// Coordinates in GeoJSON nesting, as sent to the geometry constructor.
    pub fn coordinates_json(&self) -> serde_json::Value {
        serde_json::json!(self.rings())
    }
}

/// Builds a polygon from a GeoJSON Feature or Polygon geometry.
pub fn polygon_from_geojson(gjson: &serde_json::Value) -> Result<Polygon, AoiError> {
    let geometry = gjson.get("geometry").unwrap_or(gjson);

    if let Some(kind) = geometry.get("type").and_then(|t| t.as_str()) {
        if kind != "Polygon" {
            return Err(AoiError::UnsupportedGeometry(kind.to_string()));
        }
    }

    let coordinates = geometry
        .get("coordinates")
        .ok_or(AoiError::MissingField("geometry.coordinates"))?;

    let rings: Vec<Vec<Position>> = serde_json::from_value(coordinates.clone())
        .map_err(|e| AoiError::InvalidCoordinates(e.to_string()))?;

    Polygon::new(rings)
}

/// Reads and parses a GeoJSON file.
pub fn load_geojson_file(path: &Path) -> Result<Polygon, AoiError> {
    let io_err = |reason: String| AoiError::Io {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| io_err(e.to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| io_err(e.to_string()))?;
    polygon_from_geojson(&value)
}

// ---------------------------------------------------------------------------
// Named areas
// ---------------------------------------------------------------------------

/// An `[[area]]` entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AreaConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Path to a GeoJSON file, relative to the config file's directory.
    #[serde(default)]
    pub geojson: Option<PathBuf>,
    /// Inline polygon rings, used when no file is given.
    #[serde(default)]
    pub coordinates: Option<Vec<Vec<Position>>>,
}

/// A resolved area of interest, ready to be queried.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub name: String,
    pub description: Option<String>,
    pub polygon: Polygon,
}

impl Area {
    pub fn new(name: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            name: name.into(),
            description: None,
            polygon,
        }
    }

    /// Builds an area from a GeoJSON file, naming it after the file stem.
    pub fn from_geojson_file(path: &Path) -> Result<Self, AoiError> {
        let polygon = load_geojson_file(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "aoi".to_string());
        Ok(Self::new(name, polygon))
    }
}

/// Resolves a config entry, reading its GeoJSON file relative to `base_dir`.
pub fn resolve_area(entry: &AreaConfig, base_dir: &Path) -> Result<Area, AoiError> {
    let polygon = match (&entry.geojson, &entry.coordinates) {
        (Some(file), _) => load_geojson_file(&base_dir.join(file))?,
        (None, Some(rings)) => Polygon::new(rings.clone())?,
        (None, None) => return Err(AoiError::MissingField("area.geojson or area.coordinates")),
    };
    Ok(Area {
        name: entry.name.clone(),
        description: entry.description.clone(),
        polygon,
    })
}

/// Looks up an area by name. Returns `UnknownArea` if it is not configured.
pub fn find_area(
    entries: &[AreaConfig],
    name: &str,
    base_dir: &Path,
) -> Result<Area, AoiError> {
    let entry = entries
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| AoiError::UnknownArea(name.to_string()))?;
    resolve_area(entry, base_dir)
}

/// Picks the area for a run: an explicit GeoJSON file wins, then a named
/// config entry, then the first configured entry.
pub fn select_area(
    aoi_file: Option<&Path>,
    name: Option<&str>,
    entries: &[AreaConfig],
    base_dir: &Path,
) -> Result<Area, AoiError> {
    if let Some(path) = aoi_file {
        return Area::from_geojson_file(path);
    }
    if let Some(name) = name {
        return find_area(entries, name, base_dir);
    }
    let first = entries.first().ok_or(AoiError::NoAreaSelected)?;
    resolve_area(first, base_dir)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
