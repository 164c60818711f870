//! Geo queries over point and shape fields.
//!
//! Points are accepted as `[lon, lat]`, `{"lon": .., "lat": ..}` (or
//! `lng`), or the string `"lat,lon"`, and always written as `[lon, lat]`.

use super::{QueryKind, Validatable, impl_boostable, impl_fieldable};
use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::{FieldType, IndexMapping};
use crate::search::{
    PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions, check_field_type,
    resolve_field,
};
use serde::{Deserialize, Serialize, Serializer};

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "PointRepr")]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidGeoPoint {
            lon: self.lon,
            lat: self.lat,
            reason: reason.to_string(),
        };
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(invalid("latitude must be between -90 and 90"));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(invalid("longitude must be between -180 and 180"));
        }
        Ok(())
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.lon, self.lat].serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Pair([f64; 2]),
    Object {
        #[serde(alias = "lng")]
        lon: f64,
        lat: f64,
    },
    Text(String),
}

impl TryFrom<PointRepr> for GeoPoint {
    type Error = String;

    fn try_from(repr: PointRepr) -> Result<Self, Self::Error> {
        match repr {
            PointRepr::Pair([lon, lat]) => Ok(GeoPoint::new(lon, lat)),
            PointRepr::Object { lon, lat } => Ok(GeoPoint::new(lon, lat)),
            PointRepr::Text(text) => {
                let parsed = text.split_once(',').and_then(|(lat, lon)| {
                    Some(GeoPoint::new(
                        lon.trim().parse().ok()?,
                        lat.trim().parse().ok()?,
                    ))
                });
                parsed.ok_or_else(|| format!("invalid geo point '{}', expected \"lat,lon\"", text))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBoxQuery {
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl GeoBoundingBoxQuery {
    pub fn new(top_left: GeoPoint, bottom_right: GeoPoint) -> Self {
        Self {
            top_left,
            bottom_right,
            field: String::new(),
            boost: None,
        }
    }
}

impl Validatable for GeoBoundingBoxQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.top_left.validate()?;
        self.bottom_right.validate()?;
        // Longitudes may wrap across the antimeridian, latitudes may not.
        if self.top_left.lat < self.bottom_right.lat {
            return Err(ValidationError::InvalidShape(format!(
                "bounding box top latitude {} is below bottom latitude {}",
                self.top_left.lat, self.bottom_right.lat
            )));
        }
        Ok(())
    }
}

impl Searchable for GeoBoundingBoxQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::GeoBoundingBox, field, FieldType::GeoPoint)?;
        Ok(SearchPlan::new(
            PlanNode::GeoBoundingBox {
                field: field.to_string(),
                top_left: self.top_left,
                bottom_right: self.bottom_right,
            },
            self.boost,
            options,
        ))
    }
}

/// Matches points within `distance` of `location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoDistanceQuery {
    pub location: GeoPoint,
    pub distance: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl GeoDistanceQuery {
    pub fn new(location: GeoPoint, distance: impl Into<String>) -> Self {
        Self {
            location,
            distance: distance.into(),
            field: String::new(),
            boost: None,
        }
    }

    fn radius_meters(&self) -> Result<f64, ValidationError> {
        parse_distance(&self.distance)
            .ok_or_else(|| ValidationError::InvalidDistance(self.distance.clone()))
    }
}

impl Validatable for GeoDistanceQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.location.validate()?;
        self.radius_meters().map(|_| ())
    }
}

impl Searchable for GeoDistanceQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.location.validate()?;
        let radius_meters = self.radius_meters()?;
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::GeoDistance, field, FieldType::GeoPoint)?;
        Ok(SearchPlan::new(
            PlanNode::GeoDistance {
                field: field.to_string(),
                center: self.location,
                radius_meters,
            },
            self.boost,
            options,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingPolygonQuery {
    pub polygon_points: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl GeoBoundingPolygonQuery {
    pub fn new(polygon_points: Vec<GeoPoint>) -> Self {
        Self {
            polygon_points,
            field: String::new(),
            boost: None,
        }
    }
}

impl Validatable for GeoBoundingPolygonQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.polygon_points.len() < 3 {
            return Err(ValidationError::PolygonTooSmall(self.polygon_points.len()));
        }
        self.polygon_points.iter().try_for_each(GeoPoint::validate)
    }
}

impl Searchable for GeoBoundingPolygonQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::GeoBoundingPolygon, field, FieldType::GeoPoint)?;
        Ok(SearchPlan::new(
            PlanNode::GeoPolygon {
                field: field.to_string(),
                points: self.polygon_points.clone(),
            },
            self.boost,
            options,
        ))
    }
}

/// Spatial relation between indexed shapes and the query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    #[default]
    Intersects,
    Within,
    Contains,
}

/// GeoJSON-style shape; coordinates are `[lon, lat]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Point {
        coordinates: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPoint {
        coordinates: Vec<[f64; 2]>,
    },
    MultiLineString {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
    /// Top-left and bottom-right corners.
    Envelope {
        coordinates: Vec<[f64; 2]>,
    },
    Circle {
        coordinates: [f64; 2],
        radius: String,
    },
    GeometryCollection {
        geometries: Vec<Shape>,
    },
}

impl Shape {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Shape::Point { coordinates } => validate_coordinate(coordinates),
            Shape::MultiPoint { coordinates } => {
                if coordinates.is_empty() {
                    return Err(shape_error("multipoint has no points"));
                }
                coordinates.iter().try_for_each(validate_coordinate)
            }
            Shape::LineString { coordinates } => validate_line(coordinates),
            Shape::MultiLineString { coordinates } => {
                if coordinates.is_empty() {
                    return Err(shape_error("multilinestring has no lines"));
                }
                coordinates.iter().try_for_each(|line| validate_line(line))
            }
            Shape::Polygon { coordinates } => validate_polygon(coordinates),
            Shape::MultiPolygon { coordinates } => {
                if coordinates.is_empty() {
                    return Err(shape_error("multipolygon has no polygons"));
                }
                coordinates.iter().try_for_each(|polygon| validate_polygon(polygon))
            }
            Shape::Envelope { coordinates } => {
                if coordinates.len() != 2 {
                    return Err(shape_error(&format!(
                        "envelope needs exactly 2 corners, got {}",
                        coordinates.len()
                    )));
                }
                coordinates.iter().try_for_each(validate_coordinate)
            }
            Shape::Circle {
                coordinates,
                radius,
            } => {
                validate_coordinate(coordinates)?;
                parse_distance(radius)
                    .map(|_| ())
                    .ok_or_else(|| ValidationError::InvalidDistance(radius.clone()))
            }
            Shape::GeometryCollection { geometries } => {
                if geometries.is_empty() {
                    return Err(shape_error("geometrycollection is empty"));
                }
                geometries.iter().try_for_each(Shape::validate)
            }
        }
    }
}

/// The `geometry` object of a geo shape query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryFilter {
    pub shape: Shape,
    #[serde(default)]
    pub relation: Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoShapeQuery {
    pub geometry: GeometryFilter,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl GeoShapeQuery {
    pub fn new(shape: Shape, relation: Relation) -> Self {
        Self {
            geometry: GeometryFilter { shape, relation },
            field: String::new(),
            boost: None,
        }
    }
}

impl Validatable for GeoShapeQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.geometry.shape.validate()
    }
}

impl Searchable for GeoShapeQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        self.validate()?;
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::GeoShape, field, FieldType::GeoShape)?;
        Ok(SearchPlan::new(
            PlanNode::GeoShape {
                field: field.to_string(),
                shape: self.geometry.shape.clone(),
                relation: self.geometry.relation,
            },
            self.boost,
            options,
        ))
    }
}

impl_boostable!(
    GeoBoundingBoxQuery,
    GeoDistanceQuery,
    GeoBoundingPolygonQuery,
    GeoShapeQuery
);
impl_fieldable!(
    GeoBoundingBoxQuery,
    GeoDistanceQuery,
    GeoBoundingPolygonQuery,
    GeoShapeQuery
);

fn shape_error(message: &str) -> ValidationError {
    ValidationError::InvalidShape(message.to_string())
}

fn validate_coordinate(coordinate: &[f64; 2]) -> Result<(), ValidationError> {
    GeoPoint::new(coordinate[0], coordinate[1]).validate()
}

fn validate_line(line: &[[f64; 2]]) -> Result<(), ValidationError> {
    if line.len() < 2 {
        return Err(shape_error(&format!(
            "linestring needs at least 2 points, got {}",
            line.len()
        )));
    }
    line.iter().try_for_each(validate_coordinate)
}

fn validate_polygon(rings: &[Vec<[f64; 2]>]) -> Result<(), ValidationError> {
    if rings.is_empty() {
        return Err(shape_error("polygon has no rings"));
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(shape_error(&format!(
                "polygon ring needs at least 4 points, got {}",
                ring.len()
            )));
        }
        if ring.first() != ring.last() {
            return Err(shape_error("polygon ring is not closed"));
        }
        ring.iter().try_for_each(validate_coordinate)?;
    }
    Ok(())
}

/// Distance units and their length in meters.
const DISTANCE_UNITS: &[(&[&str], f64)] = &[
    (&["mm", "millimeters"], 0.001),
    (&["cm", "centimeters"], 0.01),
    (&["m", "meters"], 1.0),
    (&["km", "kilometers"], 1000.0),
    (&["in", "inch"], 0.0254),
    (&["ft", "feet"], 0.3048),
    (&["yd", "yards"], 0.9144),
    (&["mi", "miles"], 1609.344),
    (&["nm", "nauticalmiles"], 1852.0),
];

/// Parses a distance such as `"10km"`, `"2.5 mi"` or `"1e3m"` into meters.
/// A bare number is meters.
pub(crate) fn parse_distance(text: &str) -> Option<f64> {
    let text = text.trim().to_ascii_lowercase();

    // Longest unit suffix wins, so "km" beats "m" and exponents stay numeric.
    let unit = DISTANCE_UNITS
        .iter()
        .flat_map(|(names, meters)| names.iter().map(move |name| (*name, *meters)))
        .filter(|(name, _)| text.ends_with(name))
        .max_by_key(|(name, _)| name.len());
    let (number, meters) = match unit {
        Some((name, meters)) => (&text[..text.len() - name.len()], meters),
        None => (text.as_str(), 1.0),
    };

    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value * meters)
}
