//! The subset of GeoJSON (RFC 7946) accepted in process inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::violations::Violations;

pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point { .. } => GeometryKind::Point,
            Geometry::MultiPoint { .. } => GeometryKind::MultiPoint,
            Geometry::LineString { .. } => GeometryKind::LineString,
            Geometry::MultiLineString { .. } => GeometryKind::MultiLineString,
            Geometry::Polygon { .. } => GeometryKind::Polygon,
            Geometry::MultiPolygon { .. } => GeometryKind::MultiPolygon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    FeatureCollection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub tag: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub geometry: Geometry,
    pub properties: P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection<P> {
    #[serde(rename = "type")]
    pub tag: FeatureCollectionTag,
    pub features: Vec<Feature<P>>,
}

// ---------------------------------------------------------------------------
// Geometry checks
// ---------------------------------------------------------------------------

/// Check that `geometry` is one of `allowed` and well formed, recording
/// violations under `path` (the path of the geometry member itself).
pub fn check_geometry(
    geometry: &Geometry,
    allowed: &[GeometryKind],
    path: &str,
    violations: &mut Violations,
) {
    let kind = geometry.kind();
    if !allowed.contains(&kind) {
        let expected: Vec<String> = allowed.iter().map(|k| k.to_string()).collect();
        violations.push(
            format!("{path}.type"),
            "geometry_type",
            format!("expected {}, got {kind}", expected.join(" or ")),
            Some(serde_json::Value::String(kind.to_string())),
        );
        return;
    }

    let coords = format!("{path}.coordinates");
    match geometry {
        Geometry::Point { coordinates } => check_position(coordinates, &coords, violations),
        Geometry::MultiPoint { coordinates } => {
            for (i, p) in coordinates.iter().enumerate() {
                check_position(p, &format!("{coords}[{i}]"), violations);
            }
        }
        Geometry::LineString { coordinates } => check_line(coordinates, &coords, violations),
        Geometry::MultiLineString { coordinates } => {
            if coordinates.is_empty() {
                violations.push(&coords, "geometry", "must contain at least one line", None);
            }
            for (i, line) in coordinates.iter().enumerate() {
                check_line(line, &format!("{coords}[{i}]"), violations);
            }
        }
        Geometry::Polygon { coordinates } => check_polygon(coordinates, &coords, violations),
        Geometry::MultiPolygon { coordinates } => {
            if coordinates.is_empty() {
                violations.push(&coords, "geometry", "must contain at least one polygon", None);
            }
            for (i, polygon) in coordinates.iter().enumerate() {
                check_polygon(polygon, &format!("{coords}[{i}]"), violations);
            }
        }
    }
}

fn check_position(position: &[f64], path: &str, violations: &mut Violations) {
    if !(2..=3).contains(&position.len()) {
        violations.push(
            path,
            "geometry",
            format!("a position needs 2 or 3 coordinates, got {}", position.len()),
            None,
        );
    } else if position.iter().any(|c| !c.is_finite()) {
        violations.push(path, "geometry", "coordinates must be finite numbers", None);
    }
}

fn check_line(line: &[Position], path: &str, violations: &mut Violations) {
    if line.len() < 2 {
        violations.push(
            path,
            "geometry",
            format!("a line needs at least 2 positions, got {}", line.len()),
            None,
        );
    }
    for (i, p) in line.iter().enumerate() {
        check_position(p, &format!("{path}[{i}]"), violations);
    }
}

fn check_polygon(rings: &[Vec<Position>], path: &str, violations: &mut Violations) {
    if rings.is_empty() {
        violations.push(path, "geometry", "a polygon needs an exterior ring", None);
        return;
    }
    for (i, ring) in rings.iter().enumerate() {
        let ring_path = format!("{path}[{i}]");
        if ring.len() < 4 {
            violations.push(
                &ring_path,
                "geometry",
                format!("a linear ring needs at least 4 positions, got {}", ring.len()),
                None,
            );
            continue;
        }
        for (j, p) in ring.iter().enumerate() {
            check_position(p, &format!("{ring_path}[{j}]"), violations);
        }
        if ring.first() != ring.last() {
            violations.push(
                &ring_path,
                "geometry",
                "a linear ring must be closed (first and last positions equal)",
                None,
            );
        }
    }
}
