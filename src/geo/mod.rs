//! Typed geometries, and the conversion from raw ".shp" records into them.
//!
//! Shapefiles store every shape as a flat array of points plus an array of
//! "part" offsets into it. A PolyLine's parts are lines; a Polygon's parts are
//! rings, and the only thing distinguishing an outer ring from a hole is its
//! winding order. This module turns that into GeoJSON-shaped values.
use std::fmt;
use std::iter;
use itertools::Itertools;
use serde_json::{json, Value as JsonValue};

use crate::read::shapefile::shp::{ShpRecord, ShpShapeType};

mod winding;

pub use self::winding::{ring_clockwise, ring_contains, signed_area};

/// An (x, y) pair. For geographic data, that's (longitude, latitude).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Point(pub f64, pub f64);

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.0, self.1)
    }
}

impl Point {
    pub fn to_json(&self) -> JsonValue {
        json!([ self.0, self.1 ])
    }
}

/// A closed path. The first and last Points are usually identical.
pub type Ring = Vec<Point>;

/// A geometry, shaped the way GeoJSON shapes it.
///
/// A Polygon's first ring is its outer ring; any others are holes.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    MultiPoint(Vec<Point>),
    LineString(Vec<Point>),
    MultiLineString(Vec<Vec<Point>>),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

fn points_to_json(points: &[Point]) -> JsonValue {
    JsonValue::Array(points.iter().map(Point::to_json).collect())
}

fn lines_to_json(lines: &[Vec<Point>]) -> JsonValue {
    JsonValue::Array(lines.iter().map(|l| points_to_json(l)).collect())
}

impl Geometry {
    /// The GeoJSON "type" member.
    pub fn type_name(&self) -> &'static str {
        match *self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let coordinates = match *self {
            Geometry::Point(ref p) => p.to_json(),
            Geometry::MultiPoint(ref points) | Geometry::LineString(ref points) => points_to_json(points),
            Geometry::MultiLineString(ref lines) | Geometry::Polygon(ref lines) => lines_to_json(lines),
            Geometry::MultiPolygon(ref polygons) => {
                JsonValue::Array(polygons.iter().map(|rings| lines_to_json(rings)).collect())
            }
        };

        json!({
            "type": self.type_name(),
            "coordinates": coordinates,
        })
    }
}

/// Turns one record into a Geometry. `None` means a Null shape.
///
/// The ".shp" header declares a single shape type for the whole file, so a
/// reader picks its Converter once, after the header, and reuses it.
pub type Converter = fn(ShpRecord) -> Option<Geometry>;

pub fn converter(shape_type: ShpShapeType) -> Converter {
    match shape_type {
        ShpShapeType::Null => convert_null,
        ShpShapeType::Point => convert_point,
        ShpShapeType::MultiPoint => convert_multi_point,
        ShpShapeType::PolyLine => convert_poly_line,
        ShpShapeType::Polygon => convert_polygon,
    }
}

/// Converts a record from a file of the given shape type.
///
/// # Example
///
/// ```
/// use shapegeo::geo::{self, Geometry, Point};
/// use shapegeo::read::shapefile::shp::{ShpRecord, ShpShapeType};
///
/// let record = ShpRecord {
///     record_number: 1,
///     shape_type: ShpShapeType::Point,
///     points: vec![ Point(1., 2.) ].into_boxed_slice(),
///     parts: vec![].into_boxed_slice(),
/// };
///
/// assert_eq!(Some(Geometry::Point(Point(1., 2.))), geo::convert(ShpShapeType::Point, record));
/// ```
pub fn convert(shape_type: ShpShapeType, record: ShpRecord) -> Option<Geometry> {
    converter(shape_type)(record)
}

fn convert_null(_record: ShpRecord) -> Option<Geometry> {
    None
}

fn convert_point(record: ShpRecord) -> Option<Geometry> {
    record.points.first().map(|&p| Geometry::Point(p))
}

fn convert_multi_point(record: ShpRecord) -> Option<Geometry> {
    Some(Geometry::MultiPoint(record.points.into_vec()))
}

/// Slices the flat point array into one Vec per part. The last part runs to
/// the end of the array.
fn split_parts(points: &[Point], parts: &[usize]) -> Vec<Vec<Point>> {
    parts.iter()
        .cloned()
        .chain(iter::once(points.len()))
        .tuple_windows()
        .map(|(start, end)| points.get(start..end).map(|s| s.to_vec()).unwrap_or_default())
        .collect()
}

fn convert_poly_line(record: ShpRecord) -> Option<Geometry> {
    let mut lines = split_parts(&record.points, &record.parts);

    if lines.len() == 1 {
        lines.pop().map(Geometry::LineString)
    } else {
        Some(Geometry::MultiLineString(lines))
    }
}

/// Groups rings into polygons.
///
/// Clockwise rings are outer rings. Each counter-clockwise ring is a hole in
/// the first polygon whose outer ring contains the hole's first point. A hole
/// nobody contains becomes a polygon of its own.
fn convert_polygon(record: ShpRecord) -> Option<Geometry> {
    let mut polygons: Vec<Vec<Ring>> = vec![];
    let mut holes: Vec<Ring> = vec![];

    for ring in split_parts(&record.points, &record.parts) {
        if ring_clockwise(&ring) {
            polygons.push(vec![ ring ]);
        } else {
            holes.push(ring);
        }
    }

    for hole in holes {
        let shell = hole.first().and_then(|start| {
            polygons.iter().position(|polygon| ring_contains(&polygon[0], start))
        });

        match shell {
            Some(i) => polygons[i].push(hole),
            None => polygons.push(vec![ hole ]),
        }
    }

    if polygons.len() == 1 {
        polygons.pop().map(Geometry::Polygon)
    } else {
        Some(Geometry::MultiPolygon(polygons))
    }
}
