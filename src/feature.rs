//! GeoJSON-style Features: one geometry plus one row of attributes.
use std::fmt;
use std::sync::Arc;
use serde_json::{json, Map, Number, Value as JsonValue};

use crate::geo::Geometry;

/// One attribute value from a ".dbf" row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date { year: u32, month: u32, day: u32 },
}

impl Value {
    /// Dates become "YYYY-MM-DD" strings; non-finite numbers become null.
    pub fn to_json(&self) -> JsonValue {
        match *self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Number(n) => Number::from_f64(n).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            Value::String(ref s) => JsonValue::String(s.clone()),
            Value::Date { year, month, day } => JsonValue::String(format!("{:04}-{:02}-{:02}", year, month, day)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(ref s) => write!(f, "{}", s),
            Value::Date { year, month, day } => write!(f, "{:04}-{:02}-{:02}", year, month, day),
        }
    }
}

/// Attribute values, keyed by field name, in ".dbf" field order.
///
/// Every row from one file shares the same list of names.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties {
    names: Arc<[String]>,
    values: Box<[Value]>,
}

impl Properties {
    /// Pairs `names[i]` with `values[i]`. Extra names or values are ignored.
    pub fn new(names: Arc<[String]>, values: Box<[Value]>) -> Properties {
        Properties {
            names: names,
            values: values,
        }
    }

    pub fn empty() -> Properties {
        Properties::new(Arc::from(Vec::<String>::new()), vec![].into_boxed_slice())
    }

    pub fn len(&self) -> usize {
        self.names.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.iter().find(|&(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &Value)> {
        self.names.iter().map(|n| n.as_str()).zip(self.values.iter())
    }

    pub fn to_json(&self) -> Map<String, JsonValue> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }
}

/// A geometry and its attributes. A Null shape has no geometry.
///
/// # Example
///
/// ```
/// use shapegeo::{Feature, Geometry, Properties};
/// use shapegeo::geo::Point;
///
/// let feature = Feature {
///     properties: Properties::empty(),
///     geometry: Some(Geometry::Point(Point(1., 2.))),
/// };
///
/// assert_eq!(
///     r#"{"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1.0,2.0]}}"#,
///     feature.to_string()
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub properties: Properties,
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "type": "Feature",
            "properties": self.properties.to_json(),
            "geometry": self.geometry.as_ref().map(Geometry::to_json),
        })
    }
}

/// Compact GeoJSON
impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::Point;

    fn properties() -> Properties {
        let names: Arc<[String]> = Arc::from(vec![ "name".to_string(), "pop".to_string(), "opened".to_string() ]);
        Properties::new(names, vec![
            Value::String("Springfield".to_string()),
            Value::Number(30720.),
            Value::Date { year: 1796, month: 3, day: 9 },
        ].into_boxed_slice())
    }

    #[test]
    fn get_by_name() {
        let p = properties();
        assert_eq!(Some(&Value::Number(30720.)), p.get("pop"));
        assert_eq!(None, p.get("area"));
        assert_eq!(3, p.len());
    }

    #[test]
    fn json_keeps_field_order() {
        let keys: Vec<String> = properties().to_json().keys().cloned().collect();
        assert_eq!(vec![ "name", "pop", "opened" ], keys);
    }

    #[test]
    fn value_to_json() {
        assert_eq!(json!("1796-03-09"), Value::Date { year: 1796, month: 3, day: 9 }.to_json());
        assert_eq!(JsonValue::Null, Value::Number(::std::f64::INFINITY).to_json());
        assert_eq!(json!(true), Value::Bool(true).to_json());
        assert_eq!(JsonValue::Null, Value::Null.to_json());
    }

    #[test]
    fn feature_to_json() {
        let feature = Feature {
            properties: properties(),
            geometry: Some(Geometry::LineString(vec![ Point(0., 0.), Point(1., 1.) ])),
        };
        assert_eq!(
            json!({
                "type": "Feature",
                "properties": { "name": "Springfield", "pop": 30720.0, "opened": "1796-03-09" },
                "geometry": { "type": "LineString", "coordinates": [ [0., 0.], [1., 1.] ] },
            }),
            feature.to_json()
        );
    }

    #[test]
    fn null_geometry_is_json_null() {
        let feature = Feature { properties: Properties::empty(), geometry: None };
        assert_eq!(json!({ "type": "Feature", "properties": {}, "geometry": null }), feature.to_json());
    }
}
