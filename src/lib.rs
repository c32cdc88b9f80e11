//! Decodes ESRI Shapefiles (".shp" geometry plus ".dbf" attributes) into
//! GeoJSON-style Features, streaming the geometry one record at a time.
extern crate byteorder;
extern crate encoding;
extern crate itertools;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
extern crate regex;
extern crate serde_json;

pub mod feature;
pub mod geo;
pub mod read;

pub use feature::{Feature, Properties, Value};
pub use geo::Geometry;
