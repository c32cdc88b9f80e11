//! Reads ".shp" and accompanying ".dbf" files as GeoJSON-style Features.
//!
//! There are two pieces of information ".shp" and ".dbf" files _don't_
//! contain:
//!
//! * The _projection_ isn't specified. Sometimes there's a ".prj" file that
//!   contains that information, but no file format can represent all the
//!   projections out there in the world. This library ignores the file and
//!   returns `f64` points.
//! * The _encoding_ of ".dbf" text isn't reliably specified. Pass it in
//!   `OpenOptions`; the default is windows-1252.
//!
//! Polygon rings are told apart by winding order: clockwise rings are outer
//! rings, counter-clockwise rings are holes. That test assumes longitude and
//! latitude coordinates.
//!
//! # Examples
//!
//! Open by ".shp" filename:
//!
//! ```no_run
//! use std::path::Path;
//! use shapegeo::read::shapefile::{self, OpenOptions};
//!
//! let reader = shapefile::open(Path::new("roads.shp"), &OpenOptions::default()).unwrap();
//!
//! for feature in reader {
//!     // feature is a Result<Feature, ShapefileError>
//!     println!("{}", feature.unwrap());
//! }
//! ```
//!
//! Open by `io::Read` implementor (works best with `io::BufReader`):
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//! use shapegeo::read::shapefile::ShapefileReader;
//!
//! let shp_r = io::BufReader::new(fs::File::open("roads.shp").unwrap());
//! let dbf_r = io::BufReader::new(fs::File::open("roads.dbf").unwrap());
//!
//! let reader = ShapefileReader::new(shp_r, dbf_r, encoding::all::UTF_8).unwrap();
//! let names = reader.field_names().to_vec();
//! println!("Fields: {:?}", names);
//!
//! for feature in reader {
//!     println!("{:?}", feature.unwrap().geometry);
//! }
//! ```

pub mod dbf;
pub mod shp;
pub mod shapefile;
pub mod events;
mod options;

#[cfg(test)]
mod testutil;

pub use self::dbf::{DbfError, DbfField, DbfRecord, DbfType};
pub use self::events::{open_events, Event, Events};
pub use self::options::{OpenOptions, DEFAULT_ENCODING};
pub use self::shp::{ShpBoundingBox, ShpError, ShpHeader, ShpRecord, ShpShapeType};
pub use self::shapefile::{open, ShapefileError, ShapefileReader};
