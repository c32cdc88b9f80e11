use std::error;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::vec;
use encoding::EncodingRef;

use crate::feature::{Feature, Properties};
use crate::geo;
use super::dbf;
use super::options::OpenOptions;
use super::shp;

/// Pairs ".shp" records with ".dbf" rows, yielding Features.
///
/// Record _i_ goes with row _i_. The ".dbf" is read in full when the reader is
/// built, so a ".dbf" error means no Features at all; ".shp" records are read
/// one at a time, as the iterator advances.
///
/// If the files disagree on the number of records, the ".shp" file wins: extra
/// rows are ignored, and records without a row get empty properties.
///
/// # Examples
///
/// ```
/// # use std::io;
/// use shapegeo::geo::{Geometry, Point};
/// use shapegeo::read::shapefile::ShapefileReader;
/// # let shp_bytes: Vec<u8> = vec![
/// #     0, 0, 0x27, 0x0a, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
/// #     0, 0, 0, 64, 0xe8, 0x03, 0, 0, 1, 0, 0, 0,
/// #     0, 0, 0, 0, 0, 0, 0xf0, 0x3f, 0, 0, 0, 0, 0, 0, 0, 0x40,
/// #     0, 0, 0, 0, 0, 0, 0xf0, 0x3f, 0, 0, 0, 0, 0, 0, 0, 0x40,
/// #     0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
/// #     0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
/// #     0, 0, 0, 1, 0, 0, 0, 10, 1, 0, 0, 0,
/// #     0, 0, 0, 0, 0, 0, 0xf0, 0x3f, 0, 0, 0, 0, 0, 0, 0, 0x40,
/// # ];
///
/// // shp_bytes holds one Point record, at (1, 2)
/// let mut reader = ShapefileReader::without_properties(io::Cursor::new(shp_bytes)).unwrap();
///
/// let feature = reader.next().unwrap().unwrap();
/// assert_eq!(Some(Geometry::Point(Point(1., 2.))), feature.geometry);
/// assert!(feature.properties.is_empty());
///
/// assert!(reader.next().is_none());
/// ```
pub struct ShapefileReader<R: io::Read> {
    shp_reader: shp::ShpReader<R>,
    convert: geo::Converter,
    field_names: Arc<[String]>,
    rows: Option<vec::IntoIter<dbf::DbfRecord>>,
    n_rows: usize,
    n_features: usize,
}

impl<R: io::Read> fmt::Debug for ShapefileReader<R> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ShapefileReader")
            .field("shp_reader", &self.shp_reader)
            .field("field_names", &self.field_names)
            .field("n_rows", &self.n_rows)
            .field("n_features", &self.n_features)
            .finish()
    }
}

#[derive(Debug)]
pub enum ShapefileError {
    ShpError(shp::ShpError),
    DbfError(dbf::DbfError),
    UnknownEncoding(String),
}

impl error::Error for ShapefileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ShapefileError::ShpError(ref err) => Some(err),
            ShapefileError::DbfError(ref err) => Some(err),
            ShapefileError::UnknownEncoding(_) => None,
        }
    }
}

impl fmt::Display for ShapefileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShapefileError::ShpError(ref err) => err.fmt(f),
            ShapefileError::DbfError(ref err) => err.fmt(f),
            ShapefileError::UnknownEncoding(ref label) => write!(f, "Unknown encoding: {}", label),
        }
    }
}

impl From<shp::ShpError> for ShapefileError {
    fn from(err: shp::ShpError) -> ShapefileError {
        ShapefileError::ShpError(err)
    }
}

impl From<dbf::DbfError> for ShapefileError {
    fn from(err: dbf::DbfError) -> ShapefileError {
        ShapefileError::DbfError(err)
    }
}

impl<R: io::Read> ShapefileReader<R> {
    /// Reads the ".shp" header and the entire ".dbf" file.
    pub fn new<S: io::Read>(r: R, s: S, encoding: EncodingRef) -> Result<ShapefileReader<R>, ShapefileError> {
        let shp_reader = shp::ShpReader::new(r)?;
        let dbf_reader = dbf::DbfReader::new(s, encoding)?;
        let field_names = dbf_reader.meta.field_names.clone();
        let rows = dbf_reader.collect::<Result<Vec<dbf::DbfRecord>, dbf::DbfError>>()?;

        Ok(ShapefileReader::build(shp_reader, field_names, Some(rows)))
    }

    /// Reads the ".shp" header. Every Feature will have empty properties.
    pub fn without_properties(r: R) -> Result<ShapefileReader<R>, ShapefileError> {
        let shp_reader = shp::ShpReader::new(r)?;

        Ok(ShapefileReader::build(shp_reader, Arc::from(Vec::<String>::new()), None))
    }

    fn build(shp_reader: shp::ShpReader<R>, field_names: Arc<[String]>, rows: Option<Vec<dbf::DbfRecord>>) -> ShapefileReader<R> {
        ShapefileReader {
            convert: geo::converter(shp_reader.header.shape_type),
            shp_reader: shp_reader,
            field_names: field_names,
            n_rows: rows.as_ref().map(|r| r.len()).unwrap_or(0),
            rows: rows.map(|r| r.into_iter()),
            n_features: 0,
        }
    }

    pub fn header(&self) -> &shp::ShpHeader {
        &self.shp_reader.header
    }

    /// Property names, in ".dbf" order. Empty when ignoring properties.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Features returned so far.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn next_properties(&mut self) -> Properties {
        match self.rows {
            None => Properties::empty(),
            Some(ref mut rows) => match rows.next() {
                Some(row) => Properties::new(self.field_names.clone(), row.values),
                None => Properties::empty(),
            },
        }
    }
}

impl<R: io::Read> Iterator for ShapefileReader<R> {
    type Item = Result<Feature, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.shp_reader.next() {
            None => {
                if self.rows.is_some() && self.n_features != self.n_rows {
                    warn!("'.shp' file has {} records but '.dbf' file has {} rows; extra rows were ignored and missing rows left empty", self.n_features, self.n_rows);
                }
                None
            }
            Some(Err(err)) => Some(Err(ShapefileError::ShpError(err))),
            Some(Ok(record)) => {
                let properties = self.next_properties();
                let geometry = if record.is_null() {
                    None
                } else {
                    (self.convert)(record)
                };
                self.n_features += 1;

                Some(Ok(Feature {
                    properties: properties,
                    geometry: geometry,
                }))
            }
        }
    }
}

/// Returns (".shp" path, ".dbf" path) for a path with or without ".shp".
fn sibling_paths(path: &Path) -> (PathBuf, PathBuf) {
    let is_shp = path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("shp"))
        .unwrap_or(false);
    let base = if is_shp { path.with_extension("") } else { path.to_path_buf() };

    let with_suffix = |suffix: &str| {
        let mut s = OsString::from(base.as_os_str());
        s.push(suffix);
        PathBuf::from(s)
    };

    (with_suffix(".shp"), with_suffix(".dbf"))
}

/// Opens by ".shp" filename (the ".shp" is optional).
///
/// This will automatically search for the accompanying ".dbf"; it will fail
/// if that file does not exist -- unless `options.ignore_properties` is set,
/// in which case the ".dbf" is never opened.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shapegeo::read::shapefile::{self, OpenOptions};
///
/// let options = OpenOptions::new().encoding("utf-8");
/// let reader = shapefile::open(Path::new("roads.shp"), &options).unwrap();
///
/// for feature in reader {
///     // feature is a Result<Feature, ShapefileError>
///     println!("{}", feature.unwrap());
/// }
/// ```
pub fn open(path: &Path, options: &OpenOptions) -> Result<ShapefileReader<io::BufReader<fs::File>>, ShapefileError> {
    let (shp_path, dbf_path) = sibling_paths(path);
    let encoding = options.resolve_encoding()?;

    if options.ignore_properties {
        debug!("Opening {:?}, ignoring properties", shp_path);
        let shp_reader = shp::open(&shp_path)?;
        return Ok(ShapefileReader::build(shp_reader, Arc::from(Vec::<String>::new()), None));
    }

    debug!("Opening {:?} and {:?}", shp_path, dbf_path);

    let shp_reader = shp::open(&shp_path)?;
    let dbf_reader = dbf::open(&dbf_path, encoding)?;
    let field_names = dbf_reader.meta.field_names.clone();
    let rows = dbf_reader.collect::<Result<Vec<dbf::DbfRecord>, dbf::DbfError>>()?;

    Ok(ShapefileReader::build(shp_reader, field_names, Some(rows)))
}
