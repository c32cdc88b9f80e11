/// Reads ESRI ".shp" Shapefile, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use itertools::Itertools;

use crate::geo::Point;

const SHP_HEADER_LENGTH: usize = 100;
const SHP_RECORD_HEADER_LENGTH: usize = 8;
const SHP_MAGIC_NUMBER: i32 = 9994;
const SHP_VERSION: i32 = 1000;
const SHP_POINT_LENGTH: usize = 16;

#[derive(Debug)]
pub enum ShpError {
    IOError(io::Error),
    HeaderMalformed(String),
    RecordTruncated(String),
    RecordMalformed(String),
    UnsupportedShapeType(i32),
}

impl error::Error for ShpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ShpError::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ShpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShpError::IOError(ref err) => err.fmt(f),
            ShpError::HeaderMalformed(ref description) => write!(f, "Malformed .shp header: {}", description),
            ShpError::RecordTruncated(ref description) => write!(f, "Truncated .shp record: {}", description),
            ShpError::RecordMalformed(ref description) => write!(f, "Malformed .shp record: {}", description),
            ShpError::UnsupportedShapeType(code) => write!(f, "Unsupported shape type {}", code),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShpShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
}

impl ShpShapeType {
    /// Returns None for codes we don't read -- including valid ones like
    /// PolygonZ (15) or MultiPatch (31).
    pub fn with_i32(i: i32) -> Option<ShpShapeType> {
        match i {
            0 => Some(ShpShapeType::Null),
            1 => Some(ShpShapeType::Point),
            3 => Some(ShpShapeType::PolyLine),
            5 => Some(ShpShapeType::Polygon),
            8 => Some(ShpShapeType::MultiPoint),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match *self {
            ShpShapeType::Null => 0,
            ShpShapeType::Point => 1,
            ShpShapeType::PolyLine => 3,
            ShpShapeType::Polygon => 5,
            ShpShapeType::MultiPoint => 8,
        }
    }
}

/// (x_min, y_min, x_max, y_max)
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShpBoundingBox(pub f64, pub f64, pub f64, pub f64);

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShpHeader {
    pub file_n_bytes: usize,
    pub shape_type: ShpShapeType,
    pub bounding_box: ShpBoundingBox,
    /// (min, max). Zero unless the writer filled it in.
    pub z_range: (f64, f64),
    pub m_range: (f64, f64),
}

/// One shape, straight from the file.
///
/// `parts` holds indexes into `points` (not byte offsets): part `i` runs from
/// `parts[i]` up to `parts[i + 1]`, and the last part runs to the end. Points
/// and MultiPoints have no parts; Null shapes have no points.
#[derive(Debug, Clone, PartialEq)]
pub struct ShpRecord {
    pub record_number: u32,
    pub shape_type: ShpShapeType,
    pub points: Box<[Point]>,
    pub parts: Box<[usize]>,
}

impl ShpRecord {
    fn null(record_number: u32) -> ShpRecord {
        ShpRecord {
            record_number: record_number,
            shape_type: ShpShapeType::Null,
            points: vec![].into_boxed_slice(),
            parts: vec![].into_boxed_slice(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.shape_type == ShpShapeType::Null
    }
}

/// Reads exactly `buf.len()` bytes, or as many as there are before EOF.
///
/// Returns the number of bytes read. Unlike `read_exact()`, this lets us tell
/// a clean end of file (0) from a truncated record.
fn read_up_to(file: &mut dyn io::Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match file.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(len) => n += len,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(n)
}

/// Reads the first 100 bytes of the file.
///
/// Side-effect: advances the file cursor 100 bytes.
///
/// Returns Ok iff the file seems to be a Null, Point, PolyLine, Polygon or
/// MultiPoint shapefile. (Z, M and MultiPatch shapefiles are not supported;
/// this method will return Err.)
fn read_shp_header(file: &mut dyn io::Read) -> Result<ShpHeader, ShpError> {
    let mut buf = [ 0u8; SHP_HEADER_LENGTH ];

    let n = read_up_to(file, &mut buf).map_err(ShpError::IOError)?;
    if n < SHP_HEADER_LENGTH {
        return Err(ShpError::HeaderMalformed(format!("File is {} bytes long, but the header alone should be {} bytes", n, SHP_HEADER_LENGTH)));
    }

    let magic_number = BigEndian::read_i32(&buf[0..4]);
    let file_len = BigEndian::read_i32(&buf[24..28]);
    let version = LittleEndian::read_i32(&buf[28..32]);
    let shape_type_i32 = LittleEndian::read_i32(&buf[32..36]);

    if magic_number != SHP_MAGIC_NUMBER {
        return Err(ShpError::HeaderMalformed(format!("File has wrong magic number: found {}, expected {}", magic_number, SHP_MAGIC_NUMBER)));
    }

    if version != SHP_VERSION {
        return Err(ShpError::HeaderMalformed(format!("File has wrong version: found {}, expected {}", version, SHP_VERSION)));
    }

    let shape_type = ShpShapeType::with_i32(shape_type_i32)
        .ok_or(ShpError::UnsupportedShapeType(shape_type_i32))?;

    Ok(ShpHeader {
        file_n_bytes: file_len.max(0) as usize * 2,
        shape_type: shape_type,
        bounding_box: ShpBoundingBox(
            LittleEndian::read_f64(&buf[36..44]),
            LittleEndian::read_f64(&buf[44..52]),
            LittleEndian::read_f64(&buf[52..60]),
            LittleEndian::read_f64(&buf[60..68]),
        ),
        z_range: (LittleEndian::read_f64(&buf[68..76]), LittleEndian::read_f64(&buf[76..84])),
        m_range: (LittleEndian::read_f64(&buf[84..92]), LittleEndian::read_f64(&buf[92..100])),
    })
}

fn parse_points(buf: &[u8]) -> Box<[Point]> {
    buf.chunks(SHP_POINT_LENGTH)
        .map(|b| Point(LittleEndian::read_f64(&b[0..8]), LittleEndian::read_f64(&b[8..16])))
        .collect::<Vec<Point>>()
        .into_boxed_slice()
}

/// Reads a count (of parts or points) from the record. Negative is nonsense.
fn parse_count(buf: &[u8], record_number: u32, what: &str) -> Result<usize, ShpError> {
    let n = LittleEndian::read_i32(buf);
    if n < 0 {
        Err(ShpError::RecordMalformed(format!("Record number {} has {} {}", record_number, n, what)))
    } else {
        Ok(n as usize)
    }
}

fn check_len(buf: &[u8], needed_len: u64, record_number: u32, what: &str) -> Result<(), ShpError> {
    if needed_len != buf.len() as u64 {
        Err(ShpError::RecordMalformed(format!("Record number {} needs {} bytes ({}), but the record header says it has {} bytes", record_number, needed_len, what, buf.len())))
    } else {
        Ok(())
    }
}

/// Parses a record's content, after its shape type has been checked.
type RecordParser = fn(&[u8], u32, ShpShapeType) -> Result<ShpRecord, ShpError>;

fn parse_point_record(buf: &[u8], record_number: u32, shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    check_len(buf, 4 + SHP_POINT_LENGTH as u64, record_number, "it is a Point")?;

    Ok(ShpRecord {
        record_number: record_number,
        shape_type: shape_type,
        points: parse_points(&buf[4..]),
        parts: vec![].into_boxed_slice(),
    })
}

fn parse_multi_point_record(buf: &[u8], record_number: u32, shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    if buf.len() < 40 {
        return Err(ShpError::RecordMalformed(format!("Record number {} is a MultiPoint but only has {} bytes", record_number, buf.len())));
    }

    let num_points = parse_count(&buf[36..40], record_number, "points")?;
    let needed_len = 40 + SHP_POINT_LENGTH as u64 * num_points as u64;
    check_len(buf, needed_len, record_number, &format!("it has {} points", num_points))?;

    Ok(ShpRecord {
        record_number: record_number,
        shape_type: shape_type,
        points: parse_points(&buf[40..]),
        parts: vec![].into_boxed_slice(),
    })
}

/// PolyLine and Polygon records share a layout: bounding box, part count,
/// point count, part offsets, points.
fn parse_poly_record(buf: &[u8], record_number: u32, shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    if buf.len() < 44 {
        return Err(ShpError::RecordMalformed(format!("Record number {} is a {:?} but only has {} bytes", record_number, shape_type, buf.len())));
    }

    let num_parts = parse_count(&buf[36..40], record_number, "parts")?;
    let num_points = parse_count(&buf[40..44], record_number, "points")?;

    let needed_len = 44 + 4 * num_parts as u64 + SHP_POINT_LENGTH as u64 * num_points as u64;
    check_len(buf, needed_len, record_number, &format!("it has {} parts and {} points", num_parts, num_points))?;

    let points_start = 44 + 4 * num_parts;
    let mut parts = Vec::<usize>::with_capacity(num_parts);
    for b in buf[44..points_start].chunks(4) {
        let part_start = LittleEndian::read_i32(b);
        if part_start < 0 || part_start as usize > num_points {
            return Err(ShpError::RecordMalformed(format!("Record number {} has a part starting at point {}, but there are only {} points in the record", record_number, part_start, num_points)));
        }
        parts.push(part_start as usize);
    }

    for (&part_start, &part_end) in parts.iter().tuple_windows() {
        if part_start > part_end {
            return Err(ShpError::RecordMalformed(format!("Record number {} has a part with points {}-{}, but that's an invalid range", record_number, part_start, part_end)));
        }
    }

    Ok(ShpRecord {
        record_number: record_number,
        shape_type: shape_type,
        points: parse_points(&buf[points_start..]),
        parts: parts.into_boxed_slice(),
    })
}

fn record_parser(shape_type: ShpShapeType) -> Option<RecordParser> {
    match shape_type {
        ShpShapeType::Null => None,
        ShpShapeType::Point => Some(parse_point_record),
        ShpShapeType::MultiPoint => Some(parse_multi_point_record),
        ShpShapeType::PolyLine | ShpShapeType::Polygon => Some(parse_poly_record),
    }
}

pub struct ShpReader<R: io::Read> {
    file: R,
    pub n_bytes_already_read: usize,
    pub header: ShpHeader,
    parse: Option<RecordParser>,
    done: bool,
}

// RecordParser takes a borrowed slice, and such fn pointers don't implement Debug
impl<R: io::Read> fmt::Debug for ShpReader<R> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ShpReader")
            .field("n_bytes_already_read", &self.n_bytes_already_read)
            .field("header", &self.header)
            .field("done", &self.done)
            .finish()
    }
}

/// Reads an ESRI ".shp" Shapefile, following instructions at
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
///
/// Records are read one at a time, as the iterator advances; iteration ends
/// at the end of the stream. The first error ends iteration, too.
///
/// # Example
///
/// ```no_run
/// use std::fs;
/// use std::io;
/// use shapegeo::read::shapefile::shp::ShpReader;
///
/// let f = fs::File::open("roads.shp").unwrap();
/// let r = io::BufReader::new(f);
///
/// // builder returns Result<ShpReader, ShpError>
/// let shp_reader = ShpReader::new(r).unwrap();
/// println!("{:?}", shp_reader.header.shape_type);
///
/// // shp_reader.next(), an Iterator method, returns
/// // Option<Result<ShpRecord, ShpError>>
/// for record in shp_reader {
///     println!("{:?}", record.unwrap().points);
/// }
/// ```
impl<R: io::Read> ShpReader<R> {
    pub fn new(mut file: R) -> Result<ShpReader<R>, ShpError> {
        let header = read_shp_header(&mut file)?;

        debug!("Read .shp header: {:?}, bounding box {:?}, {} bytes declared", header.shape_type, header.bounding_box, header.file_n_bytes);

        Ok(ShpReader::<R> {
            file: file,
            n_bytes_already_read: SHP_HEADER_LENGTH,
            parse: record_parser(header.shape_type),
            header: header,
            done: false,
        })
    }

    /// Reads the next record, or returns None at end of file.
    ///
    /// Side effect: advances the file cursor to the next record.
    fn read_record(&mut self) -> Result<Option<ShpRecord>, ShpError> {
        let mut header_buf = [ 0u8; SHP_RECORD_HEADER_LENGTH ];

        match read_up_to(&mut self.file, &mut header_buf).map_err(ShpError::IOError)? {
            0 => return Ok(None),
            SHP_RECORD_HEADER_LENGTH => {}
            n => return Err(ShpError::RecordTruncated(format!("File ends {} bytes into a record header, at byte {}", n, self.n_bytes_already_read + n))),
        }

        let record_number = BigEndian::read_u32(&header_buf[0..4]);
        let content_length = BigEndian::read_i32(&header_buf[4..8]);
        if content_length < 2 {
            return Err(ShpError::RecordMalformed(format!("Record number {} has content length {}", record_number, content_length)));
        }

        // The length is untrusted: let the file, not the header, size the buffer.
        let n_content_bytes = content_length as u64 * 2;
        let mut buf = Vec::new();
        let n = (&mut self.file).take(n_content_bytes).read_to_end(&mut buf).map_err(ShpError::IOError)?;
        if (n as u64) < n_content_bytes {
            return Err(ShpError::RecordTruncated(format!("Record number {} should have {} bytes, but the file ends after {}", record_number, n_content_bytes, n)));
        }
        self.n_bytes_already_read += header_buf.len() + buf.len();

        let shape_type_i32 = LittleEndian::read_i32(&buf[0..4]);
        if shape_type_i32 == 0 {
            return Ok(Some(ShpRecord::null(record_number)));
        }
        if shape_type_i32 != self.header.shape_type.code() {
            return Err(ShpError::UnsupportedShapeType(shape_type_i32));
        }

        match self.parse {
            Some(parse) => parse(&buf[..], record_number, self.header.shape_type).map(Some),
            None => Err(ShpError::UnsupportedShapeType(shape_type_i32)),
        }
    }
}

impl<R: io::Read> Iterator for ShpReader<R> {
    type Item = Result<ShpRecord, ShpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                if self.n_bytes_already_read != self.header.file_n_bytes {
                    debug!("The .shp header says the file is {} bytes long, but we read {}", self.header.file_n_bytes, self.n_bytes_already_read);
                }
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Opens an ESRI ".shp" Shapefile from the filesystem.
pub fn open(path: &Path) -> Result<ShpReader<io::BufReader<fs::File>>, ShpError> {
    match fs::File::open(path) {
        Err(err) => Err(ShpError::IOError(err)),
        Ok(f) => ShpReader::new(io::BufReader::new(f)),
    }
}
