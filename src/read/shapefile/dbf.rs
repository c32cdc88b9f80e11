/// Reads xbase ".dbf" file, as per
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html

use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use byteorder::{ByteOrder, LittleEndian};
use encoding::{DecoderTrap, Encoding, EncodingRef};
use regex::Regex;

use crate::feature::Value;

const DBF_HEADER_LENGTH: usize = 32;
const DBF_FIELD_DESCRIPTOR_LENGTH: usize = 32;
const DBF_FIELD_NAME_LENGTH: usize = 11;
const DBF_HEADER_TERMINATOR: u8 = 0x0d;

lazy_static! {
    static ref TRUE_REGEX: Regex = Regex::new(r"^[yYtT]$").unwrap();
    static ref FALSE_REGEX: Regex = Regex::new(r"^[nNfF]$").unwrap();
    static ref DATE_REGEX: Regex = Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbfType {
    Char,
    Numeric,
    Float,
    Double,
    Memo,
    Logical,
    Date,
    /// Read as a string.
    Unsupported(u8),
}

impl DbfType {
    fn with_u8(u: u8) -> DbfType {
        match u {
            b'C' => DbfType::Char,
            b'N' => DbfType::Numeric,
            b'F' => DbfType::Float,
            b'B' => DbfType::Double,
            b'M' => DbfType::Memo,
            b'L' => DbfType::Logical,
            b'D' => DbfType::Date,
            _ => DbfType::Unsupported(u),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbfField {
    pub name: String,
    pub data_type: DbfType,
    offset: usize,
    pub len: u8,
    pub decimal_count: u8,
}

impl DbfField {
    /// Decodes this field's bytes from a row and coerces them to a Value.
    fn read_value(&self, row: &[u8], encoding: EncodingRef) -> Result<Value, DbfError> {
        let bytes = &row[self.offset .. self.offset + self.len as usize];
        let text = encoding.decode(bytes, DecoderTrap::Strict)
            .map_err(|err| DbfError::EncodingFailure(format!("Field {} has bytes {:?}, which are invalid {}: {}", self.name, bytes, encoding.name(), err)))?;
        Ok(coerce(self.data_type, &text))
    }
}

fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

fn coerce(data_type: DbfType, text: &str) -> Value {
    let text = trim(text);

    match data_type {
        DbfType::Numeric | DbfType::Float | DbfType::Double | DbfType::Memo => {
            match text.parse::<f64>() {
                Ok(n) if !n.is_nan() => Value::Number(n),
                _ => Value::Null,
            }
        }
        DbfType::Logical => {
            if TRUE_REGEX.is_match(text) {
                Value::Bool(true)
            } else if FALSE_REGEX.is_match(text) {
                Value::Bool(false)
            } else {
                Value::Null
            }
        }
        DbfType::Date => {
            match DATE_REGEX.captures(text) {
                None => Value::Null,
                Some(caps) => Value::Date {
                    year: caps[1].parse().unwrap_or(0),
                    month: caps[2].parse().unwrap_or(0),
                    day: caps[3].parse().unwrap_or(0),
                },
            }
        }
        DbfType::Char | DbfType::Unsupported(_) => {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        }
    }
}

#[derive(Debug)]
struct DbfHeader {
    n_records: usize,
    n_header_bytes: usize,
    n_bytes_per_record: usize,
}

pub struct DbfMeta {
    pub n_records: usize,
    pub n_bytes_per_record: usize,
    pub fields: Box<[DbfField]>,
    /// Field names, in order. Shared by every row's Properties.
    pub field_names: Arc<[String]>,
    encoding: EncodingRef,
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for DbfMeta {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DbfMeta")
            .field("n_records", &self.n_records)
            .field("n_bytes_per_record", &self.n_bytes_per_record)
            .field("fields", &self.fields)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// One row. Rows flagged as deleted are still rows: we return them.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfRecord {
    pub deleted: bool,
    pub values: Box<[Value]>,
}

#[derive(Debug)]
pub enum DbfError {
    IOError(io::Error),
    HeaderMalformed(String),
    RecordTruncated(String),
    EncodingFailure(String),
}

impl error::Error for DbfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            DbfError::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for DbfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DbfError::IOError(ref err) => err.fmt(f),
            DbfError::HeaderMalformed(ref description) => write!(f, "Malformed .dbf header: {}", description),
            DbfError::RecordTruncated(ref description) => write!(f, "Truncated .dbf record: {}", description),
            DbfError::EncodingFailure(ref description) => write!(f, "Encoding failure: {}", description),
        }
    }
}

/// Turns UnexpectedEof into a format error; other IO errors stay IO errors.
fn map_eof<F: FnOnce() -> DbfError>(err: io::Error, on_eof: F) -> DbfError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        on_eof()
    } else {
        DbfError::IOError(err)
    }
}

/// Reads the first 32 bytes of the file.
///
/// Side-effect: advances the file cursor 32 bytes.
fn read_dbf_header(file: &mut dyn io::Read) -> Result<DbfHeader, DbfError> {
    let mut buf: [ u8; DBF_HEADER_LENGTH ] = [ 0; DBF_HEADER_LENGTH ];

    file.read_exact(&mut buf)
        .map_err(|err| map_eof(err, || DbfError::HeaderMalformed(format!("File is shorter than the {}-byte header", DBF_HEADER_LENGTH))))?;

    // It's hard to come up with a HeaderMalformed, because virtually any
    // combination of 32 bytes is a valid .dbf header.
    //
    // The one exception: invalid dates. bytes 1-3 (base 0) are "YMD"
    // in hex. All years are valid; there are 12 valid months and 31
    // valid days.
    if buf[2] > 12 || buf[3] > 31 {
        return Err(DbfError::HeaderMalformed(String::from("The first four bytes of the file mention an invalid creation date. This is not a valid .dbf file.")));
    }

    let header = DbfHeader {
        n_records: LittleEndian::read_u32(&buf[4..]) as usize,
        n_header_bytes: LittleEndian::read_u16(&buf[8..]) as usize,
        n_bytes_per_record: LittleEndian::read_u16(&buf[10..]) as usize,
    };

    if header.n_header_bytes <= DBF_HEADER_LENGTH {
        return Err(DbfError::HeaderMalformed(format!("The header claims to be {} bytes long, which leaves no room for field descriptors", header.n_header_bytes)));
    }

    Ok(header)
}

/// Reads all field definitions from the file.
///
/// Assumes exactly DBF_HEADER_LENGTH bytes of the file have been read already.
/// In other words, call this after read_dbf_header().
///
/// Side-effect: advances the file cursor to the first data record.
fn read_dbf_fields(file: &mut dyn io::Read, dbf_header: &DbfHeader, encoding: EncodingRef) -> Result<Box<[DbfField]>, DbfError> {
    let mut buf = vec![ 0u8; dbf_header.n_header_bytes - DBF_HEADER_LENGTH ];

    file.read_exact(&mut buf)
        .map_err(|err| map_eof(err, || DbfError::HeaderMalformed(format!("The header claims to be {} bytes long, but the file is shorter", dbf_header.n_header_bytes))))?;

    let mut fields = Vec::<DbfField>::new();
    let mut offset = 1; // after the deletion flag
    let mut n = 0;

    loop {
        match buf.get(n) {
            None => {
                return Err(DbfError::HeaderMalformed(format!("Field descriptors are missing their 0x0D terminator within the {}-byte header", dbf_header.n_header_bytes)));
            }
            Some(&DBF_HEADER_TERMINATOR) => break,
            Some(_) => {}
        }

        if n + DBF_FIELD_DESCRIPTOR_LENGTH > buf.len() {
            return Err(DbfError::HeaderMalformed(format!("Field descriptor {} runs past the end of the {}-byte header", fields.len(), dbf_header.n_header_bytes)));
        }

        let descriptor = &buf[n .. n + DBF_FIELD_DESCRIPTOR_LENGTH];
        let name_bytes = &descriptor[0 .. DBF_FIELD_NAME_LENGTH];
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(DBF_FIELD_NAME_LENGTH);
        let name = encoding.decode(&name_bytes[..name_len], DecoderTrap::Strict)
            .map_err(|err| DbfError::EncodingFailure(format!("Field name {:?} is invalid {}: {}", &name_bytes[..name_len], encoding.name(), err)))?;

        let field = DbfField {
            name: name,
            data_type: DbfType::with_u8(descriptor[11]),
            offset: offset,
            len: descriptor[16],
            decimal_count: descriptor[17],
        };
        offset += field.len as usize;
        fields.push(field);
        n += DBF_FIELD_DESCRIPTOR_LENGTH;
    }

    if offset > dbf_header.n_bytes_per_record {
        return Err(DbfError::HeaderMalformed(format!("Fields need {} bytes per record, but the header says records are {} bytes", offset, dbf_header.n_bytes_per_record)));
    }

    Ok(fields.into_boxed_slice())
}

/// Reads the header, including field definitions, from a .dbf file.
///
/// Assumes the cursor is at the start of the file.
///
/// Side-effect: advances the file cursor to the first data record.
fn read_dbf_meta(file: &mut dyn io::Read, encoding: EncodingRef) -> Result<DbfMeta, DbfError> {
    let dbf_header = read_dbf_header(file)?;
    let dbf_fields = read_dbf_fields(file, &dbf_header, encoding)?;
    let field_names: Vec<String> = dbf_fields.iter().map(|f| f.name.clone()).collect();

    Ok(DbfMeta {
        n_records: dbf_header.n_records,
        n_bytes_per_record: dbf_header.n_bytes_per_record,
        fields: dbf_fields,
        field_names: Arc::from(field_names),
        encoding: encoding,
    })
}

/// Reads a single record from a .dbf file.
///
/// Assumes the cursor is at the start of the record and that the record
/// "should" exist (i.e., the header leads us to believe there's a record
/// here).
///
/// Side-effect: advances the file cursor to the next record.
fn read_dbf_record(file: &mut dyn io::Read, dbf_meta: &DbfMeta, index: usize) -> Result<DbfRecord, DbfError> {
    let mut buf = vec![ 0u8; dbf_meta.n_bytes_per_record ];

    file.read_exact(&mut buf)
        .map_err(|err| map_eof(err, || DbfError::RecordTruncated(format!("The header promises {} records, but the file ends during record {}", dbf_meta.n_records, index))))?;

    let values = dbf_meta.fields.iter()
        .map(|field| field.read_value(&buf, dbf_meta.encoding))
        .collect::<Result<Vec<Value>, DbfError>>()?;

    Ok(DbfRecord {
        deleted: buf[0] == b'*',
        values: values.into_boxed_slice(),
    })
}

/// Reads an xBase ".dbf" file, following instructions at
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html
///
/// The header (and its field list) is read up front; rows are read as the
/// iterator advances. The first error ends iteration.
///
/// # Example
///
/// ```no_run
/// use std::fs;
/// use std::io;
/// use shapegeo::read::shapefile::dbf::DbfReader;
///
/// let f = io::BufReader::new(fs::File::open("roads.dbf").unwrap());
/// let dbf_reader = DbfReader::new(f, encoding::all::WINDOWS_1252).unwrap();
/// let names = dbf_reader.meta.field_names.clone();
///
/// for record in dbf_reader {
///     for (name, value) in names.iter().zip(record.unwrap().values.iter()) {
///         print!("{}: {}; ", name, value);
///     }
///     println!("");
/// }
/// ```
pub struct DbfReader<R: io::Read> {
    file: R,
    n_records_already_iterated: usize,
    pub meta: Arc<DbfMeta>,
    done: bool,
}

impl<R: io::Read> fmt::Debug for DbfReader<R> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DbfReader")
            .field("n_records_already_iterated", &self.n_records_already_iterated)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Opens an xBase ".dbf" file from the filesystem.
pub fn open(path: &Path, encoding: EncodingRef) -> Result<DbfReader<io::BufReader<fs::File>>, DbfError> {
    match fs::File::open(path) {
        Err(err) => Err(DbfError::IOError(err)),
        Ok(f) => DbfReader::new(io::BufReader::new(f), encoding),
    }
}

impl<R: io::Read> DbfReader<R> {
    pub fn new(mut file: R, encoding: EncodingRef) -> Result<DbfReader<R>, DbfError> {
        let dbf_meta = read_dbf_meta(&mut file, encoding)?;

        debug!("Read .dbf header: {} records of {} bytes, fields {:?}", dbf_meta.n_records, dbf_meta.n_bytes_per_record, dbf_meta.field_names);

        Ok(DbfReader::<R> {
            file: file,
            n_records_already_iterated: 0,
            meta: Arc::new(dbf_meta),
            done: false,
        })
    }
}

impl<R: io::Read> Iterator for DbfReader<R> {
    type Item = Result<DbfRecord, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.n_records_already_iterated == self.meta.n_records {
            None
        } else {
            let ret = read_dbf_record(&mut self.file, &self.meta, self.n_records_already_iterated);
            self.n_records_already_iterated += 1;
            self.done = ret.is_err();
            Some(ret)
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use encoding::all::{UTF_8, WINDOWS_1252};
    use crate::feature::Value;
    use crate::read::shapefile::testutil;
    use super::*;

    fn reader(bytes: Vec<u8>) -> DbfReader<io::Cursor<Vec<u8>>> {
        DbfReader::new(io::Cursor::new(bytes), WINDOWS_1252).unwrap()
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn reads_schema() {
        let bytes = testutil::dbf(&[ ("name", b'C', 10), ("pop", b'N', 8) ], &[]);
        let dbf_reader = reader(bytes);
        assert_eq!(&[ "name".to_string(), "pop".to_string() ], &*dbf_reader.meta.field_names);
        assert_eq!(19, dbf_reader.meta.n_bytes_per_record);
        assert_eq!(DbfType::Char, dbf_reader.meta.fields[0].data_type);
        assert_eq!(DbfType::Numeric, dbf_reader.meta.fields[1].data_type);
        assert_eq!(8, dbf_reader.meta.fields[1].len);
    }

    #[test]
    fn reads_rows_in_order() {
        let bytes = testutil::dbf(
            &[ ("name", b'C', 10), ("pop", b'N', 8) ],
            &[ &[ "foo", "12" ], &[ "bar", "  -3.5" ] ],
        );
        let rows: Vec<DbfRecord> = reader(bytes).map(|r| r.unwrap()).collect();
        assert_eq!(2, rows.len());
        assert_eq!(&[ s("foo"), Value::Number(12.) ], &*rows[0].values);
        assert_eq!(&[ s("bar"), Value::Number(-3.5) ], &*rows[1].values);
    }

    #[test]
    fn coerces_by_type() {
        let bytes = testutil::dbf(
            &[ ("n", b'N', 5), ("c", b'C', 5), ("l", b'L', 1), ("d", b'D', 8), ("x", b'?', 3) ],
            &[
                &[ "", "", "T", "20170601", " a " ],
                &[ "abc", "x", "n", "", "" ],
                &[ "1e3", "  y  ", "?", "2017", "b" ],
            ],
        );
        let rows: Vec<DbfRecord> = reader(bytes).map(|r| r.unwrap()).collect();
        assert_eq!(&[
            Value::Null,
            Value::Null,
            Value::Bool(true),
            Value::Date { year: 2017, month: 6, day: 1 },
            s("a"),
        ], &*rows[0].values);
        assert_eq!(&[ Value::Null, s("x"), Value::Bool(false), Value::Null, Value::Null ], &*rows[1].values);
        assert_eq!(&[ Value::Number(1000.), s("y"), Value::Null, Value::Null, s("b") ], &*rows[2].values);
    }

    #[test]
    fn decodes_with_the_given_encoding() {
        let bytes = testutil::dbf_bytes(&[ ("name", b'C', 6) ], &[ vec![ b"caf\xe9".to_vec() ] ]);
        let mut dbf_reader = reader(bytes);
        assert_eq!(&[ s("café") ], &*dbf_reader.next().unwrap().unwrap().values);
    }

    #[test]
    fn invalid_bytes_are_an_encoding_failure() {
        let bytes = testutil::dbf_bytes(&[ ("name", b'C', 6) ], &[ vec![ b"caf\xe9".to_vec() ] ]);
        let mut dbf_reader = DbfReader::new(io::Cursor::new(bytes), UTF_8).unwrap();
        match dbf_reader.next() {
            Some(Err(DbfError::EncodingFailure(_))) => {}
            other => panic!("Expected EncodingFailure, got {:?}", other),
        }
        assert!(dbf_reader.next().is_none());
    }

    #[test]
    fn deleted_rows_are_still_returned() {
        let mut bytes = testutil::dbf(&[ ("name", b'C', 3) ], &[ &[ "foo" ], &[ "bar" ] ]);
        // header is 32 + 32 + 1 = 65 bytes; each row is 4
        bytes[65] = b'*';
        let rows: Vec<DbfRecord> = reader(bytes).map(|r| r.unwrap()).collect();
        assert_eq!(2, rows.len());
        assert!(rows[0].deleted);
        assert_eq!(&[ s("foo") ], &*rows[0].values);
        assert!(!rows[1].deleted);
    }

    #[test]
    fn missing_terminator() {
        let mut bytes = testutil::dbf(&[ ("name", b'C', 3) ], &[]);
        bytes[64] = b' ';
        match DbfReader::new(io::Cursor::new(bytes), WINDOWS_1252) {
            Err(DbfError::HeaderMalformed(_)) => {}
            other => panic!("Expected HeaderMalformed, got {:?}", other),
        }
    }

    #[test]
    fn truncated_header() {
        let bytes = testutil::dbf(&[ ("name", b'C', 3) ], &[])[..40].to_vec();
        match DbfReader::new(io::Cursor::new(bytes), WINDOWS_1252) {
            Err(DbfError::HeaderMalformed(_)) => {}
            other => panic!("Expected HeaderMalformed, got {:?}", other),
        }
    }

    #[test]
    fn record_length_too_short_for_fields() {
        let mut bytes = testutil::dbf(&[ ("name", b'C', 3) ], &[]);
        bytes[10] = 2;
        match DbfReader::new(io::Cursor::new(bytes), WINDOWS_1252) {
            Err(DbfError::HeaderMalformed(_)) => {}
            other => panic!("Expected HeaderMalformed, got {:?}", other),
        }
    }

    #[test]
    fn fewer_rows_than_promised() {
        let mut bytes = testutil::dbf(&[ ("name", b'C', 3) ], &[ &[ "foo" ] ]);
        bytes[4] = 2;
        bytes.pop(); // the 0x1a end-of-file marker
        let mut dbf_reader = reader(bytes);
        assert!(dbf_reader.next().unwrap().is_ok());
        match dbf_reader.next() {
            Some(Err(DbfError::RecordTruncated(_))) => {}
            other => panic!("Expected RecordTruncated, got {:?}", other),
        }
        assert!(dbf_reader.next().is_none());
    }
}
