use encoding::label::encoding_from_whatwg_label;
use encoding::EncodingRef;

use super::shapefile::ShapefileError;

/// The ".dbf" encoding most shapefiles in the wild use when they don't say.
pub const DEFAULT_ENCODING: &str = "windows-1252";

/// How to open a shapefile.
///
/// # Example
///
/// ```
/// use shapegeo::read::shapefile::OpenOptions;
///
/// let options = OpenOptions::new().encoding("utf-8");
/// assert_eq!("utf-8", options.encoding);
/// assert!(!options.ignore_properties);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// WHATWG label of the ".dbf" text encoding, e.g. "utf-8" or "latin1".
    pub encoding: String,

    /// When true, the ".dbf" file is never opened and every Feature has
    /// empty properties.
    pub ignore_properties: bool,
}

impl Default for OpenOptions {
    fn default() -> OpenOptions {
        OpenOptions {
            encoding: DEFAULT_ENCODING.to_string(),
            ignore_properties: false,
        }
    }
}

impl OpenOptions {
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    pub fn encoding(mut self, label: &str) -> OpenOptions {
        self.encoding = label.to_string();
        self
    }

    pub fn ignore_properties(mut self, ignore_properties: bool) -> OpenOptions {
        self.ignore_properties = ignore_properties;
        self
    }

    /// Looks up the encoding by its label.
    pub fn resolve_encoding(&self) -> Result<EncodingRef, ShapefileError> {
        encoding_from_whatwg_label(&self.encoding)
            .ok_or_else(|| ShapefileError::UnknownEncoding(self.encoding.clone()))
    }
}

#[cfg(test)]
mod test {
    use encoding::Encoding;
    use super::*;

    #[test]
    fn defaults_to_windows_1252() {
        let options = OpenOptions::default();
        assert!(!options.ignore_properties);
        assert_eq!("windows-1252", options.resolve_encoding().unwrap().name());
    }

    #[test]
    fn resolves_labels() {
        let options = OpenOptions::new().encoding("UTF8");
        assert_eq!("utf-8", options.resolve_encoding().unwrap().name());
    }

    #[test]
    fn unknown_label() {
        match OpenOptions::new().encoding("klingon").resolve_encoding() {
            Err(ShapefileError::UnknownEncoding(ref label)) if label == "klingon" => {}
            other => panic!("Expected UnknownEncoding, got {:?}", other.map(|e| e.name())),
        }
    }
}
