//! A shapefile as a stream of events: one Header, then Features, then
//! exactly one End or Error.
use std::fs;
use std::io;
use std::mem;
use std::path::Path;

use crate::feature::Feature;
use super::options::OpenOptions;
use super::shapefile::{self, ShapefileError, ShapefileReader};
use super::shp::ShpHeader;

#[derive(Debug)]
pub enum Event {
    /// The ".shp" header parsed. Always first, unless opening failed.
    Header(ShpHeader),
    Feature(Feature),
    /// Terminal: nothing follows.
    Error(ShapefileError),
    /// Terminal: nothing follows.
    End,
}

enum State<R: io::Read> {
    Opened(Result<ShapefileReader<R>, ShapefileError>),
    Reading(ShapefileReader<R>),
    Finished,
}

/// Iterates over Events. After End or Error, `next()` returns None -- and the
/// underlying reader (and its file handle) has already been dropped.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shapegeo::read::shapefile::{self, Event, OpenOptions};
///
/// for event in shapefile::open_events(Path::new("roads.shp"), &OpenOptions::default()) {
///     match event {
///         Event::Header(header) => println!("{:?}", header.shape_type),
///         Event::Feature(feature) => println!("{}", feature),
///         Event::Error(err) => eprintln!("{}", err),
///         Event::End => println!("done"),
///     }
/// }
/// ```
pub struct Events<R: io::Read> {
    state: State<R>,
}

impl<R: io::Read> Events<R> {
    pub fn new(opened: Result<ShapefileReader<R>, ShapefileError>) -> Events<R> {
        Events { state: State::Opened(opened) }
    }
}

impl<R: io::Read> From<ShapefileReader<R>> for Events<R> {
    fn from(reader: ShapefileReader<R>) -> Events<R> {
        Events::new(Ok(reader))
    }
}

impl<R: io::Read> Iterator for Events<R> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        match mem::replace(&mut self.state, State::Finished) {
            State::Finished => None,
            State::Opened(Err(err)) => Some(Event::Error(err)),
            State::Opened(Ok(reader)) => {
                let header = *reader.header();
                self.state = State::Reading(reader);
                Some(Event::Header(header))
            }
            State::Reading(mut reader) => match reader.next() {
                None => {
                    debug!("Finished reading {} features", reader.n_features());
                    Some(Event::End)
                }
                Some(Err(err)) => Some(Event::Error(err)),
                Some(Ok(feature)) => {
                    self.state = State::Reading(reader);
                    Some(Event::Feature(feature))
                }
            },
        }
    }
}

/// Opens by ".shp" filename, like `shapefile::open()`, but reports failures
/// to open as an `Event::Error` instead of an `Err`.
pub fn open_events(path: &Path, options: &OpenOptions) -> Events<io::BufReader<fs::File>> {
    Events::new(shapefile::open(path, options))
}
