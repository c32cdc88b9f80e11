extern crate clap;
extern crate env_logger;
#[macro_use] extern crate log;
extern crate serde_json;
extern crate shapegeo;

use std::error::Error;
use std::io;
use std::io::Write;
use std::path::Path;
use std::process;
use clap::{App, Arg};
use shapegeo::read::shapefile::{self, Event, OpenOptions, DEFAULT_ENCODING};

/// Writes every Feature as GeoJSON: either one FeatureCollection, or one
/// Feature per line.
fn run(path: &Path, options: &OpenOptions, ndjson: bool) -> Result<usize, Box<dyn Error>> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut n_features: usize = 0;

    for event in shapefile::open_events(path, options) {
        match event {
            Event::Header(header) => {
                info!("Reading {:?} shapes within {:?}", header.shape_type, header.bounding_box);
                if !ndjson {
                    write!(out, "{{\"type\":\"FeatureCollection\",\"features\":[")?;
                }
            }
            Event::Feature(feature) => {
                if ndjson {
                    writeln!(out, "{}", serde_json::to_string(&feature.to_json())?)?;
                } else {
                    if n_features > 0 {
                        write!(out, ",")?;
                    }
                    write!(out, "\n{}", serde_json::to_string(&feature.to_json())?)?;
                }
                n_features += 1;
            }
            Event::Error(err) => {
                out.flush()?;
                return Err(Box::new(err));
            }
            Event::End => {
                if !ndjson {
                    writeln!(out, "\n]}}")?;
                }
            }
        }
    }

    out.flush()?;
    Ok(n_features)
}

fn main() {
    env_logger::init();

    let matches = App::new("shp2geojson")
        .about("Converts a .shp/.dbf pair to GeoJSON on stdout")
        .arg(Arg::with_name("SHP_PATH")
            .help(".shp file, with or without the .shp extension")
            .required(true)
            .index(1))
        .arg(Arg::with_name("encoding")
            .long("encoding")
            .short("e")
            .value_name("LABEL")
            .help(".dbf text encoding")
            .default_value(DEFAULT_ENCODING)
            .takes_value(true))
        .arg(Arg::with_name("ignore-properties")
            .long("ignore-properties")
            .help("Skip the .dbf file; every Feature gets empty properties"))
        .arg(Arg::with_name("ndjson")
            .long("ndjson")
            .help("Write one Feature per line instead of a FeatureCollection"))
        .get_matches();

    let path = Path::new(matches.value_of("SHP_PATH").unwrap_or_default());
    let options = OpenOptions::new()
        .encoding(matches.value_of("encoding").unwrap_or(DEFAULT_ENCODING))
        .ignore_properties(matches.is_present("ignore-properties"));

    match run(path, &options, matches.is_present("ndjson")) {
        Ok(n_features) => {
            info!("Wrote {} features", n_features);
        }
        Err(err) => {
            writeln!(&mut io::stderr(), "Error during read: {}", err).unwrap_or(());
            process::exit(1);
        }
    }
}
