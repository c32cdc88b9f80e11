//! Readers for on-disk formats.
pub mod shapefile;
