//! Places, coordinates and stop-list ingestion.
//!
//! A place is an opaque free-text address. It only means something to the
//! mapping service; the planner never looks inside it. Stop lists can be read
//! from plain text (one address per line) or from a CSV file whose address
//! column is detected from the header.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A free-text address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Place(String);

impl Place {
    pub fn new(address: impl Into<String>) -> Self {
        Place(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Place {
    fn from(s: &str) -> Self {
        Place::new(s)
    }
}

/// Latitude/longitude pair returned by the geocoder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Coordinate { lat, lng }
    }

    /// Planar squared distance in degrees, good enough for clustering nearby stops
    #[inline]
    pub fn distance_sq(&self, other: &Coordinate) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = self.lng - other.lng;
        dlat * dlat + dlng * dlng
    }
}

/// Input format of a stop list
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StopFormat {
    Text,
    Csv,
}

impl StopFormat {
    /// Pick the format from the file extension; anything but `.csv` is text
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => StopFormat::Csv,
            _ => StopFormat::Text,
        }
    }
}

/// Parse free text: one place per line, trimmed, blank lines dropped.
/// Duplicates are kept in input order.
pub fn parse_text(input: &str) -> Vec<Place> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Place::new)
        .collect()
}

/// Parse a CSV table. The first header containing "address" (any case) selects
/// the column, otherwise the first column is used.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Place>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let column = rdr
        .headers()?
        .iter()
        .position(|h| h.to_ascii_lowercase().contains("address"))
        .unwrap_or(0);
    log::debug!("Reading addresses from CSV column {}", column);

    let mut places = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(cell) = record.get(column) {
            if !cell.is_empty() {
                places.push(Place::new(cell));
            }
        }
    }
    Ok(places)
}

/// Load a stop list from disk, choosing the parser from the extension
pub fn load_stops<P: AsRef<Path>>(path: P) -> Result<Vec<Place>> {
    let file = File::open(&path)?;
    match StopFormat::from_path(&path) {
        StopFormat::Csv => parse_csv(file),
        StopFormat::Text => read_text(BufReader::new(file)),
    }
}

/// Read a free-text stop list from any reader
pub fn read_text<R: Read>(mut reader: R) -> Result<Vec<Place>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(parse_text(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_skips_blank_lines() {
        let places = parse_text("  12 Oak St \n\n\t\n5 Elm Ave\n12 Oak St\n");
        assert_eq!(
            places,
            vec![Place::new("12 Oak St"), Place::new("5 Elm Ave"), Place::new("12 Oak St")]
        );
    }

    #[test]
    fn test_parse_csv_detects_address_column() {
        let data = "name,Street Address,notes\nBob,1 Main St,back door\nAmy,,\nCal,9 Pine Rd,\n";
        let places = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(places, vec![Place::new("1 Main St"), Place::new("9 Pine Rd")]);
    }

    #[test]
    fn test_parse_csv_falls_back_to_first_column() {
        let data = "location,contact\n4 Birch Ln,555-0100\n7 Cedar Ct,555-0101\n";
        let places = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(places, vec![Place::new("4 Birch Ln"), Place::new("7 Cedar Ct")]);
    }

    #[test]
    fn test_read_text_matches_parse_text() {
        let text = "  a \r\n\n\tb\r\n";
        let places = read_text(text.as_bytes()).unwrap();
        assert_eq!(places, parse_text(text));
        assert_eq!(places, vec![Place::new("a"), Place::new("b")]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(StopFormat::from_path("stops.CSV"), StopFormat::Csv);
        assert_eq!(StopFormat::from_path("stops.txt"), StopFormat::Text);
        assert_eq!(StopFormat::from_path("stops"), StopFormat::Text);
    }
}
