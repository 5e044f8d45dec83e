//! Real Dresden locations for test fixtures.
//!
//! Coordinates sourced from OpenStreetMap. They are routable with the OSRM
//! Saxony extract.

use eta_monitor::model::GeoPoint;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

pub const FRAUENKIRCHE: Location = Location::new("Frauenkirche", 51.0519, 13.7415);
pub const ZWINGER: Location = Location::new("Zwinger", 51.0530, 13.7339);
pub const HAUPTBAHNHOF: Location = Location::new("Dresden Hauptbahnhof", 51.0404, 13.7320);
pub const NEUSTADT_BAHNHOF: Location = Location::new("Bahnhof Neustadt", 51.0656, 13.7412);
pub const BLAUES_WUNDER: Location = Location::new("Blaues Wunder", 51.0525, 13.8085);
pub const TU_DRESDEN: Location = Location::new("TU Dresden Hörsaalzentrum", 51.0298, 13.7296);

/// Technician depots used as home locations.
pub const DEPOTS: &[Location] = &[
    Location::new("Depot Friedrichstadt", 51.0590, 13.7120),
    Location::new("Depot Striesen", 51.0450, 13.7800),
];

/// One latitude degree is about 111.2 km; these offsets move a point north.
pub const FIFTY_METRES_LAT: f64 = 0.00045;
pub const HUNDRED_METRES_LAT: f64 = 0.0009;
pub const SIX_HUNDRED_METRES_LAT: f64 = 0.0054;

/// `point` moved north by `offset` degrees.
pub fn north_of(point: GeoPoint, offset: f64) -> GeoPoint {
    GeoPoint::new(point.latitude + offset, point.longitude)
}
