//! eta-monitor: live arrival monitoring for mobile workers.
//!
//! For every tracked entity the monitor decides whether it is at an
//! appointment or on the move, and whether it will reach its next
//! appointment on time.

pub mod config;
pub mod driver;
pub mod dwell;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod haversine;
pub mod model;
pub mod osrm;
pub mod polyline;
pub mod schedule;
pub mod store;
pub mod tracking;
pub mod traits;
