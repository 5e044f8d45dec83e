//! Test fixtures for eta-monitor.
//!
//! Real Dresden locations plus builders for appointments, reports and mock
//! collaborators.

#![allow(dead_code)]

pub mod dresden_locations;
pub mod mocks;

pub use dresden_locations::*;
pub use mocks::*;
