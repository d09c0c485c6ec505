//! Parking lot occupancy monitoring.
//!
//! Spot regions come from a mask once at startup. Every Nth frame a cheap
//! brightness comparison picks the spots that look changed, and only those
//! are passed to the occupancy classifier.

pub mod analytics;
pub mod api;
pub mod camera;
pub mod config;
pub mod spots;
