//! Payload formats spoken by the cane firmware.

pub mod obstacle;

pub use obstacle::{ObstacleReport, CLEAR_SENTINEL};
