//! Progress tracking and throttling.
//!
//! This module handles rate-limiting of status edits and the text rendered
//! into them.

pub mod render;
mod reporter;
mod throttle;

pub use reporter::ProgressReporter;
pub use throttle::ProgressThrottle;
