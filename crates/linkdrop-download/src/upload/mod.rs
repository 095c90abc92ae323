//! Outbound file delivery.

mod retry;
mod sequencer;

pub use retry::with_flood_retry;
pub use sequencer::{UploadSequencer, UploadTick};
