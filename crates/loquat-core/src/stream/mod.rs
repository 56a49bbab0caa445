//! Assistant stream pipeline
//!
//! - `decoder`: byte chunks to complete lines
//! - `chunk`: line to typed record
//! - `transport`: HTTP body to ordered chunk callbacks, with cancellation

pub mod chunk;
pub mod decoder;
pub mod transport;

pub use chunk::StreamChunk;
pub use decoder::LineDecoder;
pub use transport::{pump_ndjson, stream_ndjson, StreamOutcome};
