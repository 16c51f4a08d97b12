//! Blackbox Log Decoder Library
//!
//! A library for decoding Cleanflight/Betaflight blackbox flight-data
//! recorder logs into structured frames of named numeric fields.
//!
//! # Architecture
//!
//! The library is intentionally minimal and focused on decoding:
//! - Locates the sessions concatenated inside a (possibly merged) log file
//! - Parses the ASCII header into field definitions (name, signedness,
//!   predictor, encoding)
//! - Reconstructs main (I/P), slow, GPS and GPS-home frames through the
//!   variable-length codec and the predictor engine
//! - Surfaces log events (sync beeps, flight-mode changes, end of log)
//!
//! The library does NOT:
//! - Write CSV/GPX or split files
//! - Interpret units (microseconds, degrees) or smooth the data
//! - Repair corrupt streams beyond resynchronisation
//!
//! All higher-level functionality lives in the application layer
//! (blackbox-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use blackbox_log_decoder::{Parser, ParserConfig};
//!
//! let mut parser = Parser::load("flight.bbl", ParserConfig::default()).unwrap();
//! println!("sessions: {}", parser.reader().log_count());
//! println!("fields: {:?}", parser.field_names());
//!
//! for frame in parser.frames() {
//!     println!("{} {:?}", frame.frame_type, frame.data);
//! }
//!
//! // events are complete once the frame iterator is exhausted
//! for event in parser.events() {
//!     println!("{:?}", event);
//! }
//! ```

// Public modules
pub mod config;
pub mod encoding;
pub mod headers;
pub mod parser;
pub mod predictor;
pub mod reader;
pub mod stream;
pub mod types;

// Re-export main types for convenience
pub use config::ParserConfig;
pub use encoding::Encoding;
pub use headers::Headers;
pub use parser::{Frames, Parser};
pub use predictor::Predictor;
pub use reader::{Reader, LOG_SIGNATURE};
pub use types::{
    DecodeError, Event, EventType, FieldDef, Frame, FrameType, ParserStats, Result,
};

// Internal modules (not exposed in the public API)
mod events;
mod frame;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
