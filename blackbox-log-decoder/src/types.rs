//! Core types for the blackbox decoder library
//!
//! This module defines the value types the decoder emits while processing
//! log files, plus the library error type. The decoder only reconstructs
//! field values - it does not interpret units or smooth the data.

use crate::encoding::Encoding;
use crate::predictor::Predictor;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// The frame-type letters that appear in the binary payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameType {
    /// Intra frames are self-contained key frames
    Intra,
    /// Inter frames hold deltas against the previous main frame
    Inter,
    /// Slow frames carry low-frequency state (flags, modes)
    Slow,
    /// GPS position frames
    Gps,
    /// GPS home position frames
    GpsHome,
    /// Log event records
    Event,
}

impl FrameType {
    /// Map a payload byte to a frame type, if it is a valid type letter
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'I' => Some(FrameType::Intra),
            b'P' => Some(FrameType::Inter),
            b'S' => Some(FrameType::Slow),
            b'G' => Some(FrameType::Gps),
            b'H' => Some(FrameType::GpsHome),
            b'E' => Some(FrameType::Event),
            _ => None,
        }
    }

    /// The ASCII letter used for this frame type in headers and payload
    pub fn letter(&self) -> char {
        match self {
            FrameType::Intra => 'I',
            FrameType::Inter => 'P',
            FrameType::Slow => 'S',
            FrameType::Gps => 'G',
            FrameType::GpsHome => 'H',
            FrameType::Event => 'E',
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Event record types found in 'E' frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    SyncBeep,
    AutotuneCycleStart,
    AutotuneCycleResult,
    AutotuneTargets,
    InflightAdjustment,
    LoggingResume,
    GtuneCycleResult,
    FlightMode,
    TwitchTest,
    EndOfLog,
}

impl EventType {
    /// Map an event-subtype byte to an event type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(EventType::SyncBeep),
            10 => Some(EventType::AutotuneCycleStart),
            11 => Some(EventType::AutotuneCycleResult),
            12 => Some(EventType::AutotuneTargets),
            13 => Some(EventType::InflightAdjustment),
            14 => Some(EventType::LoggingResume),
            20 => Some(EventType::GtuneCycleResult),
            30 => Some(EventType::FlightMode),
            40 => Some(EventType::TwitchTest),
            255 => Some(EventType::EndOfLog),
            _ => None,
        }
    }
}

/// One fully reconstructed frame
///
/// `data[k]` is the logical value of the k-th field declared in the header
/// for this frame type. Offsets are byte positions within the session
/// payload, so `[start_offset, end_offset)` is the raw extent of the frame
/// including its type byte.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub frame_type: FrameType,
    pub data: Vec<i64>,
    pub start_offset: u64,
    pub end_offset: u64,
}

/// A log event decoded from an 'E' frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_type: EventType,
    pub data: HashMap<String, i64>,
}

/// Definition of a single logged field within one frame type
///
/// Built from the `Field <T> name/signed/predictor/encoding` header lists.
/// Fields whose encoding emits several values at once form a group;
/// `group_index` is the position within that group and `group_len` its
/// total size (0 and 1 for ordinary scalar fields).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub signed: bool,
    pub predictor: Predictor,
    pub encoding: Encoding,
    pub group_index: usize,
    pub group_len: usize,
}

/// Decode counters kept while iterating a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    /// Frames whose type byte was recognised (events included)
    pub frames_read: u64,
    /// Numeric frames fully decoded and emitted
    pub frames_parsed: u64,
    /// Frames aborted by a codec or predictor fault
    pub frames_failed: u64,
    /// Events decoded from 'E' frames
    pub events_read: u64,
    /// Times the decoder had to skip bytes to find a valid frame boundary
    pub resync_count: u64,
}

/// Errors that can occur while reading a log
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid header at offset 0x{offset:X}: product signature not found")]
    InvalidHeader { offset: u64 },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("no log with index {index} (file contains {count})")]
    NoSuchLog { index: usize, count: usize },

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_round_trip() {
        for byte in [b'I', b'P', b'S', b'G', b'H', b'E'] {
            let ftype = FrameType::from_byte(byte).unwrap();
            assert_eq!(ftype.letter() as u8, byte);
        }
        assert_eq!(FrameType::from_byte(b'*'), None);
        assert_eq!(FrameType::from_byte(0x00), None);
    }

    #[test]
    fn event_type_from_byte() {
        assert_eq!(EventType::from_byte(0), Some(EventType::SyncBeep));
        assert_eq!(EventType::from_byte(30), Some(EventType::FlightMode));
        assert_eq!(EventType::from_byte(255), Some(EventType::EndOfLog));
        assert_eq!(EventType::from_byte(99), None);
    }
}
