//! Event record payloads
//!
//! 'E' frames carry a subtype byte followed by a subtype-specific payload.
//! Events travel outside the numeric frame stream and never touch the
//! prediction history.

use crate::encoding::{read_signed_vb, read_unsigned_vb};
use crate::stream::DataStream;
use crate::types::{DecodeError, Event, EventType, Result};
use std::collections::HashMap;

/// ASCII marker the firmware writes after the end-of-log event
pub(crate) const END_OF_LOG_MARKER: &[u8] = b"End of log\x00";

/// Parse one event record, the subtype byte included
///
/// Returns the event plus a flag that is true when the event closes the
/// session.
pub(crate) fn parse_event(stream: &mut DataStream) -> Result<(Event, bool)> {
    let byte = stream.read_u8()?;
    let event_type = EventType::from_byte(byte).ok_or_else(|| {
        DecodeError::MalformedEncoding(format!("unknown event type {:#04x}", byte))
    })?;

    let mut data = HashMap::new();
    let mut end_of_log = false;
    match event_type {
        EventType::SyncBeep => {
            data.insert("time".to_string(), read_unsigned_vb(stream)? as i64);
        }
        EventType::FlightMode => {
            data.insert("new_flags".to_string(), read_unsigned_vb(stream)? as i64);
            data.insert("old_flags".to_string(), read_unsigned_vb(stream)? as i64);
        }
        EventType::LoggingResume => {
            data.insert(
                "logIteration".to_string(),
                read_unsigned_vb(stream)? as i64,
            );
            data.insert("currentTime".to_string(), read_unsigned_vb(stream)? as i64);
        }
        EventType::InflightAdjustment => {
            let function = stream.read_u8()?;
            if function & 0x80 != 0 {
                let mut bytes = [0u8; 4];
                for slot in &mut bytes {
                    *slot = stream.read_u8()?;
                }
                let value = f32::from_le_bytes(bytes);
                data.insert("function".to_string(), (function & 0x7F) as i64);
                data.insert("value".to_string(), value as i64);
                data.insert("is_float".to_string(), 1);
            } else {
                data.insert("function".to_string(), function as i64);
                data.insert("value".to_string(), read_signed_vb(stream)?);
            }
        }
        EventType::EndOfLog => {
            if !stream.starts_with(END_OF_LOG_MARKER) {
                log::warn!("end-of-log event without closing marker");
            }
            end_of_log = true;
        }
        // remaining subtypes carry no payload this decoder records
        _ => {}
    }

    Ok((Event { event_type, data }, end_of_log))
}
