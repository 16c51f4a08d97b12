//! Frame decoding state machine
//!
//! [`FrameDecoder`] walks the binary payload of one session: it reads a
//! frame-type byte, decodes the field layout declared for that type,
//! applies predictors against the sliding history and emits the
//! reconstructed frame. Unrecognised or faulty stretches are skipped by
//! resynchronising on the next valid type byte.

use crate::events::parse_event;
use crate::predictor::{HeaderBaselines, PredictorContext};
use crate::reader::Reader;
use crate::stream::DataStream;
use crate::types::{DecodeError, Event, FieldDef, Frame, FrameType, ParserStats, Result};

/// Sliding decode history, one per session
///
/// `last`/`last2` hold the two most recent main (I/P) frames; intra frames
/// reset both to themselves. Slow and GPS-home frames keep their own slots
/// and never disturb the main history.
#[derive(Debug, Default)]
pub(crate) struct History {
    pub last: Vec<i64>,
    pub last2: Vec<i64>,
    pub main_valid: bool,
    pub last_slow: Vec<i64>,
    pub gps_home: Vec<i64>,
}

/// Decoder for the payload of the currently selected session
pub(crate) struct FrameDecoder {
    pos: usize,
    end_of_log: bool,
    finished: bool,
    in_resync: bool,
    history: History,
    baselines: HeaderBaselines,
    time_index: Option<usize>,
    motor0_index: Option<usize>,
    iteration_index: Option<usize>,
    i_interval: i64,
    p_num: i64,
    p_denom: i64,
    last_iteration: Option<i64>,
    stats: ParserStats,
}

impl FrameDecoder {
    /// Build a decoder for the session the reader currently has selected
    pub fn new(reader: &Reader) -> Result<Self> {
        let headers = reader.headers();
        let (motor_min, _) = headers.motor_output()?;
        let baselines = HeaderBaselines {
            minthrottle: headers.minthrottle()?,
            vbatref: headers.vbatref()?,
            motor_min: motor_min as i64,
        };
        let (p_num, p_denom) = headers.p_interval()?;
        let intra_defs = reader.field_defs().get(&FrameType::Intra);
        let position_of = |name: &str| {
            intra_defs.and_then(|defs| defs.iter().position(|def| def.name == name))
        };
        Ok(FrameDecoder {
            pos: 0,
            end_of_log: false,
            finished: false,
            in_resync: false,
            history: History::default(),
            baselines,
            time_index: position_of("time"),
            motor0_index: position_of("motor[0]"),
            iteration_index: position_of("loopIteration"),
            i_interval: headers.i_interval()? as i64,
            p_num: p_num as i64,
            p_denom: p_denom as i64,
            last_iteration: None,
            stats: ParserStats::default(),
        })
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Decode forward until the next numeric frame
    ///
    /// Events encountered on the way are appended to `events`. Returns
    /// `None` once the session is exhausted or closed by an end-of-log
    /// event.
    pub fn next_frame(&mut self, reader: &Reader, events: &mut Vec<Event>) -> Option<Frame> {
        let payload = reader.payload();
        loop {
            if self.end_of_log || self.pos >= payload.len() {
                return self.finish();
            }
            let mut stream = DataStream::new(payload);
            stream.seek(self.pos);
            let start = stream.tell();
            let byte = match stream.read_u8() {
                Ok(byte) => byte,
                Err(_) => return self.finish(),
            };

            let Some(frame_type) = FrameType::from_byte(byte) else {
                if !self.in_resync {
                    self.in_resync = true;
                    self.stats.resync_count += 1;
                    log::warn!("unknown frame type {:#04x} at {:#X}, resyncing", byte, start);
                }
                self.pos = start + 1;
                continue;
            };
            self.in_resync = false;
            self.stats.frames_read += 1;

            if frame_type == FrameType::Event {
                match parse_event(&mut stream) {
                    Ok((event, end_of_log)) => {
                        self.pos = stream.tell();
                        self.stats.events_read += 1;
                        log::debug!("event {:?} at {:#X}", event.event_type, start);
                        events.push(event);
                        if end_of_log {
                            self.end_of_log = true;
                        }
                        continue;
                    }
                    Err(DecodeError::UnexpectedEof) => return self.finish(),
                    Err(error) => {
                        self.abort_frame(start, &error);
                        continue;
                    }
                }
            }

            let Some(defs) = reader.field_defs().get(&frame_type) else {
                log::warn!("no field definitions for '{}' frames", frame_type);
                self.stats.resync_count += 1;
                self.pos = start + 1;
                continue;
            };
            if frame_type == FrameType::Inter && !self.history.main_valid {
                log::debug!("discarding '{}' frame at {:#X} before any key frame", frame_type, start);
                self.stats.resync_count += 1;
                self.pos = start + 1;
                continue;
            }

            match self.decode_fields(frame_type, defs, &mut stream) {
                Ok(data) => {
                    let end = stream.tell();
                    self.pos = end;
                    self.promote(frame_type, &data);
                    self.stats.frames_parsed += 1;
                    return Some(Frame {
                        frame_type,
                        data,
                        start_offset: start as u64,
                        end_offset: end as u64,
                    });
                }
                Err(DecodeError::UnexpectedEof) => return self.finish(),
                Err(error) => {
                    self.abort_frame(start, &error);
                    continue;
                }
            }
        }
    }

    /// Drop the frame that started at `start` and rescan from the next byte
    fn abort_frame(&mut self, start: usize, error: &DecodeError) {
        log::warn!("dropping frame at {:#X}: {}", start, error);
        self.stats.frames_failed += 1;
        self.stats.resync_count += 1;
        self.pos = start + 1;
    }

    fn finish(&mut self) -> Option<Frame> {
        if !self.finished {
            self.finished = true;
            log::info!(
                "frames: read: {}, parsed: {}, failed: {}, events: {}, resyncs: {}",
                self.stats.frames_read,
                self.stats.frames_parsed,
                self.stats.frames_failed,
                self.stats.events_read,
                self.stats.resync_count,
            );
        }
        None
    }

    /// Decode every field of one frame and apply its predictor
    fn decode_fields(
        &mut self,
        frame_type: FrameType,
        defs: &[FieldDef],
        stream: &mut DataStream,
    ) -> Result<Vec<i64>> {
        let skipped_frames = if frame_type == FrameType::Inter {
            self.count_skipped_frames()
        } else {
            0
        };
        let mut data = Vec::with_capacity(defs.len());
        let mut raws = Vec::new();
        let mut index = 0;
        while index < defs.len() {
            let def = &defs[index];
            raws.clear();
            def.encoding.decode(stream, def.group_len, &mut raws)?;
            debug_assert_eq!(raws.len(), def.group_len);
            for (offset, &raw) in raws.iter().enumerate() {
                let def = &defs[index + offset];
                let ctx = PredictorContext {
                    frame_type,
                    field_index: index + offset,
                    current: &data,
                    history: &self.history,
                    baselines: &self.baselines,
                    time_index: self.time_index,
                    motor0_index: self.motor0_index,
                    skipped_frames,
                };
                let value = def.predictor.apply(raw, &ctx);
                // logical values are 32-bit; keep unsigned fields non-negative
                data.push(if def.signed {
                    value as i32 as i64
                } else {
                    value as u32 as i64
                });
            }
            index += raws.len();
        }
        Ok(data)
    }

    /// Shift the history after an accepted frame
    fn promote(&mut self, frame_type: FrameType, data: &[i64]) {
        match frame_type {
            FrameType::Intra => {
                self.history.last = data.to_vec();
                self.history.last2 = data.to_vec();
                self.history.main_valid = true;
            }
            FrameType::Inter => {
                std::mem::swap(&mut self.history.last2, &mut self.history.last);
                self.history.last = data.to_vec();
            }
            FrameType::Slow => self.history.last_slow = data.to_vec(),
            FrameType::GpsHome => self.history.gps_home = data.to_vec(),
            FrameType::Gps | FrameType::Event => {}
        }
        if matches!(frame_type, FrameType::Intra | FrameType::Inter) {
            if let Some(index) = self.iteration_index {
                self.last_iteration = data.get(index).copied();
            }
        }
    }

    /// Loop iterations the logging rhythm skipped since the last main frame
    fn count_skipped_frames(&self) -> i64 {
        let Some(last) = self.last_iteration else {
            return 0;
        };
        let mut index = last + 1;
        while !should_log_iteration(index, self.i_interval, self.p_num, self.p_denom) {
            index += 1;
        }
        index - last - 1
    }
}

/// Whether the `I interval`/`P interval` rhythm logs a frame at `index`
fn should_log_iteration(index: i64, i_interval: i64, p_num: i64, p_denom: i64) -> bool {
    (index % i_interval + p_num - 1) % p_denom < p_num
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::LOG_SIGNATURE;

    #[test]
    fn every_iteration_logged_at_full_rate() {
        for index in 0..16 {
            assert!(should_log_iteration(index, 1, 1, 1));
        }
    }

    #[test]
    fn half_rate_logs_every_other_iteration() {
        let logged: Vec<i64> = (0..8)
            .filter(|&index| should_log_iteration(index, 1, 1, 2))
            .collect();
        assert_eq!(logged, vec![0, 2, 4, 6]);
    }

    fn session(payload: &[u8]) -> Vec<u8> {
        let mut data = LOG_SIGNATURE.to_vec();
        data.push(b'\n');
        for line in [
            "I interval:1",
            "P interval:1/1",
            "Field I name:loopIteration,time",
            "Field I signed:0,0",
            "Field I predictor:0,0",
            "Field I encoding:1,1",
            "Field P predictor:6,1",
            "Field P signed:0,0",
            "Field P encoding:9,0",
        ] {
            data.extend_from_slice(format!("H {}\n", line).as_bytes());
        }
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn intra_then_inter_history() {
        // I(4, 100) then P with time delta +5
        let data = session(&[b'I', 0x04, 0x64, b'P', 0x0A]);
        let mut reader = Reader::from_bytes(data, false).unwrap();
        reader.set_log_index(1).unwrap();
        let mut decoder = FrameDecoder::new(&reader).unwrap();
        let mut events = Vec::new();

        let intra = decoder.next_frame(&reader, &mut events).unwrap();
        assert_eq!(intra.frame_type, FrameType::Intra);
        assert_eq!(intra.data, vec![4, 100]);
        assert_eq!(intra.start_offset, 0);
        assert_eq!(intra.end_offset, 3);

        let inter = decoder.next_frame(&reader, &mut events).unwrap();
        assert_eq!(inter.frame_type, FrameType::Inter);
        assert_eq!(inter.data, vec![5, 105]);

        assert!(decoder.next_frame(&reader, &mut events).is_none());
    }

    #[test]
    fn inter_before_intra_is_discarded() {
        let data = session(&[b'P', 0x0A, b'I', 0x00, 0x00]);
        let mut reader = Reader::from_bytes(data, false).unwrap();
        reader.set_log_index(1).unwrap();
        let mut decoder = FrameDecoder::new(&reader).unwrap();
        let mut events = Vec::new();

        let first = decoder.next_frame(&reader, &mut events).unwrap();
        assert_eq!(first.frame_type, FrameType::Intra);
        assert!(decoder.stats().resync_count >= 1);
    }
}
