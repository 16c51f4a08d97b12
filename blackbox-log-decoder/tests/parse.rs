//! End-to-end decode tests over synthetic logs
//!
//! Each test builds a small log in memory (and on disk where the path API
//! is exercised) and checks the decoded frame stream against hand-computed
//! values.

use blackbox_log_decoder::{
    DecodeError, EventType, FrameType, Parser, ParserConfig, Reader, LOG_SIGNATURE,
};
use std::io::Write;

/// Base header stub shared by most tests (two unsigned VB main fields)
fn base_headers() -> Vec<String> {
    [
        "I interval:1",
        "P interval:1/1",
        "Field I name:loopIteration,time",
        "Field I signed:0,0",
        "Field I predictor:0,0",
        "Field I encoding:1,1",
    ]
    .map(String::from)
    .to_vec()
}

fn build_session(headers: &[String], payload: &[u8]) -> Vec<u8> {
    let mut data = LOG_SIGNATURE.to_vec();
    data.push(b'\n');
    for line in headers {
        data.extend_from_slice(format!("H {}\n", line).as_bytes());
    }
    data.extend_from_slice(payload);
    data
}

fn parser_over(data: Vec<u8>, allow_invalid_header: bool) -> Parser {
    let mut reader = Reader::from_bytes(data, allow_invalid_header).unwrap();
    reader.set_log_index(1).unwrap();
    Parser::from_reader(reader).unwrap()
}

#[test]
fn single_session_minimum() {
    // S1: one intra frame of two unsigned VB zeros
    let data = build_session(&base_headers(), b"I\x00\x00");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();

    let mut parser = Parser::load(file.path(), ParserConfig::default()).unwrap();
    assert_eq!(parser.reader().log_count(), 1);
    assert_eq!(parser.field_names(), ["loopIteration", "time"]);

    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_type, FrameType::Intra);
    assert_eq!(frames[0].data, vec![0, 0]);
    assert_eq!(frames[0].start_offset, 0);
    assert_eq!(frames[0].end_offset, 3);
}

#[test]
fn inter_frame_applies_previous_predictor() {
    // S2: P frame with PREVIOUS predictor and signed VB deltas of 0 and +1
    let mut headers = base_headers();
    headers.extend(
        [
            "Field P predictor:1,1",
            "Field P signed:0,0",
            "Field P encoding:0,0",
        ]
        .map(String::from),
    );
    let data = build_session(&headers, b"I\x00\x00P\x00\x02");
    let mut parser = parser_over(data, false);

    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].frame_type, FrameType::Intra);
    assert_eq!(frames[1].frame_type, FrameType::Inter);
    assert_eq!(frames[1].data, vec![0, 1]);
}

#[test]
fn tag8_8svb_group_fills_eight_fields() {
    // S3: one eight-field group, tag byte 0b00000101, payload 02 04
    let headers: Vec<String> = [
        "I interval:1",
        "P interval:1/1",
        "Field I name:a,b,c,d,e,f,g,h",
        "Field I signed:1,1,1,1,1,1,1,1",
        "Field I predictor:0,0,0,0,0,0,0,0",
        "Field I encoding:6,6,6,6,6,6,6,6",
    ]
    .map(String::from)
    .to_vec();
    let data = build_session(&headers, &[b'I', 0b0000_0101, 0x02, 0x04]);
    let mut parser = parser_over(data, false);

    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, vec![1, 0, 2, 0, 0, 0, 0, 0]);
}

#[test]
fn merged_file_sessions_are_indexed() {
    // S4: signatures at offsets 0 and 4096
    let mut data = build_session(&base_headers(), &[b'I', 0x01, 0x01]);
    assert!(data.len() < 4096);
    data.resize(4096, 0x2A);
    data.extend_from_slice(&build_session(&base_headers(), &[b'I', 0x07, 0x07]));

    let mut reader = Reader::from_bytes(data, false).unwrap();
    assert_eq!(reader.log_count(), 2);
    assert_eq!(reader.log_pointers(), &[0, 4096]);

    reader.set_log_index(2).unwrap();
    let mut parser = Parser::from_reader(reader).unwrap();
    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, vec![7, 7]);
}

#[test]
fn invalid_header_strict_and_permissive() {
    // S5: valid header lines but no product signature
    let mut data = Vec::new();
    for line in base_headers() {
        data.extend_from_slice(format!("H {}\n", line).as_bytes());
    }
    data.extend_from_slice(b"I\x00\x00");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();

    let strict = Parser::load(file.path(), ParserConfig::default());
    assert!(matches!(strict, Err(DecodeError::InvalidHeader { .. })));

    let config = ParserConfig::new().with_allow_invalid_header(true);
    let mut parser = Parser::load(file.path(), config).unwrap();
    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, vec![0, 0]);
}

#[test]
fn resync_keeps_surrounding_frames() {
    // S6: a stray byte between two well-formed intra frames
    let data = build_session(&base_headers(), b"I\x00\x00\x2AI\x01\x01");
    let mut parser = parser_over(data, false);

    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].data, vec![0, 0]);
    assert_eq!(frames[1].data, vec![1, 1]);
    assert!(parser.stats().resync_count >= 1);
}

/// Headers describing all five numeric frame types
fn full_headers() -> Vec<String> {
    [
        "Data version:2",
        "I interval:1",
        "P interval:1/1",
        "vbatref:420",
        "minthrottle:1150",
        "motorOutput:48,2047",
        "Field I name:loopIteration,time",
        "Field I signed:0,0",
        "Field I predictor:0,0",
        "Field I encoding:1,1",
        "Field P predictor:6,2",
        "Field P signed:0,0",
        "Field P encoding:9,0",
        "Field S name:flightModeFlags,stateFlags",
        "Field S signed:0,0",
        "Field S predictor:0,0",
        "Field S encoding:1,1",
        "Field G name:time,GPS_numSat,GPS_coord[0],GPS_coord[1]",
        "Field G signed:0,0,1,1",
        "Field G predictor:10,0,7,7",
        "Field G encoding:1,1,0,0",
        "Field H name:GPS_home[0],GPS_home[1]",
        "Field H signed:1,1",
        "Field H predictor:0,0",
        "Field H encoding:0,0",
    ]
    .map(String::from)
    .to_vec()
}

fn full_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    // I: loopIteration=1, time=1000
    payload.extend_from_slice(&[b'I', 0x01, 0xE8, 0x07]);
    // H: home = (100, -50)
    payload.extend_from_slice(&[b'H', 0xC8, 0x01, 0x63]);
    // G: time=+10 vs last main, numSat=8, coords offset by home
    payload.extend_from_slice(&[b'G', 0x0A, 0x08, 0x0A, 0x05]);
    // S: flags 3, 1
    payload.extend_from_slice(&[b'S', 0x03, 0x01]);
    // P: iteration increments, time extrapolates +16
    payload.extend_from_slice(&[b'P', 0x20]);
    // end of log event
    payload.extend_from_slice(b"E\xFFEnd of log\x00");
    payload
}

#[test]
fn all_frame_types_decode() {
    let data = build_session(&full_headers(), &full_payload());
    let mut parser = parser_over(data, false);
    let frames: Vec<_> = parser.frames().collect();

    let types: Vec<_> = frames.iter().map(|frame| frame.frame_type).collect();
    assert_eq!(
        types,
        vec![
            FrameType::Intra,
            FrameType::GpsHome,
            FrameType::Gps,
            FrameType::Slow,
            FrameType::Inter,
        ]
    );

    assert_eq!(frames[0].data, vec![1, 1000]);
    assert_eq!(frames[1].data, vec![100, -50]);
    assert_eq!(frames[2].data, vec![1010, 8, 105, -53]);
    assert_eq!(frames[3].data, vec![3, 1]);
    assert_eq!(frames[4].data, vec![2, 1016]);

    // every frame matches its declared field count
    let defs = parser.reader().field_defs();
    for frame in &frames {
        assert_eq!(frame.data.len(), defs[&frame.frame_type].len());
    }

    let events = parser.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::EndOfLog);
    assert_eq!(parser.stats().resync_count, 0);
}

#[test]
fn main_frame_time_is_non_decreasing() {
    // I frame then a run of P frames with positive time deltas
    let mut payload = vec![b'I', 0x01, 0xE8, 0x07];
    for _ in 0..5 {
        payload.extend_from_slice(&[b'P', 0x14]);
    }
    let data = build_session(&full_headers(), &payload);
    let mut parser = parser_over(data, false);

    let time_index = parser
        .field_names()
        .iter()
        .position(|name| name == "time")
        .unwrap();
    let mut last_time = None;
    for frame in parser.frames() {
        let time = frame.data[time_index];
        if let Some(last) = last_time {
            assert!(time >= last, "time went backwards: {} -> {}", last, time);
        }
        last_time = Some(time);
    }
    assert_eq!(parser.stats().frames_parsed, 6);
}

#[test]
fn extracted_session_round_trips() {
    // splicing a session out of a merged file decodes identically
    let mut data = build_session(&base_headers(), &[b'I', 0x02, 0x03]);
    data.resize(2048, 0x2A);
    data.extend_from_slice(&build_session(&full_headers(), &full_payload()));

    let mut reader = Reader::from_bytes(data, false).unwrap();
    let extracted = reader.session_bytes(2).unwrap().to_vec();
    reader.set_log_index(2).unwrap();
    let mut merged_parser = Parser::from_reader(reader).unwrap();
    let merged_frames: Vec<_> = merged_parser.frames().collect();

    let mut standalone = Reader::from_bytes(extracted, false).unwrap();
    standalone.set_log_index(1).unwrap();
    let mut standalone_parser = Parser::from_reader(standalone).unwrap();
    let standalone_frames: Vec<_> = standalone_parser.frames().collect();

    assert_eq!(merged_frames, standalone_frames);
    assert!(!merged_frames.is_empty());
}

#[test]
fn reselecting_a_session_restarts_it() {
    let data = build_session(&full_headers(), &full_payload());
    let mut parser = parser_over(data, false);

    let first_pass: Vec<_> = parser.frames().collect();
    assert!(parser.frames().next().is_none());

    parser.set_log_index(1).unwrap();
    let second_pass: Vec<_> = parser.frames().collect();
    assert_eq!(first_pass, second_pass);
}

#[test]
fn headers_are_exposed_without_field_keys() {
    let data = build_session(&full_headers(), &full_payload());
    let parser = parser_over(data, false);

    let headers = parser.headers();
    assert_eq!(headers.get("vbatref").map(String::as_str), Some("420"));
    assert!(headers.keys().all(|key| !key.starts_with("Field ")));
    assert!(parser.reader().headers().get("Field I name").is_some());
}

#[test]
fn decoding_stops_at_end_of_log_event() {
    // a trailing intra frame after the end-of-log marker is not decoded
    let mut payload = full_payload();
    payload.extend_from_slice(&[b'I', 0x01, 0x01]);
    let data = build_session(&full_headers(), &payload);
    let mut parser = parser_over(data, false);

    let frames: Vec<_> = parser.frames().collect();
    assert_eq!(frames.len(), 5);
    assert_eq!(parser.events().len(), 1);
}
