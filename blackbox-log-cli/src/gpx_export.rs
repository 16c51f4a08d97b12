//! GPX export of GPS frames
//!
//! Turns G frames into a GPX 1.1 track, one track segment per session.
//! Coordinates are logged in 1e-7 degree units. Absolute point times are
//! derived from the `Log start datetime` header when the firmware recorded
//! one; without it the points carry no timestamps.

use anyhow::{bail, Context, Result};
use blackbox_log_decoder::{FrameType, Parser, ParserConfig};
use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Positions of the fields a track point needs within the G field list
struct GpsFieldIndices {
    time: Option<usize>,
    lat: usize,
    lon: usize,
    altitude: Option<usize>,
}

impl GpsFieldIndices {
    fn from_parser(parser: &Parser) -> Result<Self> {
        let defs = parser
            .reader()
            .field_defs()
            .get(&FrameType::Gps)
            .ok_or_else(|| anyhow::anyhow!("log declares no GPS fields"))?;
        let position = |name: &str| defs.iter().position(|def| def.name == name);
        let (Some(lat), Some(lon)) = (position("GPS_coord[0]"), position("GPS_coord[1]")) else {
            bail!("log declares no GPS coordinate fields");
        };
        Ok(GpsFieldIndices {
            time: position("time"),
            lat,
            lon,
            altitude: position("GPS_altitude"),
        })
    }
}

pub fn run(
    path: &Path,
    index: usize,
    output: Option<&Path>,
    allow_invalid_header: bool,
) -> Result<()> {
    let config = ParserConfig::new()
        .with_log_index(index.max(1))
        .with_allow_invalid_header(allow_invalid_header);
    let mut parser =
        Parser::load(path, config).with_context(|| format!("failed to open {:?}", path))?;

    let sessions: Vec<usize> = if index == 0 {
        (1..=parser.reader().log_count()).collect()
    } else {
        vec![index]
    };

    let mut writer: Box<dyn Write> = match output {
        Some(output) => Box::new(BufWriter::new(
            File::create(output).with_context(|| format!("failed to create {:?}", output))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "blackbox".to_string());

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<gpx version="1.1" creator="blackbox-log" xmlns="http://www.topografix.com/GPX/1/1">"#
    )?;
    writeln!(writer, "  <trk>")?;
    writeln!(writer, "    <name>{}</name>", xml_escape(&name))?;

    let mut points = 0u64;
    for session in sessions {
        parser.set_log_index(session)?;
        let indices = GpsFieldIndices::from_parser(&parser)?;
        let start_time = parser
            .headers()
            .get("Log start datetime")
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok());

        writeln!(writer, "    <trkseg>")?;
        let mut first_time_us = None;
        for frame in parser.frames() {
            if frame.frame_type != FrameType::Gps {
                continue;
            }
            let lat = frame.data[indices.lat];
            let lon = frame.data[indices.lon];
            write!(
                writer,
                r#"      <trkpt lat="{}" lon="{}">"#,
                format_coord(lat),
                format_coord(lon)
            )?;
            if let Some(altitude) = indices.altitude {
                write!(writer, "<ele>{}</ele>", frame.data[altitude])?;
            }
            if let (Some(start), Some(time_index)) = (start_time, indices.time) {
                let time_us = frame.data[time_index];
                let first = *first_time_us.get_or_insert(time_us);
                if let Some(stamp) = point_time(start, time_us - first) {
                    write!(writer, "<time>{}</time>", stamp)?;
                }
            }
            writeln!(writer, "</trkpt>")?;
            points += 1;
        }
        writeln!(writer, "    </trkseg>")?;

        let stats = parser.stats();
        if stats.resync_count > 0 {
            log::warn!(
                "session {}: {} resyncs while decoding",
                session,
                stats.resync_count
            );
        }
    }

    writeln!(writer, "  </trk>")?;
    writeln!(writer, "</gpx>")?;
    writer.flush()?;

    log::info!("wrote {} track points", points);
    Ok(())
}

/// A coordinate logged in 1e-7 degree units, as decimal degrees
fn format_coord(raw: i64) -> String {
    format!("{:.7}", raw as f64 / 1e7)
}

fn point_time(start: DateTime<FixedOffset>, offset_us: i64) -> Option<String> {
    let stamp = start.checked_add_signed(TimeDelta::microseconds(offset_us))?;
    Some(stamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
