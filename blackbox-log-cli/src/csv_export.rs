//! CSV export of main frame data
//!
//! Writes one header row of I-frame field names followed by one row per
//! decoded main (I/P) frame. Slow, GPS and event records are skipped; the
//! resync counter is reported on the warning channel so the user learns
//! about damaged stretches.

use anyhow::{bail, Context, Result};
use blackbox_log_decoder::{FrameType, Parser, ParserConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub fn run(
    path: &Path,
    index: usize,
    output: Option<&Path>,
    allow_invalid_header: bool,
) -> Result<()> {
    if index < 1 {
        bail!("CSV export needs a session index >= 1");
    }
    let config = ParserConfig::new()
        .with_log_index(index)
        .with_allow_invalid_header(allow_invalid_header);
    let mut parser =
        Parser::load(path, config).with_context(|| format!("failed to open {:?}", path))?;

    let mut writer: Box<dyn Write> = match output {
        Some(output) => Box::new(BufWriter::new(
            File::create(output).with_context(|| format!("failed to create {:?}", output))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    writeln!(writer, "{}", parser.field_names().join(","))?;
    let mut rows = 0u64;
    for frame in parser.frames() {
        if matches!(frame.frame_type, FrameType::Intra | FrameType::Inter) {
            writeln!(writer, "{}", format_row(&frame.data))?;
            rows += 1;
        }
    }
    writer.flush()?;

    let stats = parser.stats();
    if stats.resync_count > 0 {
        log::warn!(
            "{} resyncs while decoding, some frames may be missing",
            stats.resync_count
        );
    }
    log::info!("wrote {} rows from session {}", rows, index);
    Ok(())
}

fn format_row(data: &[i64]) -> String {
    data.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
