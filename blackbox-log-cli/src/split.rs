//! Split merged logs into per-session files
//!
//! A flash-chip dump often holds several flights back to back. Each
//! session's byte range is copied verbatim, so the resulting files decode
//! exactly like the corresponding session of the merged file.

use anyhow::{Context, Result};
use blackbox_log_decoder::Reader;
use std::fs;
use std::path::Path;

pub fn run(
    path: &Path,
    index: usize,
    output: Option<&Path>,
    allow_invalid_header: bool,
) -> Result<()> {
    let reader = Reader::new(path, allow_invalid_header)
        .with_context(|| format!("failed to open {:?}", path))?;
    let count = reader.log_count();
    log::info!("{:?} contains {} session(s)", path, count);

    let sessions: Vec<usize> = if index == 0 {
        (1..=count).collect()
    } else {
        vec![index]
    };

    for session in sessions {
        let bytes = reader.session_bytes(session)?;
        let name = split_file_name(path, session);
        let out_path = match output {
            Some(dir) => dir.join(&name),
            None => path.with_file_name(&name),
        };
        fs::write(&out_path, bytes)
            .with_context(|| format!("failed to write {:?}", out_path))?;
        log::info!(
            "session {} -> {:?} ({} bytes)",
            session,
            out_path,
            bytes.len()
        );
    }
    Ok(())
}

/// `flight.bbl` session 2 becomes `flight.02.bbl`
fn split_file_name(input: &Path, index: usize) -> String {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    match input.extension() {
        Some(ext) => format!("{}.{:02}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}.{:02}", stem, index),
    }
}
