//! Log file reading
//!
//! The [`Reader`] owns the raw bytes of a log file, locates the sessions
//! concatenated inside it, parses the ASCII header section of the selected
//! session and builds the per-frame-type field definition tables that
//! drive the decoder. It does no frame decoding itself.

use crate::encoding::Encoding;
use crate::headers::Headers;
use crate::predictor::Predictor;
use crate::types::{DecodeError, FieldDef, FrameType, Result};
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::Path;

/// ASCII signature every session starts with
pub const LOG_SIGNATURE: &[u8] = b"H Product:Blackbox flight data recorder by Nicholas Sherlock";

/// Field definition tables, one per frame type present in the header
pub type FieldDefs = HashMap<FrameType, Vec<FieldDef>>;

/// Structured access to one log file and its sessions
pub struct Reader {
    data: Vec<u8>,
    log_pointers: Vec<u64>,
    allow_invalid_header: bool,
    /// 1-based index of the selected session, 0 while none is selected
    log_index: usize,
    header_size: usize,
    headers: Headers,
    field_defs: FieldDefs,
}

impl Reader {
    /// Read a log file and enumerate its sessions
    ///
    /// No session is selected yet; headers and field definitions become
    /// available after [`Reader::set_log_index`].
    pub fn new(path: &Path, allow_invalid_header: bool) -> Result<Self> {
        let data = fs::read(path)?;
        log::info!("processing {:?} ({} bytes)", path, data.len());
        Self::from_bytes(data, allow_invalid_header)
    }

    /// Like [`Reader::new`] but over an in-memory buffer
    pub fn from_bytes(data: Vec<u8>, allow_invalid_header: bool) -> Result<Self> {
        let mut log_pointers = find_signatures(&data);
        if log_pointers.is_empty() {
            if !allow_invalid_header {
                return Err(DecodeError::InvalidHeader { offset: 0 });
            }
            log::warn!("product signature not found, treating the file as one session");
            log_pointers.push(0);
        }
        Ok(Reader {
            data,
            log_pointers,
            allow_invalid_header,
            log_index: 0,
            header_size: 0,
            headers: Headers::new(),
            field_defs: HashMap::new(),
        })
    }

    /// Select a session (1-based) and parse its headers
    ///
    /// Always re-parses, so selecting the same index again restores a fresh
    /// decode position.
    pub fn set_log_index(&mut self, index: usize) -> Result<()> {
        if index < 1 || index > self.log_count() {
            return Err(DecodeError::NoSuchLog {
                index,
                count: self.log_count(),
            });
        }
        let range = self.session_range(index);
        let (headers, header_size) = self.parse_headers(range.clone())?;
        headers.inspect();
        self.headers = headers;
        self.header_size = header_size;
        self.field_defs = self.build_field_defs()?;
        // fail early on unparseable decoder inputs
        self.headers.i_interval()?;
        self.headers.p_interval()?;
        self.headers.data_version()?;
        self.headers.minthrottle()?;
        self.headers.motor_output()?;
        self.headers.vbatref()?;
        self.log_index = index;
        log::info!(
            "log #{} of {} (start: {:#X}, header: {} bytes, payload: {} bytes)",
            index,
            self.log_count(),
            range.start,
            header_size,
            range.len() - header_size,
        );
        Ok(())
    }

    /// Number of sessions found in the file
    pub fn log_count(&self) -> usize {
        self.log_pointers.len()
    }

    /// Byte offsets of the session signatures, in file order
    pub fn log_pointers(&self) -> &[u64] {
        &self.log_pointers
    }

    /// Currently selected session, 0 while none is selected
    pub fn log_index(&self) -> usize {
        self.log_index
    }

    /// Headers of the selected session
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Field definition tables of the selected session
    pub fn field_defs(&self) -> &FieldDefs {
        &self.field_defs
    }

    /// Binary payload of the selected session (headers stripped)
    pub fn payload(&self) -> &[u8] {
        if self.log_index == 0 {
            return &[];
        }
        let range = self.session_range(self.log_index);
        &self.data[range.start + self.header_size..range.end]
    }

    /// Whole byte range of a session (1-based), headers included
    ///
    /// This is the `[log_pointers[i], log_pointers[i+1])` slice a splitter
    /// copies verbatim.
    pub fn session_bytes(&self, index: usize) -> Result<&[u8]> {
        if index < 1 || index > self.log_count() {
            return Err(DecodeError::NoSuchLog {
                index,
                count: self.log_count(),
            });
        }
        Ok(&self.data[self.session_range(index)])
    }

    fn session_range(&self, index: usize) -> Range<usize> {
        let start = self.log_pointers[index - 1] as usize;
        let end = self
            .log_pointers
            .get(index)
            .map(|&offset| offset as usize)
            .unwrap_or(self.data.len());
        start..end
    }

    /// Read `H key:value` lines until the first frame-type byte
    fn parse_headers(&self, range: Range<usize>) -> Result<(Headers, usize)> {
        let data = &self.data[range.clone()];
        let mut headers = Headers::new();
        let mut pos = 0;
        while pos < data.len() && data[pos] == b'H' {
            let line_start = pos;
            let mut line_end = pos;
            while line_end < data.len() && data[line_end] != b'\n' {
                if data[line_end] >= 0x80 {
                    if self.allow_invalid_header {
                        log::warn!(
                            "invalid byte {:#04x} in header line at {:#X}, ending header section",
                            data[line_end],
                            range.start + line_end
                        );
                        return Ok((headers, line_start));
                    }
                    return Err(DecodeError::InvalidHeader {
                        offset: (range.start + line_end) as u64,
                    });
                }
                line_end += 1;
            }
            parse_header_line(&data[line_start..line_end], &mut headers);
            pos = (line_end + 1).min(data.len());
        }
        log::debug!(
            "end of headers at {:#X} ({} headers)",
            range.start + pos,
            headers.len()
        );
        Ok((headers, pos))
    }

    fn build_field_defs(&self) -> Result<FieldDefs> {
        let mut field_defs = HashMap::new();
        let intra = self.build_type_defs(FrameType::Intra, None)?.ok_or_else(|| {
            DecodeError::MalformedHeader("missing required key \"Field I name\"".into())
        })?;
        let names: Vec<String> = intra.iter().map(|def| def.name.clone()).collect();
        field_defs.insert(FrameType::Intra, intra);
        for frame_type in [FrameType::Inter, FrameType::Slow, FrameType::Gps, FrameType::GpsHome] {
            let names = (frame_type == FrameType::Inter).then(|| names.clone());
            if let Some(defs) = self.build_type_defs(frame_type, names)? {
                field_defs.insert(frame_type, defs);
            }
        }
        Ok(field_defs)
    }

    /// Build the field table for one frame type
    ///
    /// Inter frames reuse the intra names (passed via `names`) and are
    /// detected by their predictor list; the other types are detected by
    /// their name list.
    fn build_type_defs(
        &self,
        frame_type: FrameType,
        names: Option<Vec<String>>,
    ) -> Result<Option<Vec<FieldDef>>> {
        let letter = frame_type.letter();
        let names: Vec<String> = match names {
            Some(names) => {
                if self
                    .headers
                    .get(&format!("Field {} predictor", letter))
                    .is_none()
                {
                    return Ok(None);
                }
                names
            }
            None => match self.headers.comma_list(&format!("Field {} name", letter)) {
                Some(list) => list.into_iter().map(String::from).collect(),
                None => return Ok(None),
            },
        };
        let signed = self.int_list(letter, "signed")?;
        let predictors = self.int_list(letter, "predictor")?;
        let encodings = self.int_list(letter, "encoding")?;
        if signed.len() != names.len()
            || predictors.len() != names.len()
            || encodings.len() != names.len()
        {
            return Err(DecodeError::MalformedHeader(format!(
                "field definition lists for '{}' frames differ in length",
                letter
            )));
        }

        let mut defs = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let predictor = Predictor::from_id(predictors[index], &name)?;
            let encoding = Encoding::from_id(encodings[index])?;
            defs.push(FieldDef {
                name,
                signed: signed[index] != 0,
                predictor,
                encoding,
                group_index: 0,
                group_len: 1,
            });
        }
        assign_groups(&mut defs, letter)?;
        Ok(Some(defs))
    }

    fn int_list(&self, letter: char, prop: &str) -> Result<Vec<u32>> {
        let key = format!("Field {} {}", letter, prop);
        let list = self.headers.comma_list(&key).ok_or_else(|| {
            DecodeError::MalformedHeader(format!("missing required key {:?}", key))
        })?;
        list.into_iter()
            .map(|item| {
                item.parse().map_err(|_| {
                    DecodeError::MalformedHeader(format!(
                        "unparseable value for {:?}: {:?}",
                        key, item
                    ))
                })
            })
            .collect()
    }
}

/// Non-overlapping occurrences of the session signature
fn find_signatures(data: &[u8]) -> Vec<u64> {
    let mut pointers = Vec::new();
    let mut offset = 0;
    while offset + LOG_SIGNATURE.len() <= data.len() {
        if data[offset..].starts_with(LOG_SIGNATURE) {
            pointers.push(offset as u64);
            offset += LOG_SIGNATURE.len();
        } else {
            offset += 1;
        }
    }
    pointers
}

/// Store one `H key:value` line; lines without a colon are reported and
/// skipped
fn parse_header_line(line: &[u8], headers: &mut Headers) {
    // the scan guarantees pure ASCII here
    let text = std::str::from_utf8(line).unwrap_or_default();
    let body = text.strip_prefix("H ").unwrap_or(&text[1.min(text.len())..]);
    match body.split_once(':') {
        Some((key, value)) => {
            headers.insert(key.trim().to_string(), value.trim().to_string());
        }
        None => log::warn!("header line has invalid format: {:?}", body),
    }
}

/// Assign group indices by scanning the encoding list
///
/// TAG8_8SVB spans adjacent fields with the same encoding, capped at 8;
/// the fixed-size tag encodings must have their full complement of fields.
fn assign_groups(defs: &mut [FieldDef], letter: char) -> Result<()> {
    let mut index = 0;
    while index < defs.len() {
        let encoding = defs[index].encoding;
        let len = match encoding.fixed_group_len() {
            Some(len) => len,
            None => defs[index..]
                .iter()
                .take(8)
                .take_while(|def| def.encoding == Encoding::Tag8_8Svb)
                .count(),
        };
        if index + len > defs.len()
            || defs[index..index + len].iter().any(|def| def.encoding != encoding)
        {
            return Err(DecodeError::MalformedHeader(format!(
                "encoding group at field {} overruns the '{}' field list",
                index, letter
            )));
        }
        for (offset, def) in defs[index..index + len].iter_mut().enumerate() {
            def.group_index = offset;
            def.group_len = len;
        }
        index += len;
    }
    Ok(())
}
