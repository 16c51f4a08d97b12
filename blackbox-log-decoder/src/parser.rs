//! Parser façade
//!
//! [`Parser`] ties the reader, the frame decoder and the event channel
//! together and is the entry point consumers use: select a session, pull
//! frames from the lazy iterator, read the events gathered on the way.

use crate::config::ParserConfig;
use crate::frame::FrameDecoder;
use crate::reader::Reader;
use crate::types::{Event, Frame, ParserStats, Result};
use std::collections::HashMap;
use std::path::Path;

/// Streaming parser for one blackbox log file
pub struct Parser {
    reader: Reader,
    decoder: FrameDecoder,
    headers: HashMap<String, String>,
    field_names: Vec<String>,
    events: Vec<Event>,
}

impl Parser {
    /// Open a log file and select a session
    ///
    /// # Example
    /// ```no_run
    /// use blackbox_log_decoder::{Parser, ParserConfig};
    ///
    /// let mut parser = Parser::load("flight.bbl", ParserConfig::default()).unwrap();
    /// for frame in parser.frames() {
    ///     println!("{:?}", frame.data);
    /// }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P, config: ParserConfig) -> Result<Self> {
        let mut reader = Reader::new(path.as_ref(), config.allow_invalid_header)?;
        reader.set_log_index(config.log_index)?;
        Self::from_reader(reader)
    }

    /// Wrap an already positioned [`Reader`]
    pub fn from_reader(reader: Reader) -> Result<Self> {
        let decoder = FrameDecoder::new(&reader)?;
        let mut parser = Parser {
            reader,
            decoder,
            headers: HashMap::new(),
            field_names: Vec::new(),
            events: Vec::new(),
        };
        parser.refresh_views();
        Ok(parser)
    }

    /// Select another session (1-based) and reset all decode state
    ///
    /// Selecting the current index again restarts it from the beginning,
    /// so two passes over the same session yield identical frames.
    pub fn set_log_index(&mut self, index: usize) -> Result<()> {
        self.reader.set_log_index(index)?;
        self.decoder = FrameDecoder::new(&self.reader)?;
        self.events.clear();
        self.refresh_views();
        Ok(())
    }

    fn refresh_views(&mut self) {
        self.headers = self
            .reader
            .headers()
            .raw()
            .iter()
            .filter(|(key, _)| !key.starts_with("Field "))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.field_names = self
            .reader
            .field_defs()
            .get(&crate::types::FrameType::Intra)
            .map(|defs| defs.iter().map(|def| def.name.clone()).collect())
            .unwrap_or_default();
    }

    /// Lazy iterator over the current session's frames
    ///
    /// Single-pass: once exhausted, call [`Parser::set_log_index`] to
    /// decode the session again.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { parser: self }
    }

    /// Events seen so far, in stream order
    ///
    /// The list is complete once the frame iterator is exhausted.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Session headers with the field-definition keys filtered out
    ///
    /// The unfiltered map is available through [`Parser::reader`].
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Field names of main (I/P) frames, in decode order
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// The underlying reader (session pointers, raw headers, field tables)
    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Decode counters for the current session, resync count included
    pub fn stats(&self) -> ParserStats {
        self.decoder.stats()
    }
}

/// Iterator returned by [`Parser::frames`]
pub struct Frames<'a> {
    parser: &'a mut Parser,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let parser = &mut *self.parser;
        parser
            .decoder
            .next_frame(&parser.reader, &mut parser.events)
    }
}
