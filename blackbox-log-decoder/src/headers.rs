//! Parsed header storage and typed access
//!
//! Header lines are kept verbatim as a key-value map so unknown keys pass
//! through to consumers untouched. The handful of values the decoder needs
//! is parsed on demand, with logged defaults for the keys a firmware may
//! omit.

use crate::types::{DecodeError, Result};
use std::collections::HashMap;

/// Default used when `Data version` is missing
pub const DEFAULT_DATA_VERSION: u32 = 1;
/// Default used when `I interval` is missing or zero
pub const DEFAULT_I_INTERVAL: u32 = 1;
/// Default used when `minthrottle` is missing
pub const DEFAULT_MINTHROTTLE: i64 = 0;
/// Default used when `vbatref` is missing
pub const DEFAULT_VBATREF: i64 = 0;

/// Keys the decoder expects; missing ones are reported once per session
const EXPECTED_KEYS: [&str; 4] = ["Data version", "minthrottle", "motorOutput", "vbatref"];

/// Raw header map with typed accessors
#[derive(Debug, Clone, Default)]
pub struct Headers {
    raw: HashMap<String, String>,
}

impl Headers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: String, value: String) {
        self.raw.insert(key, value);
    }

    /// Raw value for a header key, verbatim
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    /// The full raw key-value map
    pub fn raw(&self) -> &HashMap<String, String> {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Log a warning for each expected-but-missing key
    pub(crate) fn inspect(&self) {
        for key in EXPECTED_KEYS {
            if !self.raw.contains_key(key) {
                log::warn!("header not found in file: {:?} (using default)", key);
            }
        }
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
                DecodeError::MalformedHeader(format!("unparseable value for {:?}: {:?}", key, value))
            }),
        }
    }

    fn required<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        self.parsed(key)?
            .ok_or_else(|| DecodeError::MalformedHeader(format!("missing required key {:?}", key)))
    }

    /// `Data version`, defaulting to 1
    pub fn data_version(&self) -> Result<u32> {
        Ok(self.parsed("Data version")?.unwrap_or(DEFAULT_DATA_VERSION))
    }

    /// `I interval`: key frame spacing in loop iterations, clamped to >= 1
    pub fn i_interval(&self) -> Result<u32> {
        let value: u32 = self.required("I interval")?;
        Ok(value.max(DEFAULT_I_INTERVAL))
    }

    /// `P interval` as a `(numerator, denominator)` logging-rate fraction
    ///
    /// Accepts the `N/M` form as well as a bare integer `M`, which older
    /// firmware writes for `1/M`. Both parts are clamped to >= 1.
    pub fn p_interval(&self) -> Result<(u32, u32)> {
        let value = self
            .get("P interval")
            .ok_or_else(|| DecodeError::MalformedHeader("missing required key \"P interval\"".into()))?
            .trim();
        let (num, denom) = match value.split_once('/') {
            Some((num, denom)) => (
                parse_u32("P interval", num)?,
                parse_u32("P interval", denom)?,
            ),
            None => (1, parse_u32("P interval", value)?),
        };
        Ok((num.max(1), denom.max(1)))
    }

    /// `minthrottle` baseline, defaulting to 0
    pub fn minthrottle(&self) -> Result<i64> {
        Ok(self.parsed("minthrottle")?.unwrap_or(DEFAULT_MINTHROTTLE))
    }

    /// `vbatref` baseline, defaulting to 0
    pub fn vbatref(&self) -> Result<i64> {
        Ok(self.parsed("vbatref")?.unwrap_or(DEFAULT_VBATREF))
    }

    /// `motorOutput` as `(min, max)`, defaulting to (0, 0)
    pub fn motor_output(&self) -> Result<(u16, u16)> {
        match self.get("motorOutput") {
            None => Ok((0, 0)),
            Some(value) => {
                let mut parts = value.split(',');
                let min = parse_u16("motorOutput", parts.next().unwrap_or(""))?;
                let max = match parts.next() {
                    Some(part) => parse_u16("motorOutput", part)?,
                    None => min,
                };
                Ok((min, max))
            }
        }
    }

    /// `Firmware revision` string, verbatim
    pub fn firmware_revision(&self) -> Option<&str> {
        self.get("Firmware revision")
    }

    /// `Log start datetime` string, verbatim
    pub fn log_start_datetime(&self) -> Option<&str> {
        self.get("Log start datetime")
    }

    /// A header value split on commas, with surrounding whitespace trimmed
    pub fn comma_list(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key)
            .map(|value| value.split(',').map(str::trim).collect())
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|_| {
        DecodeError::MalformedHeader(format!("unparseable value for {:?}: {:?}", key, value))
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16> {
    value.trim().parse().map_err(|_| {
        DecodeError::MalformedHeader(format!("unparseable value for {:?}: {:?}", key, value))
    })
}
