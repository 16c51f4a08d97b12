//! Parser configuration
//!
//! The decoder has deliberately few knobs; anything output-related belongs
//! to the consumers.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::Parser::load`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// 1-based session index to select on load
    #[serde(default = "default_log_index")]
    pub log_index: usize,

    /// Tolerate a missing or garbled product signature and header damage
    #[serde(default)]
    pub allow_invalid_header: bool,
}

fn default_log_index() -> usize {
    1
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            log_index: default_log_index(),
            allow_invalid_header: false,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: select a session index
    pub fn with_log_index(mut self, log_index: usize) -> Self {
        self.log_index = log_index;
        self
    }

    /// Builder method: tolerate invalid headers
    pub fn with_allow_invalid_header(mut self, allow: bool) -> Self {
        self.allow_invalid_header = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = ParserConfig::new();
        assert_eq!(config.log_index, 1);
        assert!(!config.allow_invalid_header);

        let config = ParserConfig::new()
            .with_log_index(3)
            .with_allow_invalid_header(true);
        assert_eq!(config.log_index, 3);
        assert!(config.allow_invalid_header);
    }
}
