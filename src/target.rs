use anyhow::{Result, bail};
use std::fmt;

/// Destination every encoder of the run publishes to: server URL plus stream key.
///
/// `Display` and `Debug` print the redacted form so the key never reaches the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamTarget {
    full: String,
    key_offset: usize,
}

impl StreamTarget {
    /// Joins `url` and `key` with a single `/`. Both must be non-blank.
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let url = url.trim().trim_end_matches('/');
        let key = key.trim().trim_start_matches('/');
        if url.is_empty() {
            bail!("Stream URL cannot be empty");
        }
        if key.is_empty() {
            bail!("Stream key cannot be empty");
        }

        let full = format!("{url}/{key}");
        Ok(Self {
            key_offset: url.len() + 1,
            full,
        })
    }

    /// The full destination, key included. Only meant for the encoder command line.
    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn redacted(&self) -> String {
        format!("{}****", &self.full[..self.key_offset])
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamTarget").field(&self.redacted()).finish()
    }
}
