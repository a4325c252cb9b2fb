use std::{io, path::PathBuf};
use thiserror::Error;

/// Why an extraction stopped, or why one snapshot was skipped.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The markers before the first scan are malformed or unsupported.
    #[error("bad JPEG header: {0}")]
    Header(#[source] io::Error),

    /// Entropy-coded data is corrupt or truncated, or the decoder broke the
    /// scan protocol.
    #[error("JPEG decode failed: {0}")]
    Decode(#[source] io::Error),

    /// A snapshot could not be written; the extraction goes on without it.
    #[error("cannot write snapshot of scan {scan}: {source}")]
    Output {
        scan: u32,
        #[source]
        source: io::Error,
    },
}

impl SplitError {
    /// Errors after which no further scans are read.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SplitError::Output { .. })
    }
}
