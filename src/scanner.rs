//! Finding the next scan boundary.

use crate::handle::{DecoderHandle, StepStatus};
use std::io::Result;
use tracing::trace;

/// A scan boundary reached by [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    /// The header of scan `n` was read.
    ScanStarted(u32),
    EndOfImage,
}

/// Consume input until the next scan starts or the image ends.
///
/// Rows of the current scan are decoded on the way. Errors are returned as
/// they come; the decoder is left where it failed.
pub fn advance<D: DecoderHandle + ?Sized>(decoder: &mut D) -> Result<ScanEvent> {
    loop {
        match decoder.consume_input()? {
            StepStatus::ReachedScanStart(n) => return Ok(ScanEvent::ScanStarted(n)),
            StepStatus::ReachedEndOfImage => return Ok(ScanEvent::EndOfImage),
            status => trace!(?status, "consumed input"),
        }
    }
}
