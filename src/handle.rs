//! The capability interface the scan loop drives.

use crate::{start_of_frame::FrameInfo, Decoder};
use std::io::{Read, Result};

/// Progress made by one call to [`DecoderHandle::consume_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// More input is needed before anything can happen.
    Suspended,
    /// The header of scan `n` has been read; its data comes next.
    ReachedScanStart(u32),
    ReachedEndOfImage,
    /// One row of MCUs of the current scan was decoded.
    RowCompleted,
    /// The last row of the current scan was decoded.
    ScanCompleted,
}

/// Output geometry declared by the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// 3 for RGB output, 1 for grayscale.
    pub components: u8,
}

impl ImageInfo {
    /// Bytes in one output row.
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.components as usize
    }
}

impl From<&FrameInfo> for ImageInfo {
    fn from(frame: &FrameInfo) -> Self {
        ImageInfo {
            width: frame.width as u32,
            height: frame.height as u32,
            components: frame.component_infos.len() as u8,
        }
    }
}

/// A JPEG decoder that can be stepped through its input and asked for the
/// image as of any completed scan.
///
/// Calls follow the buffered-image protocol: `read_header`,
/// `set_buffered_image(true)`, `start_decompress`, then for every scan
/// `start_output`, input consumption, `read_row` until the image is filled
/// and `finish_output`, and finally `finish_decompress`. Dropping the handle
/// releases the decoder.
pub trait DecoderHandle {
    /// Parse markers up to and including the first scan header.
    fn read_header(&mut self) -> Result<ImageInfo>;

    fn set_buffered_image(&mut self, enabled: bool);

    fn start_decompress(&mut self) -> Result<()>;

    /// The file codes the image in more than one scan.
    fn has_multiple_scans(&self) -> bool;

    /// Consume the next unit of input.
    fn consume_input(&mut self) -> Result<StepStatus>;

    /// The end of the image has been reached.
    fn input_complete(&self) -> bool;

    /// Number of the scan being (or last) read, counting from 1.
    fn input_scan_number(&self) -> u32;

    /// Begin an output pass showing the image as of scan `scan`.
    fn start_output(&mut self, scan: u32) -> Result<()>;

    /// Rows already returned in the current output pass.
    fn output_scanline(&self) -> u32;

    /// Fill `row` with the next output row.
    ///
    /// Returns `false` once every row of the pass has been returned.
    fn read_row(&mut self, row: &mut [u8]) -> Result<bool>;

    fn finish_output(&mut self) -> Result<()>;

    /// Consume the rest of the input and release the coefficient buffers.
    fn finish_decompress(&mut self) -> Result<()>;

    /// Recoverable problems met so far.
    fn warning_count(&self) -> u32;
}

impl<R: Read> DecoderHandle for Decoder<R> {
    fn read_header(&mut self) -> Result<ImageInfo> {
        self.parse_header()
    }

    fn set_buffered_image(&mut self, enabled: bool) {
        self.buffered_image = enabled;
    }

    fn start_decompress(&mut self) -> Result<()> {
        self.begin_decompress()
    }

    fn has_multiple_scans(&self) -> bool {
        match &self.frame {
            Some(frame) => {
                frame.progressive || self.first_scan_components < frame.component_infos.len()
            }
            None => false,
        }
    }

    fn consume_input(&mut self) -> Result<StepStatus> {
        self.step_input()
    }

    fn input_complete(&self) -> bool {
        self.input.is_complete()
    }

    fn input_scan_number(&self) -> u32 {
        self.input_scan_number
    }

    fn start_output(&mut self, scan: u32) -> Result<()> {
        self.begin_output(scan)
    }

    fn output_scanline(&self) -> u32 {
        self.output.as_ref().map_or(0, |pass| pass.scanline)
    }

    fn read_row(&mut self, row: &mut [u8]) -> Result<bool> {
        self.next_row(row)
    }

    fn finish_output(&mut self) -> Result<()> {
        self.end_output()
    }

    fn finish_decompress(&mut self) -> Result<()> {
        self.end_decompress()
    }

    fn warning_count(&self) -> u32 {
        self.warnings
    }
}
