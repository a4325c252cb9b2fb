//! Write out every scan of a progressive JPEG as its own raster snapshot.
//!
//! [`Decoder`] is a buffered-image JPEG decoder: it keeps the coefficients of
//! every scan and can render the image at any scan boundary. [`Extractor`]
//! drives any [`DecoderHandle`] scan by scan and hands one [`Snapshot`] per
//! scan to a [`SnapshotSink`].

use std::io::{BufReader, Read, Result};

mod bit_reader;
pub mod decode;
pub mod error;
pub mod extract;
#[cfg(test)]
mod fixture;
pub mod handle;
mod huffman;
mod input;
mod marker;
pub mod mcu;
mod output;
pub mod ppm;
mod quantization_table;
pub mod scanner;
pub mod snapshot;
pub mod start_of_frame;
mod start_of_scan;

pub use self::error::SplitError;
pub use self::extract::{split_file, ExtractOptions, Extractor, Summary};
pub use self::handle::{DecoderHandle, ImageInfo, StepStatus};
pub use self::scanner::ScanEvent;
pub use self::snapshot::{Snapshot, SnapshotSink};

use self::bit_reader::BitReader;
use self::huffman::HuffmanTree;
use self::input::InputState;
use self::mcu::CoefficientPlane;
use self::output::OutputPass;
use self::quantization_table::QuantizationTable;
use self::start_of_frame::FrameInfo;

/// A JPEG decoder running in buffered-image mode.
///
/// All scans accumulate into per-component coefficient planes, so the image
/// can be rendered after any scan without decoding earlier data again.
pub struct Decoder<R: Read> {
    reader: BitReader<R>,
    tables: Tables,
    restart_interval: u16,
    frame: Option<FrameInfo>,
    coefficients: Vec<CoefficientPlane>,
    /// Last successive approximation bit of each coefficient, per component.
    /// -1 means the coefficient has not been coded yet.
    coef_bits: Vec<[i8; 64]>,
    input: InputState,
    input_scan_number: u32,
    first_scan_components: usize,
    buffered_image: bool,
    started: bool,
    output: Option<OutputPass>,
    warnings: u32,
}

/// Tables defined by DQT and DHT segments.
#[derive(Default)]
pub(crate) struct Tables {
    pub quantization: [Option<QuantizationTable>; 4],
    pub dc: [Option<HuffmanTree>; 4],
    pub ac: [Option<HuffmanTree>; 4],
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Decoder {
            reader: BitReader::new(BufReader::new(reader)),
            tables: Tables::default(),
            restart_interval: 0,
            frame: None,
            coefficients: vec![],
            coef_bits: vec![],
            input: InputState::Start,
            input_scan_number: 0,
            first_scan_components: 0,
            buffered_image: false,
            started: false,
            output: None,
            warnings: 0,
        }
    }

    /// Decode the whole image in one pass and return the final pixels.
    pub fn decode(mut self) -> Result<(ImageInfo, Vec<u8>)> {
        let info = self.read_header()?;
        self.set_buffered_image(false);
        self.start_decompress()?;
        let mut pixels = vec![0; info.row_stride() * info.height as usize];
        for row in pixels.chunks_exact_mut(info.row_stride()) {
            if !self.read_row(row)? {
                return Err(error("image ended before the last row"));
            }
        }
        self.finish_decompress()?;
        Ok((info, pixels))
    }

    /// Read a byte.
    fn read_byte(&mut self) -> Result<u8> {
        self.reader.read_u8()
    }

    /// Read a u16.
    fn read_u16(&mut self) -> Result<u16> {
        self.reader.read_u16()
    }

    /// Record a recoverable problem in the stream.
    fn warn(&mut self, msg: &str) {
        self.warnings += 1;
        tracing::warn!(warnings = self.warnings, "{}", msg);
    }
}

fn error(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

fn unsupported(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Unsupported, msg.into())
}
