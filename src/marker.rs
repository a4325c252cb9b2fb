use super::{error, Decoder};
use num_enum::TryFromPrimitive;
use std::io::{Read, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Marker {
    /// Start Of Frame (baseline)
    SOF0 = 0xC0,
    /// Start Of Frame (extended sequential, Huffman)
    SOF1 = 0xC1,
    /// Start Of Frame (progressive, Huffman)
    SOF2 = 0xC2,
    /// Start Of Frame (lossless, Huffman)
    SOF3 = 0xC3,
    /// Define Huffman Table
    DHT = 0xC4,
    SOF5 = 0xC5,
    SOF6 = 0xC6,
    SOF7 = 0xC7,
    /// Reserved for JPEG extensions
    JPG = 0xC8,
    /// Start Of Frame (extended sequential, arithmetic)
    SOF9 = 0xC9,
    /// Start Of Frame (progressive, arithmetic)
    SOF10 = 0xCA,
    SOF11 = 0xCB,
    /// Define Arithmetic Coding conditioning
    DAC = 0xCC,
    SOF13 = 0xCD,
    SOF14 = 0xCE,
    SOF15 = 0xCF,
    /// Restart
    RST0 = 0xD0,
    RST1 = 0xD1,
    RST2 = 0xD2,
    RST3 = 0xD3,
    RST4 = 0xD4,
    RST5 = 0xD5,
    RST6 = 0xD6,
    RST7 = 0xD7,
    /// Start Of Image
    SOI = 0xD8,
    /// End Of Image
    EOI = 0xD9,
    /// Start Of Scan
    SOS = 0xDA,
    /// Define Quantization Table
    DQT = 0xDB,
    /// Define Number of Lines
    DNL = 0xDC,
    /// Define Restart Interval
    DRI = 0xDD,
    /// Define Hierarchical Progression
    DHP = 0xDE,
    /// Expand Reference Components
    EXP = 0xDF,
    /// Application specific
    APP0 = 0xE0,
    APP1 = 0xE1,
    APP2 = 0xE2,
    APP3 = 0xE3,
    APP4 = 0xE4,
    APP5 = 0xE5,
    APP6 = 0xE6,
    APP7 = 0xE7,
    APP8 = 0xE8,
    APP9 = 0xE9,
    APPA = 0xEA,
    APPB = 0xEB,
    APPC = 0xEC,
    APPD = 0xED,
    APPE = 0xEE,
    APPF = 0xEF,
    /// Comment
    COM = 0xFE,
}

impl Marker {
    /// The prefix of a marker.
    pub const PREFIX: u8 = 0xFF;

    /// The index `n` of an RSTn marker.
    pub fn restart_index(self) -> Option<u8> {
        let code = self as u8;
        (Marker::RST0 as u8..=Marker::RST7 as u8)
            .contains(&code)
            .then(|| code - Marker::RST0 as u8)
    }

    /// Segments that carry nothing the decoder needs.
    pub fn is_skippable(self) -> bool {
        matches!(self as u8, 0xE0..=0xEF) || self == Marker::COM
    }
}

impl<R: Read> Decoder<R> {
    /// Read the next marker.
    pub fn next_marker(&mut self) -> Result<Marker> {
        let (byte, skip) = self.reader.read_marker()?;
        if skip != 0 {
            self.warn(&format!(
                "corrupt JPEG data: {skip} extraneous bytes before marker 0x{byte:02X}"
            ));
        }
        let marker =
            Marker::try_from(byte).map_err(|_| error(format!("Invalid marker: 0x{:02X}", byte)))?;
        debug!(?marker, skip, "read marker");
        Ok(marker)
    }

    /// Skip a segment the decoder does not interpret.
    pub fn skip_segment(&mut self, marker: Marker) -> Result<()> {
        let len = self.read_u16()?;
        debug!(?marker, len, "skip section");
        let len = len
            .checked_sub(2)
            .ok_or_else(|| error(format!("bogus {marker:?} length: {len}")))?;
        self.reader.skip(len as usize)
    }

    /// Read a DRI segment.
    pub fn read_restart_interval(&mut self) -> Result<u16> {
        let len = self.read_u16()?;
        debug!(len, "read section DRI");
        if len != 4 {
            return Err(error(format!("bogus DRI length: {len}")));
        }
        self.read_u16()
    }
}
