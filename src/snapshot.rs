//! Rendering the image as of one scan.

use crate::handle::{DecoderHandle, ImageInfo};
use std::io::{self, ErrorKind, Result};

/// The image as it looks right after one scan was consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub scan: u32,
    pub width: u32,
    pub height: u32,
    pub components: u8,
    /// Row-major pixels, `components` bytes each.
    pub pixels: Vec<u8>,
}

impl Snapshot {
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.components as usize
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks_exact(self.row_stride())
    }
}

/// Where snapshots go.
pub trait SnapshotSink {
    fn write_snapshot(&mut self, snapshot: Snapshot) -> Result<()>;
}

impl SnapshotSink for Vec<Snapshot> {
    fn write_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.push(snapshot);
        Ok(())
    }
}

/// Read every row of the output pass started for `scan`.
///
/// Fails if the decoder runs out of rows before `info.height`.
pub fn materialize<D: DecoderHandle + ?Sized>(
    decoder: &mut D,
    info: &ImageInfo,
    scan: u32,
) -> Result<Snapshot> {
    let stride = info.row_stride();
    let mut pixels = vec![0; stride * info.height as usize];
    while decoder.output_scanline() < info.height {
        let y = decoder.output_scanline() as usize;
        let row = &mut pixels[y * stride..(y + 1) * stride];
        if !decoder.read_row(row)? || decoder.output_scanline() as usize != y + 1 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("scan {scan}: decoder stopped at row {y} of {}", info.height),
            ));
        }
    }
    Ok(Snapshot {
        scan,
        width: info.width,
        height: info.height,
        components: info.components,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixture::Fixture, Decoder};

    #[test]
    fn test_materialize_each_scan() {
        let fixture = Fixture::grayscale();
        let buf = fixture.encode();
        let mut decoder = Decoder::new(&buf[..]);
        let info = decoder.read_header().unwrap();
        decoder.set_buffered_image(true);
        decoder.start_decompress().unwrap();

        for scan in 1..=3 {
            decoder.start_output(scan).unwrap();
            let snapshot = materialize(&mut decoder, &info, scan).unwrap();
            assert_eq!(snapshot.scan, scan);
            assert_eq!(snapshot.rows().count(), 12);
            assert_eq!(snapshot.pixels, fixture.expected_pixels(Some(scan as usize)));
            decoder.finish_output().unwrap();
        }
    }

    #[test]
    fn test_vec_sink() {
        let mut sink: Vec<Snapshot> = vec![];
        let snapshot = Snapshot {
            scan: 1,
            width: 2,
            height: 1,
            components: 1,
            pixels: vec![1, 2],
        };
        sink.write_snapshot(snapshot.clone()).unwrap();
        assert_eq!(sink, vec![snapshot]);
    }
}
