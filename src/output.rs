use crate::{
    decode::{gray, ycbcr_to_rgb},
    error,
    mcu::CoefficientPlane,
    start_of_frame::FrameInfo,
    Decoder,
};
use std::io::{ErrorKind, Read, Result};
use tracing::debug;

/// An output pass rendering the image as of one scan.
pub(crate) struct OutputPass {
    pub scan_number: u32,
    /// Rows already returned.
    pub scanline: u32,
    /// The MCU row held in `band`.
    band_row: Option<usize>,
    /// Output pixels of one MCU row.
    band: Vec<u8>,
    /// Samples of each component for one MCU row, centered on 0.
    samples: Vec<Vec<i16>>,
}

impl OutputPass {
    pub fn new(scan_number: u32) -> Self {
        OutputPass {
            scan_number,
            scanline: 0,
            band_row: None,
            band: vec![],
            samples: vec![],
        }
    }

    /// Render MCU row `mcu_row` from the current coefficients.
    fn render(&mut self, frame: &FrameInfo, planes: &[CoefficientPlane], mcu_row: usize) {
        let width = frame.width as usize;
        let mcu_height = frame.mcu_height() as usize;
        let rows = mcu_height.min(frame.height as usize - mcu_row * mcu_height);
        let components = frame.component_infos.len();

        self.samples.resize(components, vec![]);
        for (c, info) in frame.component_infos.iter().enumerate() {
            let plane = &planes[c];
            let v = info.vertical_sampling as usize;
            let stride = plane.blocks_wide * 8;
            let samples = &mut self.samples[c];
            samples.clear();
            samples.resize(stride * v * 8, 0);
            // a component no scan has touched yet stays at zero
            let Some(qt) = &plane.quantization else {
                continue;
            };
            for by in 0..v {
                for bx in 0..plane.blocks_wide {
                    let block = plane.block(mcu_row * v + by, bx);
                    let block = block.dequantize(qt).zigzag().idct();
                    for y in 0..8 {
                        let start = (by * 8 + y) * stride + bx * 8;
                        samples[start..start + 8].copy_from_slice(&block.0[y * 8..y * 8 + 8]);
                    }
                }
            }
        }

        self.band.clear();
        self.band.reserve(rows * width * components);
        let (hmax, vmax) = (
            frame.max_horizontal_sampling as usize,
            frame.max_vertical_sampling as usize,
        );
        let sample = |c: usize, x: usize, y: usize| {
            let info = &frame.component_infos[c];
            let stride = planes[c].blocks_wide * 8;
            let sy = y * info.vertical_sampling as usize / vmax;
            let sx = x * info.horizontal_sampling as usize / hmax;
            self.samples[c][sy * stride + sx]
        };
        for y in 0..rows {
            for x in 0..width {
                if components == 3 {
                    let rgb = ycbcr_to_rgb(sample(0, x, y), sample(1, x, y), sample(2, x, y));
                    self.band.extend_from_slice(&rgb);
                } else {
                    self.band.push(gray(sample(0, x, y)));
                }
            }
        }
        self.band_row = Some(mcu_row);
    }
}

impl<R: Read> Decoder<R> {
    pub(crate) fn begin_output(&mut self, scan: u32) -> Result<()> {
        if !self.started || !self.buffered_image {
            return Err(error("improper call: not in buffered-image mode"));
        }
        let mut scan = scan.max(1);
        if self.input.is_complete() && scan > self.input_scan_number {
            scan = self.input_scan_number;
        }
        debug!(scan, "start output pass");
        self.output = Some(OutputPass::new(scan));
        Ok(())
    }

    pub(crate) fn end_output(&mut self) -> Result<()> {
        if !self.started {
            return Err(error("improper call: decompression not started"));
        }
        self.output = None;
        Ok(())
    }

    pub(crate) fn next_row(&mut self, row: &mut [u8]) -> Result<bool> {
        let frame = self.frame.as_ref().ok_or_else(|| error("improper call: no frame"))?;
        let (height, mcu_height) = (frame.height as u32, frame.mcu_height() as u32);
        let stride = frame.width as usize * frame.component_infos.len();
        if row.len() < stride {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("row buffer of {} bytes, need {stride}", row.len()),
            ));
        }
        let pass = (self.output.as_ref()).ok_or_else(|| error("improper call: no output pass"))?;
        let (scanline, scan_number) = (pass.scanline, pass.scan_number);
        if scanline >= height {
            return Ok(false);
        }

        let mcu_row = (scanline / mcu_height) as usize;
        if pass.band_row != Some(mcu_row) {
            if self.buffered_image {
                self.sync_input(scan_number)?;
            }
            if let (Some(frame), Some(pass)) = (&self.frame, &mut self.output) {
                pass.render(frame, &self.coefficients, mcu_row);
            }
        }

        let pass = (self.output.as_mut()).ok_or_else(|| error("improper call: no output pass"))?;
        let offset = (scanline % mcu_height) as usize * stride;
        row[..stride].copy_from_slice(&pass.band[offset..offset + stride]);
        pass.scanline += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixture::Fixture, DecoderHandle};

    #[test]
    fn test_render_gray_band() {
        let fixture = Fixture::grayscale();
        let buf = fixture.encode();
        let mut decoder = Decoder::new(&buf[..]);
        decoder.read_header().unwrap();
        let frame = decoder.frame.clone().unwrap();

        let mut plane = CoefficientPlane::new(3, 2);
        plane.quantization = Some([8; 64]);
        plane.block_mut(1, 2).0[0] = 5;
        let mut pass = OutputPass::new(1);
        pass.render(&frame, &[plane], 1);
        // 20 pixels wide, 4 rows left in the second band
        assert_eq!(pass.band.len(), 20 * 4);
        assert_eq!(pass.band[0], 128);
        assert_eq!(pass.band[16], 128 + 5);
        assert_eq!(pass.band[3 * 20 + 19], 128 + 5);
    }

    #[test]
    fn test_unscanned_component_is_neutral() {
        let fixture = Fixture::progressive_3scan();
        let buf = fixture.encode();
        let mut decoder = Decoder::new(&buf[..]);
        decoder.read_header().unwrap();
        let frame = decoder.frame.clone().unwrap();
        let planes: Vec<_> = (0..3)
            .map(|c| CoefficientPlane::new(frame.blocks_wide(c), frame.blocks_tall(c)))
            .collect();
        let mut pass = OutputPass::new(1);
        pass.render(&frame, &planes, 0);
        assert_eq!(pass.band.len(), 64 * 8 * 3);
        assert!(pass.band.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_subsampled_output_rows() {
        let fixture = Fixture::subsampled();
        let buf = fixture.encode();
        let mut decoder = Decoder::new(&buf[..]);
        let info = decoder.read_header().unwrap();
        decoder.set_buffered_image(true);
        decoder.start_decompress().unwrap();
        decoder.start_output(1).unwrap();
        let mut pixels = vec![];
        let mut row = vec![0; info.row_stride()];
        while decoder.read_row(&mut row).unwrap() {
            pixels.extend_from_slice(&row);
        }
        assert_eq!(decoder.output_scanline(), 24);
        assert_eq!(pixels, fixture.expected_pixels(Some(1)));
    }
}
