use crate::{
    error,
    handle::{ImageInfo, StepStatus},
    huffman::HuffmanTree,
    marker::Marker,
    mcu::{CoefficientPlane, ScanKind, ScanState},
    output::OutputPass,
    start_of_frame::FrameInfo,
    start_of_scan::StartOfScanInfo,
    unsupported, Decoder,
};
use std::io::{ErrorKind, Read, Result};
use tracing::debug;

/// Where the decoder is in its input.
pub(crate) enum InputState {
    /// Nothing has been read.
    Start,
    /// Between scans: reading marker segments.
    Markers,
    /// Inside the entropy-coded data of a scan.
    Scan(Box<ScanState>),
    /// EOI has been reached.
    Complete,
}

impl InputState {
    pub fn is_complete(&self) -> bool {
        matches!(self, InputState::Complete)
    }

    pub fn in_scan(&self) -> bool {
        matches!(self, InputState::Scan(_))
    }
}

impl<R: Read> Decoder<R> {
    /// Read markers up to and including the first SOS.
    pub(crate) fn parse_header(&mut self) -> Result<ImageInfo> {
        if !matches!(self.input, InputState::Start) {
            return Err(error("improper call: header already read"));
        }
        let mut soi = [0; 2];
        self.reader.read_exact(&mut soi)?;
        if soi != [Marker::PREFIX, Marker::SOI as u8] {
            return Err(error(format!(
                "not a JPEG file: starts with 0x{:02X} 0x{:02X}",
                soi[0], soi[1]
            )));
        }
        self.input = InputState::Markers;
        match self.read_markers()? {
            StepStatus::ReachedScanStart(_) => {}
            _ => return Err(error("JPEG datastream contains no image")),
        }
        let frame = self.frame.as_ref().ok_or_else(|| error("SOS before SOF"))?;
        Ok(ImageInfo::from(frame))
    }

    pub(crate) fn begin_decompress(&mut self) -> Result<()> {
        if self.started || self.frame.is_none() {
            return Err(error("improper call: header not read or decompression started"));
        }
        self.started = true;
        if !self.buffered_image {
            while !self.input.is_complete() {
                self.step_input()?;
            }
            self.output = Some(OutputPass::new(self.input_scan_number));
        }
        Ok(())
    }

    pub(crate) fn end_decompress(&mut self) -> Result<()> {
        if !self.started {
            return Err(error("improper call: decompression not started"));
        }
        self.output = None;
        while !self.input.is_complete() {
            self.step_input()?;
        }
        self.coefficients = vec![];
        Ok(())
    }

    /// Advance the input by one marker run or one row of MCUs.
    pub(crate) fn step_input(&mut self) -> Result<StepStatus> {
        let (finished, warnings) = match &mut self.input {
            InputState::Start => return Err(error("improper call: header not read")),
            InputState::Complete => return Ok(StepStatus::ReachedEndOfImage),
            InputState::Markers => return self.read_markers(),
            InputState::Scan(scan) => {
                let frame = (self.frame.as_ref()).ok_or_else(|| error("scan without frame"))?;
                let finished = scan.decode_row(
                    &mut self.reader,
                    frame,
                    &self.tables,
                    &mut self.coefficients,
                )?;
                (finished, scan.take_warnings())
            }
        };
        for _ in 0..warnings {
            self.warn("corrupt JPEG data: premature end of data segment");
        }
        if !finished {
            return Ok(StepStatus::RowCompleted);
        }
        debug!(scan = self.input_scan_number, "end of scan");
        self.input = InputState::Markers;
        Ok(StepStatus::ScanCompleted)
    }

    /// Let the input catch up with the output pass: the scan being shown
    /// must be completely read.
    pub(crate) fn sync_input(&mut self, output_scan: u32) -> Result<()> {
        while !self.input.is_complete()
            && (self.input_scan_number < output_scan
                || (self.input_scan_number == output_scan && self.input.in_scan()))
        {
            self.step_input()?;
        }
        Ok(())
    }

    /// Read marker segments until the next SOS or EOI.
    fn read_markers(&mut self) -> Result<StepStatus> {
        loop {
            let marker = match self.next_marker() {
                Ok(marker) => marker,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof && self.input_scan_number > 0 => {
                    self.warn("premature end of JPEG file");
                    self.input = InputState::Complete;
                    return Ok(StepStatus::ReachedEndOfImage);
                }
                Err(e) => return Err(e),
            };
            match marker {
                Marker::SOF0 | Marker::SOF1 | Marker::SOF2 => {
                    if self.frame.is_some() {
                        return Err(unsupported("multiple frames are not supported"));
                    }
                    let frame = self.read_start_of_frame(marker == Marker::SOF2)?;
                    self.begin_frame(frame);
                }
                Marker::DHT => {
                    for table in self.read_huffman_table()? {
                        let tree = Some(HuffmanTree::new(&table));
                        let index = table.class.index();
                        if table.class.is_dc() {
                            self.tables.dc[index] = tree;
                        } else {
                            self.tables.ac[index] = tree;
                        }
                    }
                }
                Marker::DQT => {
                    for table in self.read_quantization_table()? {
                        let id = table.id as usize;
                        self.tables.quantization[id] = Some(table);
                    }
                }
                Marker::DRI => self.restart_interval = self.read_restart_interval()?,
                Marker::SOS => {
                    self.begin_scan()?;
                    return Ok(StepStatus::ReachedScanStart(self.input_scan_number));
                }
                Marker::EOI => {
                    debug!(scans = self.input_scan_number, "end of image");
                    self.input = InputState::Complete;
                    return Ok(StepStatus::ReachedEndOfImage);
                }
                Marker::SOI => return Err(error("unexpected SOI marker")),
                m if m.restart_index().is_some() => {
                    self.warn(&format!("stray {m:?} marker between scans"));
                }
                m if m.is_skippable() => self.skip_segment(m)?,
                m => return Err(unsupported(format!("unsupported JPEG process: {m:?}"))),
            }
        }
    }

    fn begin_frame(&mut self, frame: FrameInfo) {
        let n = frame.component_infos.len();
        self.coefficients = (0..n)
            .map(|c| CoefficientPlane::new(frame.blocks_wide(c), frame.blocks_tall(c)))
            .collect();
        self.coef_bits = vec![[-1; 64]; n];
        debug!(
            width = frame.width,
            height = frame.height,
            components = n,
            progressive = frame.progressive,
            "start of frame"
        );
        self.frame = Some(frame);
    }

    fn begin_scan(&mut self) -> Result<()> {
        let sos = self.read_start_of_scan()?;
        let frame = self.frame.as_ref().ok_or_else(|| error("SOS before SOF"))?;
        let components = sos.resolve(frame)?;
        let scan = ScanState::new(&sos, components, frame, self.restart_interval);
        scan.check_tables(&self.tables)?;

        for &c in scan.components() {
            let plane = &mut self.coefficients[c];
            if plane.quantization.is_none() {
                let id = frame.component_infos[c].quant_table_id;
                let table = self.tables.quantization[id as usize]
                    .as_ref()
                    .ok_or_else(|| error(format!("quantization table {id} was not defined")))?;
                plane.quantization = Some(table.values);
            }
        }
        let odd_sequential = !frame.progressive && !sos.is_sequential();
        let bogus = check_progression(&mut self.coef_bits, &scan, &sos);

        self.input_scan_number += 1;
        if self.input_scan_number == 1 {
            self.first_scan_components = scan.components().len();
        }
        debug!(
            scan = self.input_scan_number,
            kind = ?scan.kind(),
            components = scan.components().len(),
            "start of scan"
        );
        self.input = InputState::Scan(Box::new(scan));
        if odd_sequential {
            self.warn("invalid SOS parameters for sequential JPEG");
        }
        for _ in 0..bogus {
            self.warn("inconsistent progression sequence");
        }
        Ok(())
    }
}

/// Track the precision of every coefficient and count the violations of the
/// progression rules: AC before DC, and refinements that do not continue at
/// the bit where the previous scan stopped.
fn check_progression(coef_bits: &mut [[i8; 64]], scan: &ScanState, sos: &StartOfScanInfo) -> u32 {
    if scan.kind() == ScanKind::Sequential {
        return 0;
    }
    let (ss, se) = scan.spectral_range();
    let mut bogus = 0;
    for &c in scan.components() {
        let bits = &mut coef_bits[c];
        if ss != 0 && bits[0] < 0 {
            bogus += 1;
        }
        for bit in &mut bits[ss..=se] {
            if sos.approx_high as i8 != (*bit).max(0) {
                bogus += 1;
            }
            *bit = sos.approx_low as i8;
        }
    }
    bogus
}
