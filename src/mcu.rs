use smallvec::SmallVec;

use crate::{
    bit_reader::BitReader,
    error,
    huffman::HuffmanTree,
    marker::Marker,
    start_of_frame::FrameInfo,
    start_of_scan::StartOfScanInfo,
    Tables,
};
use std::{
    fmt::Debug,
    io::{Read, Result},
};
use tracing::trace;

/// 8x8 Block.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(align(32))] // optimize
pub struct Block(pub [i16; 64]);

impl Default for Block {
    fn default() -> Self {
        Block([0; 64])
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..8 {
            for j in 0..8 {
                write!(f, " {}", self.0[i * 8 + j])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Quantized coefficients of one component, each block in zigzag order.
#[derive(Debug, Clone)]
pub struct CoefficientPlane {
    pub blocks_wide: usize,
    pub blocks_tall: usize,
    pub blocks: Vec<Block>,
    /// Quantization table latched when the component is first scanned.
    pub quantization: Option<[u16; 64]>,
}

impl CoefficientPlane {
    pub fn new(blocks_wide: usize, blocks_tall: usize) -> Self {
        CoefficientPlane {
            blocks_wide,
            blocks_tall,
            blocks: vec![Block::default(); blocks_wide * blocks_tall],
            quantization: None,
        }
    }

    pub fn block(&self, row: usize, col: usize) -> &Block {
        &self.blocks[row * self.blocks_wide + col]
    }

    pub fn block_mut(&mut self, row: usize, col: usize) -> &mut Block {
        &mut self.blocks[row * self.blocks_wide + col]
    }
}

/// What a scan contributes to the coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// All coefficients at full precision (baseline and extended frames).
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

/// Position and predictor state of the scan being decoded.
#[derive(Debug, Clone)]
pub struct ScanState {
    kind: ScanKind,
    /// Frame positions of the scan components.
    components: SmallVec<[usize; 4]>,
    dc_tables: SmallVec<[usize; 4]>,
    ac_tables: SmallVec<[usize; 4]>,
    spectral_start: usize,
    spectral_end: usize,
    approx_low: u8,
    /// MCUs per row, or blocks per row for a non-interleaved scan.
    units_wide: usize,
    units_tall: usize,
    row: usize,
    units_done: usize,
    restart_interval: usize,
    next_restart: u8,
    last_dc: [i32; 4],
    eob_run: u32,
    /// Recoverable problems met since the last call to [`ScanState::take_warnings`].
    warnings: u32,
}

impl ScanState {
    pub fn new(
        sos: &StartOfScanInfo,
        components: SmallVec<[usize; 4]>,
        frame: &FrameInfo,
        restart_interval: u16,
    ) -> Self {
        let kind = match (
            frame.progressive,
            sos.spectral_start == 0,
            sos.approx_high == 0,
        ) {
            (false, _, _) => ScanKind::Sequential,
            (true, true, true) => ScanKind::DcFirst,
            (true, true, false) => ScanKind::DcRefine,
            (true, false, true) => ScanKind::AcFirst,
            (true, false, false) => ScanKind::AcRefine,
        };
        let (spectral_start, spectral_end, approx_low) = match kind {
            ScanKind::Sequential => (0, 63, 0),
            _ => (
                sos.spectral_start as usize,
                sos.spectral_end as usize,
                sos.approx_low,
            ),
        };
        let (units_wide, units_tall) = if components.len() > 1 {
            (
                frame.mcu_width_num() as usize,
                frame.mcu_height_num() as usize,
            )
        } else {
            (
                frame.component_blocks_wide(components[0]),
                frame.component_blocks_tall(components[0]),
            )
        };
        ScanState {
            kind,
            dc_tables: sos.components.iter().map(|c| c.table.dc.index()).collect(),
            ac_tables: sos.components.iter().map(|c| c.table.ac.index()).collect(),
            components,
            spectral_start,
            spectral_end,
            approx_low,
            units_wide,
            units_tall,
            row: 0,
            units_done: 0,
            restart_interval: restart_interval as usize,
            next_restart: 0,
            last_dc: [0; 4],
            eob_run: 0,
            warnings: 0,
        }
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    /// Frame positions of the scan components.
    pub fn components(&self) -> &[usize] {
        &self.components
    }

    /// First and last coefficient (zigzag index) of the scan.
    pub fn spectral_range(&self) -> (usize, usize) {
        (self.spectral_start, self.spectral_end)
    }

    /// Fail unless every Huffman table the scan needs is defined.
    pub(crate) fn check_tables(&self, tables: &Tables) -> Result<()> {
        let (dc, ac) = match self.kind {
            ScanKind::Sequential => (true, true),
            ScanKind::DcFirst => (true, false),
            ScanKind::DcRefine => (false, false),
            ScanKind::AcFirst | ScanKind::AcRefine => (false, true),
        };
        for i in 0..self.components.len() {
            if dc && tables.dc[self.dc_tables[i]].is_none() {
                return Err(error(format!(
                    "Huffman table 0x{:02X} was not defined",
                    self.dc_tables[i]
                )));
            }
            if ac && tables.ac[self.ac_tables[i]].is_none() {
                return Err(error(format!(
                    "Huffman table 0x{:02X} was not defined",
                    0x10 | self.ac_tables[i]
                )));
            }
        }
        Ok(())
    }

    /// Number of recoverable problems since the last call.
    pub fn take_warnings(&mut self) -> u32 {
        std::mem::take(&mut self.warnings)
    }

    /// Decode one row of MCUs (blocks for a non-interleaved scan).
    ///
    /// Returns `true` when the row was the last one of the scan.
    pub(crate) fn decode_row<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        frame: &FrameInfo,
        tables: &Tables,
        planes: &mut [CoefficientPlane],
    ) -> Result<bool> {
        for col in 0..self.units_wide {
            if self.restart_interval > 0
                && self.units_done > 0
                && self.units_done % self.restart_interval == 0
            {
                self.restart(reader)?;
            }
            if self.components.len() > 1 {
                for i in 0..self.components.len() {
                    let c = self.components[i];
                    let info = &frame.component_infos[c];
                    let (h, v) = (
                        info.horizontal_sampling as usize,
                        info.vertical_sampling as usize,
                    );
                    for y in 0..v {
                        for x in 0..h {
                            let block = planes[c].block_mut(self.row * v + y, col * h + x);
                            self.decode_block(i, reader, tables, block)?;
                        }
                    }
                }
            } else {
                let block = planes[self.components[0]].block_mut(self.row, col);
                self.decode_block(0, reader, tables, block)?;
            }
            self.units_done += 1;
            reader.check_truncated()?;
        }
        self.row += 1;
        trace!(row = self.row, rows = self.units_tall, "decoded row");
        if self.row < self.units_tall {
            return Ok(false);
        }
        if reader.reset()? {
            self.warnings += 1;
        }
        Ok(true)
    }

    /// Consume the RSTn marker expected at the end of a restart interval.
    fn restart<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        if reader.reset()? {
            self.warnings += 1;
        }
        let (code, skip) = reader.read_marker()?;
        if skip != 0 {
            self.warnings += 1;
        }
        if code != Marker::RST0 as u8 + self.next_restart {
            return Err(error(format!(
                "expected RST{}, found marker 0x{code:02X}",
                self.next_restart
            )));
        }
        self.next_restart = (self.next_restart + 1) % 8;
        self.last_dc = [0; 4];
        self.eob_run = 0;
        Ok(())
    }

    fn decode_block<R: Read>(
        &mut self,
        i: usize,
        reader: &mut BitReader<R>,
        tables: &Tables,
        block: &mut Block,
    ) -> Result<()> {
        let (ss, se, al) = (self.spectral_start, self.spectral_end, self.approx_low);
        match self.kind {
            ScanKind::Sequential => {
                let dc = table(&tables.dc, self.dc_tables[i])?;
                decode_dc_first(reader, dc, &mut self.last_dc[i], 0, block)?;
                let ac = table(&tables.ac, self.ac_tables[i])?;
                decode_ac_sequential(reader, ac, block)
            }
            ScanKind::DcFirst => {
                let dc = table(&tables.dc, self.dc_tables[i])?;
                decode_dc_first(reader, dc, &mut self.last_dc[i], al, block)
            }
            ScanKind::DcRefine => decode_dc_refine(reader, al, block),
            ScanKind::AcFirst => {
                let ac = table(&tables.ac, self.ac_tables[i])?;
                decode_ac_first(reader, ac, ss, se, al, &mut self.eob_run, block)
            }
            ScanKind::AcRefine => {
                let ac = table(&tables.ac, self.ac_tables[i])?;
                decode_ac_refine(reader, ac, ss, se, al, &mut self.eob_run, block)
            }
        }
    }
}

fn table(tables: &[Option<HuffmanTree>; 4], id: usize) -> Result<&HuffmanTree> {
    tables[id]
        .as_ref()
        .ok_or_else(|| error(format!("Huffman table {id} was not defined")))
}

fn to_coefficient(v: i64) -> i16 {
    v.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Decode a DC difference and store the predicted value shifted by `al`.
pub(crate) fn decode_dc_first<R: Read>(
    reader: &mut BitReader<R>,
    tree: &HuffmanTree,
    last_dc: &mut i32,
    al: u8,
    block: &mut Block,
) -> Result<()> {
    let len = reader.read_decode_huffman(tree)?;
    *last_dc = last_dc.wrapping_add(reader.read_value(len)?);
    block.0[0] = to_coefficient((*last_dc as i64) << al);
    Ok(())
}

/// Read one correction bit of the DC coefficient.
pub(crate) fn decode_dc_refine<R: Read>(
    reader: &mut BitReader<R>,
    al: u8,
    block: &mut Block,
) -> Result<()> {
    if reader.read_bits(1)? != 0 {
        block.0[0] |= 1 << al;
    }
    Ok(())
}

/// Decode all AC coefficients of a sequential scan.
pub(crate) fn decode_ac_sequential<R: Read>(
    reader: &mut BitReader<R>,
    tree: &HuffmanTree,
    block: &mut Block,
) -> Result<()> {
    let mut k = 1;
    while k < 64 {
        let code = reader.read_decode_huffman(tree)?;
        let zeros = (code >> 4) as usize;
        let len = code & 0x0F;
        if len == 0 {
            if zeros != 15 {
                break;
            }
            k += 16;
            continue;
        }
        k += zeros;
        if k > 63 {
            return Err(error("corrupt JPEG data: AC run past the end of the block"));
        }
        block.0[k] = to_coefficient(reader.read_value(len)? as i64);
        k += 1;
    }
    Ok(())
}

/// Decode the first pass of the spectral band `ss..=se`.
///
/// `eob_run` counts the blocks that still belong to an end-of-band run.
pub(crate) fn decode_ac_first<R: Read>(
    reader: &mut BitReader<R>,
    tree: &HuffmanTree,
    ss: usize,
    se: usize,
    al: u8,
    eob_run: &mut u32,
    block: &mut Block,
) -> Result<()> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }
    let mut k = ss;
    while k <= se {
        let code = reader.read_decode_huffman(tree)?;
        let run = code >> 4;
        let len = code & 0x0F;
        if len == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            // EOBn: this block and (2^run - 1 + extra) more end here
            *eob_run = (1 << run) - 1;
            if run > 0 {
                *eob_run += reader.read_bits(run)? as u32;
            }
            break;
        }
        k += run as usize;
        if k > se {
            return Err(error("corrupt JPEG data: AC run past the end of the band"));
        }
        block.0[k] = to_coefficient((reader.read_value(len)? as i64) << al);
        k += 1;
    }
    Ok(())
}

/// Decode a refinement pass of the spectral band `ss..=se`.
///
/// Coefficients that are already nonzero receive one correction bit each;
/// newly nonzero coefficients are placed after runs of zero coefficients.
pub(crate) fn decode_ac_refine<R: Read>(
    reader: &mut BitReader<R>,
    tree: &HuffmanTree,
    ss: usize,
    se: usize,
    al: u8,
    eob_run: &mut u32,
    block: &mut Block,
) -> Result<()> {
    let p1 = 1i16 << al;
    let m1 = -1i16 << al;
    let mut k = ss;

    if *eob_run == 0 {
        while k <= se {
            let code = reader.read_decode_huffman(tree)?;
            let mut run = code >> 4;
            let len = code & 0x0F;
            let mut value = 0;
            if len != 0 {
                if len != 1 {
                    return Err(error("corrupt JPEG data: bad refinement code"));
                }
                value = if reader.read_bits(1)? != 0 { p1 } else { m1 };
            } else if run != 15 {
                *eob_run = 1 << run;
                if run > 0 {
                    *eob_run += reader.read_bits(run)? as u32;
                }
                break;
            }
            // skip `run` zero coefficients, refining the nonzero ones passed
            loop {
                let coef = &mut block.0[k];
                if *coef != 0 {
                    refine(reader, coef, p1, m1)?;
                } else {
                    if run == 0 {
                        break;
                    }
                    run -= 1;
                }
                k += 1;
                if k > se {
                    break;
                }
            }
            if value != 0 {
                if k > se {
                    return Err(error("corrupt JPEG data: AC run past the end of the band"));
                }
                block.0[k] = value;
            }
            k += 1;
        }
    }

    if *eob_run > 0 {
        // inside an end-of-band run only the nonzero coefficients are refined
        while k <= se {
            let coef = &mut block.0[k];
            if *coef != 0 {
                refine(reader, coef, p1, m1)?;
            }
            k += 1;
        }
        *eob_run -= 1;
    }
    Ok(())
}

fn refine<R: Read>(reader: &mut BitReader<R>, coef: &mut i16, p1: i16, m1: i16) -> Result<()> {
    if reader.read_bits(1)? != 0 && *coef & p1 == 0 {
        *coef = coef.saturating_add(if *coef >= 0 { p1 } else { m1 });
    }
    Ok(())
}
