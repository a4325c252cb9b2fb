//! Synthesized JPEG streams for tests.
//!
//! Every block carries only a DC coefficient. Chroma components are neutral,
//! so the expected output of a color image is gray: every channel of a pixel
//! equals `128 + luma`, where luma is the DC value known after the scans
//! applied so far.

/// Code lengths of the standard luminance DC table (JPEG Annex K).
pub const STD_DC_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// An AC table holding end-of-band codes only: EOB and EOB1 to EOB4.
const EOB_BITS: [u8; 16] = [0, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
const EOB_VALUES: [u8; 5] = [0x00, 0x10, 0x20, 0x30, 0x40];

/// Longest end-of-band run the AC table can code.
const MAX_EOB_RUN: u32 = 31;

/// DC quantization step; with a step of 8 the IDCT of a DC-only block is the
/// DC value itself.
const DC_QUANT: u16 = 8;

/// A DHT segment defining one table.
pub fn dht_segment(class: u8, bits: &[u8; 16], values: &[u8]) -> Vec<u8> {
    let len = 2 + 1 + 16 + values.len();
    let mut buf = vec![0xFF, 0xC4, (len >> 8) as u8, len as u8, class];
    buf.extend_from_slice(bits);
    buf.extend_from_slice(values);
    buf
}

/// A DQT segment defining one 8-bit table.
pub fn dqt_segment(id: u8, values: &[u16; 64]) -> Vec<u8> {
    let mut buf = vec![0xFF, 0xDB, 0x00, 67, id];
    buf.extend(values.iter().map(|&v| v as u8));
    buf
}

/// Canonical Huffman codes `(code, length)` indexed by symbol.
fn huffman_codes(bits: &[u8; 16], values: &[u8]) -> Vec<Option<(u32, u8)>> {
    let mut codes = vec![None; 256];
    let mut code = 0u32;
    let mut symbols = values.iter();
    for (i, &count) in bits.iter().enumerate() {
        for _ in 0..count {
            let symbol = *symbols.next().unwrap();
            codes[symbol as usize] = Some((code, i as u8 + 1));
            code += 1;
        }
        code <<= 1;
    }
    codes
}

/// Writes entropy-coded data MSB first, stuffing a zero after every 0xFF.
#[derive(Default)]
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    count: u8,
}

impl BitWriter {
    pub fn write_bits(&mut self, value: u32, n: u8) {
        for i in (0..n).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.count += 1;
            if self.count == 8 {
                let byte = self.acc as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0x00);
                }
                self.acc = 0;
                self.count = 0;
            }
        }
    }

    /// Pad the last byte with ones.
    pub fn finish(mut self) -> Vec<u8> {
        if self.count > 0 {
            let pad = 8 - self.count;
            self.write_bits((1 << pad) - 1, pad);
        }
        self.out
    }
}

pub struct FixtureComponent {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    /// DC value of the block at (block row, block column).
    pub dc: fn(usize, usize) -> i16,
}

#[derive(Debug, Clone)]
pub struct ScanSpec {
    /// Positions of the components in the frame.
    pub components: Vec<usize>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl ScanSpec {
    pub fn sequential(components: Vec<usize>) -> Self {
        ScanSpec {
            components,
            ss: 0,
            se: 63,
            ah: 0,
            al: 0,
        }
    }

    pub fn dc_first(components: Vec<usize>, al: u8) -> Self {
        ScanSpec {
            components,
            ss: 0,
            se: 0,
            ah: 0,
            al,
        }
    }

    pub fn dc_refine(components: Vec<usize>, al: u8) -> Self {
        ScanSpec {
            components,
            ss: 0,
            se: 0,
            ah: al + 1,
            al,
        }
    }

    pub fn ac_first(component: usize, ss: u8, se: u8, al: u8) -> Self {
        ScanSpec {
            components: vec![component],
            ss,
            se,
            ah: 0,
            al,
        }
    }

    fn is_dc(&self) -> bool {
        self.ss == 0
    }
}

pub struct Fixture {
    pub width: u16,
    pub height: u16,
    pub components: Vec<FixtureComponent>,
    pub progressive: bool,
    pub restart_interval: u16,
    pub scans: Vec<ScanSpec>,
}

fn neutral(_: usize, _: usize) -> i16 {
    0
}

fn ycbcr(luma: fn(usize, usize) -> i16, h: u8, v: u8) -> Vec<FixtureComponent> {
    vec![
        FixtureComponent {
            id: 1,
            h,
            v,
            dc: luma,
        },
        FixtureComponent {
            id: 2,
            h: 1,
            v: 1,
            dc: neutral,
        },
        FixtureComponent {
            id: 3,
            h: 1,
            v: 1,
            dc: neutral,
        },
    ]
}

fn ramp(row: usize, col: usize) -> i16 {
    (row * 8 + col) as i16 - 20
}

impl Fixture {
    /// 64x48 4:4:4 progressive image: DC at half precision, luma AC, DC
    /// refinement.
    pub fn progressive_3scan() -> Self {
        Fixture {
            width: 64,
            height: 48,
            components: ycbcr(ramp, 1, 1),
            progressive: true,
            restart_interval: 0,
            scans: vec![
                ScanSpec::dc_first(vec![0, 1, 2], 1),
                ScanSpec::ac_first(0, 1, 63, 0),
                ScanSpec::dc_refine(vec![0, 1, 2], 0),
            ],
        }
    }

    /// The same picture as [`Fixture::progressive_3scan`] in one baseline scan.
    pub fn baseline() -> Self {
        Fixture {
            progressive: false,
            scans: vec![ScanSpec::sequential(vec![0, 1, 2])],
            ..Fixture::progressive_3scan()
        }
    }

    /// 20x12 grayscale image refined one DC bit per scan.
    pub fn grayscale() -> Self {
        Fixture {
            width: 20,
            height: 12,
            components: vec![FixtureComponent {
                id: 1,
                h: 1,
                v: 1,
                dc: |row, col| col as i16 * 40 - row as i16 * 50 - 21,
            }],
            progressive: true,
            restart_interval: 0,
            scans: vec![
                ScanSpec::dc_first(vec![0], 2),
                ScanSpec::dc_refine(vec![0], 1),
                ScanSpec::dc_refine(vec![0], 0),
            ],
        }
    }

    /// 40x24 4:2:0 progressive image with a restart every two MCUs.
    pub fn subsampled() -> Self {
        Fixture {
            width: 40,
            height: 24,
            components: ycbcr(|row, col| (row * 6 + col) as i16 * 3 - 30, 2, 2),
            progressive: true,
            restart_interval: 2,
            scans: vec![
                ScanSpec::dc_first(vec![0, 1, 2], 0),
                ScanSpec::ac_first(0, 1, 63, 0),
            ],
        }
    }

    fn max_sampling(&self) -> (usize, usize) {
        (
            self.components.iter().map(|c| c.h as usize).max().unwrap(),
            self.components.iter().map(|c| c.v as usize).max().unwrap(),
        )
    }

    /// MCUs per row and per column.
    fn mcus(&self) -> (usize, usize) {
        let (hmax, vmax) = self.max_sampling();
        (
            (self.width as usize + 8 * hmax - 1) / (8 * hmax),
            (self.height as usize + 8 * vmax - 1) / (8 * vmax),
        )
    }

    /// Blocks per row and per column of a component coded on its own.
    fn component_blocks(&self, c: usize) -> (usize, usize) {
        let (hmax, vmax) = self.max_sampling();
        let component = &self.components[c];
        let w = (self.width as usize * component.h as usize + hmax - 1) / hmax;
        let h = (self.height as usize * component.v as usize + vmax - 1) / vmax;
        ((w + 7) / 8, (h + 7) / 8)
    }

    pub fn sof_segment(&self) -> Vec<u8> {
        let n = self.components.len();
        let len = 8 + 3 * n;
        let mut buf = vec![
            0xFF,
            if self.progressive { 0xC2 } else { 0xC0 },
            (len >> 8) as u8,
            len as u8,
            8,
            (self.height >> 8) as u8,
            self.height as u8,
            (self.width >> 8) as u8,
            self.width as u8,
            n as u8,
        ];
        for component in &self.components {
            buf.extend([component.id, component.h << 4 | component.v, 0]);
        }
        buf
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0xFF, 0xD8];
        let mut quant = [1; 64];
        quant[0] = DC_QUANT;
        buf.extend(dqt_segment(0, &quant));
        buf.extend(self.sof_segment());
        buf.extend(dht_segment(0x00, &STD_DC_BITS, &STD_DC_VALUES));
        buf.extend(dht_segment(0x10, &EOB_BITS, &EOB_VALUES));
        if self.restart_interval > 0 {
            let [hi, lo] = self.restart_interval.to_be_bytes();
            buf.extend([0xFF, 0xDD, 0x00, 0x04, hi, lo]);
        }
        for scan in &self.scans {
            self.encode_scan(&mut buf, scan);
        }
        buf.extend([0xFF, 0xD9]);
        buf
    }

    /// The coding units of a scan; each unit lists `(scan component, block
    /// row, block column)`.
    fn units(&self, scan: &ScanSpec) -> Vec<Vec<(usize, usize, usize)>> {
        let mut units = vec![];
        if scan.components.len() == 1 {
            let (wide, tall) = self.component_blocks(scan.components[0]);
            for row in 0..tall {
                for col in 0..wide {
                    units.push(vec![(0, row, col)]);
                }
            }
            return units;
        }
        let (mcus_wide, mcus_tall) = self.mcus();
        for my in 0..mcus_tall {
            for mx in 0..mcus_wide {
                let mut unit = vec![];
                for (i, &c) in scan.components.iter().enumerate() {
                    let component = &self.components[c];
                    let (h, v) = (component.h as usize, component.v as usize);
                    for y in 0..v {
                        for x in 0..h {
                            unit.push((i, my * v + y, mx * h + x));
                        }
                    }
                }
                units.push(unit);
            }
        }
        units
    }

    fn encode_scan(&self, buf: &mut Vec<u8>, scan: &ScanSpec) {
        let n = scan.components.len();
        let len = 6 + 2 * n;
        buf.extend([0xFF, 0xDA, (len >> 8) as u8, len as u8, n as u8]);
        for &c in &scan.components {
            buf.extend([self.components[c].id, 0x00]);
        }
        buf.extend([scan.ss, scan.se, scan.ah << 4 | scan.al]);

        let dc_codes = huffman_codes(&STD_DC_BITS, &STD_DC_VALUES);
        let ac_codes = huffman_codes(&EOB_BITS, &EOB_VALUES);
        let mut writer = BitWriter::default();
        let mut last_dc = vec![0i32; n];
        let mut eob_run = 0;
        let mut restarts = 0u8;
        let interval = self.restart_interval as usize;

        for (u, unit) in self.units(scan).into_iter().enumerate() {
            if interval > 0 && u > 0 && u % interval == 0 {
                flush_eob_run(&mut writer, &ac_codes, &mut eob_run);
                buf.extend(std::mem::take(&mut writer).finish());
                buf.extend([0xFF, 0xD0 + restarts % 8]);
                restarts += 1;
                last_dc.fill(0);
            }
            for (i, row, col) in unit {
                let dc = (self.components[scan.components[i]].dc)(row, col) as i32;
                if !self.progressive {
                    encode_dc(&mut writer, &dc_codes, dc - last_dc[i]);
                    last_dc[i] = dc;
                    let (code, len) = ac_codes[0x00].unwrap();
                    writer.write_bits(code, len);
                } else if scan.is_dc() && scan.ah == 0 {
                    let value = dc >> scan.al;
                    encode_dc(&mut writer, &dc_codes, value - last_dc[i]);
                    last_dc[i] = value;
                } else if scan.is_dc() {
                    writer.write_bits(((dc >> scan.al) & 1) as u32, 1);
                } else {
                    eob_run += 1;
                    if eob_run == MAX_EOB_RUN {
                        flush_eob_run(&mut writer, &ac_codes, &mut eob_run);
                    }
                }
            }
        }
        flush_eob_run(&mut writer, &ac_codes, &mut eob_run);
        buf.extend(writer.finish());
    }

    /// Expected output after the first `scans` scans (all of them for
    /// `None`).
    pub fn expected_pixels(&self, scans: Option<usize>) -> Vec<u8> {
        let applied = &self.scans[..scans.unwrap_or(self.scans.len())];
        let luma = &self.components[0];
        let al = (applied.iter().rev())
            .find(|scan| scan.is_dc() && scan.components.contains(&0))
            .map(|scan| scan.al);
        let (hmax, vmax) = self.max_sampling();

        let mut pixels = vec![];
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let row = y * luma.v as usize / vmax / 8;
                let col = x * luma.h as usize / hmax / 8;
                let value = match al {
                    Some(al) => ((luma.dc)(row, col) >> al) << al,
                    None => 0,
                };
                let pixel = (value + 128).clamp(0, 255) as u8;
                for _ in 0..self.components.len() {
                    pixels.push(pixel);
                }
            }
        }
        pixels
    }
}

fn encode_dc(writer: &mut BitWriter, codes: &[Option<(u32, u8)>], diff: i32) {
    let category = 32 - diff.unsigned_abs().leading_zeros();
    let (code, len) = codes[category as usize].unwrap();
    writer.write_bits(code, len);
    let bits = if diff < 0 {
        diff + (1 << category) - 1
    } else {
        diff
    };
    writer.write_bits(bits as u32, category as u8);
}

fn flush_eob_run(writer: &mut BitWriter, codes: &[Option<(u32, u8)>], eob_run: &mut u32) {
    if *eob_run == 0 {
        return;
    }
    let n = 31 - eob_run.leading_zeros();
    let (code, len) = codes[(n << 4) as usize].unwrap();
    writer.write_bits(code, len);
    writer.write_bits(*eob_run - (1 << n), n as u8);
    *eob_run = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_stuffing() {
        let mut writer = BitWriter::default();
        writer.write_bits(0xFF, 8);
        writer.write_bits(0b0, 1);
        assert_eq!(writer.finish(), vec![0xFF, 0x00, 0x7F]);
    }

    #[test]
    fn test_standard_dc_codes() {
        let codes = huffman_codes(&STD_DC_BITS, &STD_DC_VALUES);
        assert_eq!(codes[0], Some((0b00, 2)));
        assert_eq!(codes[3], Some((0b100, 3)));
        assert_eq!(codes[11], Some((0b111111110, 9)));
    }

    #[test]
    fn test_geometry() {
        let fixture = Fixture::subsampled();
        assert_eq!(fixture.mcus(), (3, 2));
        assert_eq!(fixture.component_blocks(0), (5, 3));
        assert_eq!(fixture.component_blocks(1), (3, 2));
        assert_eq!(fixture.units(&fixture.scans[0])[0].len(), 6);
    }
}
