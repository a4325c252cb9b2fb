use crate::{
    error,
    huffman::HuffmanTableClass::{self, *},
    start_of_frame::FrameInfo,
    Decoder,
};
use smallvec::SmallVec;
use std::io::{Read, Result};
use tracing::debug;

/// Most blocks one MCU of an interleaved scan may hold.
const MAX_BLOCKS_IN_MCU: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOfScanInfo {
    pub components: SmallVec<[ScanComponent; 4]>,
    /// First coefficient (zigzag index) coded by the scan.
    pub spectral_start: u8,
    /// Last coefficient (zigzag index) coded by the scan.
    pub spectral_end: u8,
    /// Successive approximation bit position of the previous scan, or 0.
    pub approx_high: u8,
    /// Successive approximation bit position of this scan.
    pub approx_low: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    pub id: u8,
    pub table: HuffmanTableId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanTableId {
    pub dc: HuffmanTableClass,
    pub ac: HuffmanTableClass,
}

impl StartOfScanInfo {
    /// The scan covers the whole spectrum at full precision.
    pub fn is_sequential(&self) -> bool {
        self.spectral_start == 0
            && self.spectral_end == 63
            && self.approx_high == 0
            && self.approx_low == 0
    }

    /// Check the scan against the frame and return the frame position of each
    /// scan component.
    pub fn resolve(&self, frame: &FrameInfo) -> Result<SmallVec<[usize; 4]>> {
        let mut indices = SmallVec::<[usize; 4]>::new();
        for component in &self.components {
            let index = frame
                .index_of(component.id)
                .ok_or_else(|| error(format!("invalid component id: {}", component.id)))?;
            if indices.contains(&index) {
                return Err(error(format!("component {} coded twice", component.id)));
            }
            indices.push(index);
        }
        if indices.len() > 1 {
            let blocks: usize = (indices.iter())
                .map(|&i| &frame.component_infos[i])
                .map(|c| c.horizontal_sampling as usize * c.vertical_sampling as usize)
                .sum();
            if blocks > MAX_BLOCKS_IN_MCU {
                return Err(error(format!("{blocks} blocks in one MCU")));
            }
        }
        if frame.progressive {
            let (ss, se, ah, al) = (
                self.spectral_start,
                self.spectral_end,
                self.approx_high,
                self.approx_low,
            );
            let bad = if ss == 0 {
                se != 0
            } else {
                se < ss || se > 63 || indices.len() != 1
            };
            if bad || (ah != 0 && ah != al + 1) || al > 13 {
                return Err(error(format!(
                    "invalid progressive parameters Ss={ss} Se={se} Ah={ah} Al={al}"
                )));
            }
        }
        Ok(indices)
    }
}

impl<R: Read> Decoder<R> {
    /// Read the [`StartOfScanInfo`].
    pub fn read_start_of_scan(&mut self) -> Result<StartOfScanInfo> {
        let len = self.read_u16()?;
        debug!(len, "read section SOS");

        let component_number = self.read_byte()?;
        if !(1..=4).contains(&component_number) || len != 6 + 2 * component_number as u16 {
            return Err(error(format!(
                "bogus SOS: {component_number} components in {len} bytes"
            )));
        }
        let mut components = SmallVec::new();
        for _ in 0..component_number {
            let id = self.read_byte()?;
            let tables = self.read_byte()?;
            let table = HuffmanTableId {
                dc: match tables >> 4 {
                    0 => DC0,
                    1 => DC1,
                    2 => DC2,
                    3 => DC3,
                    dc => return Err(error(format!("invalid DC table: {dc}"))),
                },
                ac: match tables & 0x0F {
                    0 => AC0,
                    1 => AC1,
                    2 => AC2,
                    3 => AC3,
                    ac => return Err(error(format!("invalid AC table: {ac}"))),
                },
            };
            components.push(ScanComponent { id, table });
        }
        let spectral_start = self.read_byte()?;
        let spectral_end = self.read_byte()?;
        let approx = self.read_byte()?;

        let sos = StartOfScanInfo {
            components,
            spectral_start,
            spectral_end,
            approx_high: approx >> 4,
            approx_low: approx & 0x0F,
        };
        debug!(?sos, "read scan header");
        Ok(sos)
    }
}
