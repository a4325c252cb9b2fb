use crate::{error, unsupported, Decoder};
use smallvec::SmallVec;
use std::io::{Read, Result};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// SOF2 frame; otherwise sequential (SOF0/SOF1).
    pub progressive: bool,
    pub precision: u8,
    pub height: u16,
    pub width: u16,
    pub component_infos: SmallVec<[ComponentInfo; 4]>,
    pub max_horizontal_sampling: u8,
    pub max_vertical_sampling: u8,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: u8,
    pub horizontal_sampling: u8,
    pub vertical_sampling: u8,
    pub quant_table_id: u8,
}

impl FrameInfo {
    pub fn mcu_width(&self) -> u16 {
        8 * self.max_horizontal_sampling as u16
    }

    pub fn mcu_height(&self) -> u16 {
        8 * self.max_vertical_sampling as u16
    }

    pub fn mcu_width_num(&self) -> u16 {
        (self.width - 1) / self.mcu_width() + 1
    }

    pub fn mcu_height_num(&self) -> u16 {
        (self.height - 1) / self.mcu_height() + 1
    }

    /// Block columns of component `c`, padded to whole MCUs.
    pub fn blocks_wide(&self, c: usize) -> usize {
        self.mcu_width_num() as usize * self.component_infos[c].horizontal_sampling as usize
    }

    /// Block rows of component `c`, padded to whole MCUs.
    pub fn blocks_tall(&self, c: usize) -> usize {
        self.mcu_height_num() as usize * self.component_infos[c].vertical_sampling as usize
    }

    /// Block columns of component `c` coded by a non-interleaved scan.
    pub fn component_blocks_wide(&self, c: usize) -> usize {
        let h = self.component_infos[c].horizontal_sampling as usize;
        let samples = ceil_div(self.width as usize * h, self.max_horizontal_sampling as usize);
        ceil_div(samples, 8)
    }

    /// Block rows of component `c` coded by a non-interleaved scan.
    pub fn component_blocks_tall(&self, c: usize) -> usize {
        let v = self.component_infos[c].vertical_sampling as usize;
        let samples = ceil_div(self.height as usize * v, self.max_vertical_sampling as usize);
        ceil_div(samples, 8)
    }

    /// Position of the component with identifier `id`.
    pub fn index_of(&self, id: u8) -> Option<usize> {
        self.component_infos.iter().position(|c| c.id == id)
    }
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

impl<R: Read> Decoder<R> {
    /// Read the Start Of Frame info (SOF0, SOF1 or SOF2).
    pub fn read_start_of_frame(&mut self, progressive: bool) -> Result<FrameInfo> {
        let len = self.read_u16()?;
        debug!(len, progressive, "read section SOF");

        let precision = self.read_byte()?;
        let height = self.read_u16()?;
        let width = self.read_u16()?;
        let number_of_component = self.read_byte()?;
        if len != 8 + 3 * number_of_component as u16 {
            return Err(error(format!("bogus SOF length: {len}")));
        }
        if precision != 8 {
            return Err(unsupported(format!("unsupported sample precision: {precision}")));
        }
        if height == 0 {
            return Err(unsupported("image height defined by DNL is not supported"));
        }
        if width == 0 {
            return Err(error("empty JPEG image"));
        }
        if !matches!(number_of_component, 1 | 3) {
            return Err(unsupported(format!(
                "unsupported number of components: {number_of_component}"
            )));
        }

        let mut component_infos = SmallVec::<[ComponentInfo; 4]>::new();
        for _ in 0..number_of_component {
            let id = self.read_byte()?;
            let sampling = self.read_byte()?;
            let quant_table_id = self.read_byte()?;
            let info = ComponentInfo {
                id,
                horizontal_sampling: sampling >> 4,
                vertical_sampling: sampling & 0x0f,
                quant_table_id,
            };
            debug!(?info, "read component");
            if !(1..=4).contains(&info.horizontal_sampling)
                || !(1..=4).contains(&info.vertical_sampling)
            {
                return Err(error(format!("bogus sampling factors: 0x{sampling:02X}")));
            }
            if quant_table_id > 3 {
                return Err(error(format!("invalid quantization table id: {quant_table_id}")));
            }
            if component_infos.iter().any(|c| c.id == id) {
                return Err(error(format!("duplicate component id: {id}")));
            }
            component_infos.push(info);
        }

        Ok(FrameInfo {
            progressive,
            precision,
            height,
            width,
            max_horizontal_sampling: (component_infos.iter())
                .map(|c| c.horizontal_sampling)
                .max()
                .unwrap_or(1),
            max_vertical_sampling: (component_infos.iter())
                .map(|c| c.vertical_sampling)
                .max()
                .unwrap_or(1),
            component_infos,
        })
    }
}
