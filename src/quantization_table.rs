use super::{error, Decoder};
use std::io::{Read, Result};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    pub id: u8,
    /// Values in zigzag order.
    pub values: [u16; 64],
}

impl<R: Read> Decoder<R> {
    /// Read the [`QuantizationTable`].
    pub fn read_quantization_table(&mut self) -> Result<Vec<QuantizationTable>> {
        let mut len = self.read_u16()?;
        debug!(len, "read section DQT");

        len = len.checked_sub(2).ok_or_else(|| error("bogus DQT length"))?;
        let mut tables = vec![];
        while len != 0 {
            let byte = self.read_byte()?;
            let precision = byte >> 4;
            let id = byte & 0x0F;
            debug!(id, precision, "read quantization table");
            if id > 3 {
                return Err(error(format!("invalid quantization table id: {id}")));
            }
            let size = match precision {
                0 => 1 + 64,
                1 => 1 + 128,
                _ => return Err(error(format!("Invalid precision: {}", precision))),
            };
            len = len
                .checked_sub(size)
                .ok_or_else(|| error("bogus DQT length"))?;
            let mut values = [0u16; 64];
            for value in values.iter_mut() {
                *value = match precision {
                    0 => self.read_byte()? as u16,
                    _ => self.read_u16()?,
                };
            }
            tables.push(QuantizationTable { id, values });
        }
        Ok(tables)
    }
}
