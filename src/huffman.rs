use super::{error, Decoder};
use num_enum::TryFromPrimitive;
use std::{
    fmt::Debug,
    io::{Error, ErrorKind, Read, Result},
    str::FromStr,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    pub class: HuffmanTableClass,
    pub map: Vec<(Code, u8)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum HuffmanTableClass {
    DC0 = 0x00,
    DC1 = 0x01,
    DC2 = 0x02,
    DC3 = 0x03,
    AC0 = 0x10,
    AC1 = 0x11,
    AC2 = 0x12,
    AC3 = 0x13,
}

impl HuffmanTableClass {
    pub fn is_dc(self) -> bool {
        (self as u8) >> 4 == 0
    }

    /// The table slot (0-3).
    pub fn index(self) -> usize {
        (self as u8 & 0x0F) as usize
    }
}

#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code {
    pub value: u32,
    pub len: u8,
}

impl Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0len$b}", self.value, len = self.len as usize)
    }
}

impl FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Code {
            value: u32::from_str_radix(s, 2)
                .map_err(|_| Error::new(ErrorKind::InvalidData, "Invalid code"))?,
            len: s.len() as u8,
        })
    }
}

impl Code {
    fn inc(&mut self) {
        self.value += 1;
    }
    fn double(&mut self) {
        self.value <<= 1;
        self.len += 1;
    }
}

/// Canonical Huffman decoding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    /// Largest code of each length, or -1 if there is none.
    maxcode: [i32; 17],
    mincode: [u32; 17],
    /// Index into `values` of the first code of each length.
    valptr: [usize; 17],
    values: Vec<u8>,
}

impl HuffmanTree {
    pub fn new(table: &HuffmanTable) -> Self {
        let mut maxcode = [-1; 17];
        let mut mincode = [0; 17];
        let mut valptr = [0; 17];
        for (i, (code, _)) in table.map.iter().enumerate() {
            let len = code.len as usize;
            if maxcode[len] < 0 {
                mincode[len] = code.value;
                valptr[len] = i;
            }
            maxcode[len] = code.value as i32;
        }
        HuffmanTree {
            maxcode,
            mincode,
            valptr,
            values: table.map.iter().map(|&(_, v)| v).collect(),
        }
    }

    /// Decode the code at the top of the next 16 bits.
    ///
    /// Returns the code length and the symbol.
    pub fn lookup(&self, bits: u16) -> Option<(u8, u8)> {
        for len in 1..=16 {
            let code = (bits >> (16 - len)) as i32;
            if code <= self.maxcode[len] {
                let i = self.valptr[len] + (code - self.mincode[len] as i32) as usize;
                return Some((len as u8, self.values[i]));
            }
        }
        None
    }
}

impl<R: Read> Decoder<R> {
    /// Read the [`HuffmanTable`]s of a DHT segment.
    pub fn read_huffman_table(&mut self) -> Result<Vec<HuffmanTable>> {
        let mut len = self.read_u16()?;
        debug!(len, "read section DHT");
        len = len.checked_sub(2).ok_or_else(|| error("bogus DHT length"))?;
        let mut tables = vec![];
        while len != 0 {
            let byte = self.read_byte()?;
            let class = HuffmanTableClass::try_from(byte)
                .map_err(|_| error(format!("invalid huffman table class: 0x{byte:02x}")))?;
            debug!(?class, "read huffman table");
            let mut counts = [0; 16];
            self.reader.read_exact(&mut counts)?;
            let total: u16 = counts.iter().map(|&c| c as u16).sum();
            if total > 256 || 1 + 16 + total > len {
                return Err(error("bogus DHT length"));
            }
            len -= 1 + 16;

            let mut code = Code::default();
            let mut map = vec![];
            for count in counts {
                code.double();
                for _ in 0..count {
                    // the codes of each length must fit in that length
                    if code.value >= 1 << code.len {
                        return Err(error(format!("bad Huffman table {class:?}")));
                    }
                    let value = self.read_byte()?;
                    map.push((code, value));
                    code.inc();
                }
                len -= count as u16;
            }
            tables.push(HuffmanTable { class, map });
        }
        Ok(tables)
    }
}
