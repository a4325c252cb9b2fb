use crate::{error, huffman::HuffmanTree};
use std::io::{BufRead, BufReader, ErrorKind, Read, Result};

/// Reads entropy-coded data bit by bit and the marker segments around it.
///
/// Stuffed `0xFF 0x00` pairs are unescaped. When the data runs into a marker
/// (or the end of the file) the marker is kept for the marker reader and zero
/// bits are supplied instead.
pub struct BitReader<R: Read> {
    reader: BufReader<R>,
    buf: u64,
    /// The lower `count` bits of `buf` is valid.
    count: u8,
    /// The lower `padding` bits of `buf` are zeros that were not in the stream.
    padding: u8,
    /// A marker found inside entropy-coded data.
    marker: Option<u8>,
    eof: bool,
    /// Padding bits have been consumed.
    overrun: bool,
}

impl<R: Read> BitReader<R> {
    pub fn new(reader: BufReader<R>) -> Self {
        Self {
            reader,
            buf: 0,
            count: 0,
            padding: 0,
            marker: None,
            eof: false,
            overrun: false,
        }
    }

    /// Read a byte outside of entropy-coded data.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a big-endian u16 outside of entropy-coded data.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0; 2];
        self.reader.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf)
    }

    /// Skip `n` bytes outside of entropy-coded data.
    pub fn skip(&mut self, mut n: usize) -> Result<()> {
        while n > 0 {
            let available = self.reader.fill_buf()?.len();
            if available == 0 {
                return Err(ErrorKind::UnexpectedEof.into());
            }
            let len = available.min(n);
            self.reader.consume(len);
            n -= len;
        }
        Ok(())
    }

    /// Return the next marker code and the number of garbage bytes skipped
    /// before it.
    pub fn read_marker(&mut self) -> Result<(u8, usize)> {
        if let Some(marker) = self.marker.take() {
            return Ok((marker, 0));
        }
        let mut skipped = 0;
        loop {
            let byte = self.read_u8()?;
            if byte != 0xFF {
                skipped += 1;
                continue;
            }
            // any number of fill bytes may precede the marker code
            let mut code = self.read_u8()?;
            while code == 0xFF {
                code = self.read_u8()?;
            }
            if code == 0x00 {
                skipped += 2;
                continue;
            }
            return Ok((code, skipped));
        }
    }

    pub fn read_decode_huffman(&mut self, tree: &HuffmanTree) -> Result<u8> {
        let x = self.peek(16)?;
        let (len, val) = tree
            .lookup(x)
            .ok_or_else(|| error("corrupt JPEG data: bad Huffman code"))?;
        self.consume(len);
        Ok(val)
    }

    /// Read an encoded value in length.
    pub fn read_value(&mut self, len: u8) -> Result<i32> {
        if len == 0 {
            return Ok(0);
        }
        if len > 16 {
            return Err(error(format!("corrupt JPEG data: value of {len} bits")));
        }
        let mut v = self.read_bits(len)? as i32;
        if v >> (len - 1) == 0 {
            v -= (1 << len) - 1;
        }
        Ok(v)
    }

    /// Read `n` raw bits.
    pub fn read_bits(&mut self, n: u8) -> Result<u16> {
        if n == 0 {
            return Ok(0);
        }
        let v = self.peek(n)?;
        self.consume(n);
        Ok(v)
    }

    /// Peek the next `n` bits.
    fn peek(&mut self, n: u8) -> Result<u16> {
        debug_assert!(n <= 16);
        while self.count < n {
            self.fill_byte()?;
        }
        Ok(((self.buf >> (self.count - n)) & ((1 << n) - 1)) as u16)
    }

    /// Consume `n` bits.
    fn consume(&mut self, n: u8) {
        self.count -= n;
        self.buf &= (1 << self.count) - 1;
        if self.count < self.padding {
            self.overrun = true;
            self.padding = self.count;
        }
    }

    /// Append the next data byte, or zeros once the data has ended.
    fn fill_byte(&mut self) -> Result<()> {
        let byte = match self.next_data_byte()? {
            Some(byte) => byte,
            None => {
                self.padding += 8;
                0
            }
        };
        self.buf = (self.buf << 8) | byte as u64;
        self.count += 8;
        Ok(())
    }

    fn next_data_byte(&mut self) -> Result<Option<u8>> {
        if self.marker.is_some() || self.eof {
            return Ok(None);
        }
        let Some(byte) = self.read_data_u8()? else {
            return Ok(None);
        };
        if byte != 0xFF {
            return Ok(Some(byte));
        }
        loop {
            match self.read_data_u8()? {
                None => return Ok(None),
                Some(0x00) => return Ok(Some(0xFF)),
                Some(0xFF) => continue,
                // RSTn, EOI or the next scan's tables
                Some(code) => {
                    self.marker = Some(code);
                    return Ok(None);
                }
            }
        }
    }

    fn read_data_u8(&mut self) -> Result<Option<u8>> {
        match self.read_u8() {
            Ok(byte) => Ok(Some(byte)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.eof = true;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fail if decoding has used bits beyond the end of the file.
    pub fn check_truncated(&self) -> Result<()> {
        if self.eof && self.overrun {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "unexpected end of file inside entropy-coded data",
            ));
        }
        Ok(())
    }

    /// Discard the bits left in the current data segment.
    ///
    /// Returns whether the segment ended before all of its data was read.
    pub fn reset(&mut self) -> Result<bool> {
        self.check_truncated()?;
        let overrun = self.overrun;
        self.buf = 0;
        self.count = 0;
        self.padding = 0;
        self.overrun = false;
        Ok(overrun)
    }
}
