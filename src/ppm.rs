//! Netpbm output: `P6` for color snapshots, `P5` for grayscale ones.

use crate::snapshot::{Snapshot, SnapshotSink};
use std::{
    fs::File,
    io::{self, BufWriter, ErrorKind, Result, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

pub struct PpmWriter<W: Write> {
    writer: BufWriter<W>,
    stride: usize,
    rows_left: u32,
}

impl<W: Write> PpmWriter<W> {
    pub fn new(writer: W, width: u32, height: u32, components: u8) -> Result<Self> {
        let magic = match components {
            1 => "P5",
            3 => "P6",
            n => {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("no netpbm format for {n} components"),
                ))
            }
        };
        let mut writer = BufWriter::new(writer);
        write!(writer, "{}\n{} {}\n255\n", magic, width, height)?;
        Ok(PpmWriter {
            writer,
            stride: width as usize * components as usize,
            rows_left: height,
        })
    }

    pub fn write_row(&mut self, row: &[u8]) -> Result<()> {
        if row.len() != self.stride || self.rows_left == 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("unexpected row of {} bytes", row.len()),
            ));
        }
        self.rows_left -= 1;
        self.writer.write_all(row)
    }

    /// Flush the image and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        if self.rows_left != 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} rows missing", self.rows_left),
            ));
        }
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

/// Write a whole snapshot.
pub fn write_snapshot<W: Write>(writer: W, snapshot: &Snapshot) -> Result<W> {
    let mut writer = PpmWriter::new(
        writer,
        snapshot.width,
        snapshot.height,
        snapshot.components,
    )?;
    for row in snapshot.rows() {
        writer.write_row(row)?;
    }
    writer.finish()
}

/// Writes the snapshot of scan `n` to `<base>n.ppm`.
#[derive(Debug, Clone)]
pub struct PpmSink {
    base: PathBuf,
}

impl PpmSink {
    pub fn new(base: impl AsRef<Path>) -> Self {
        PpmSink {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, scan: u32) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(format!("{scan}.ppm"));
        name.into()
    }
}

impl SnapshotSink for PpmSink {
    fn write_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        let path = self.path(snapshot.scan);
        let file = File::create(&path)?;
        write_snapshot(file, &snapshot)?;
        debug!(path = %path.display(), scan = snapshot.scan, "wrote PPM");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(components: u8) -> Snapshot {
        Snapshot {
            scan: 2,
            width: 2,
            height: 2,
            components,
            pixels: (0..4 * components).collect(),
        }
    }

    #[test]
    fn test_write_ppm() {
        let data = write_snapshot(Vec::<u8>::new(), &snapshot(3)).unwrap();
        let mut expected = b"P6\n2 2\n255\n".to_vec();
        expected.extend(0..12);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_write_pgm() {
        let data = write_snapshot(Vec::<u8>::new(), &snapshot(1)).unwrap();
        assert_eq!(data, b"P5\n2 2\n255\n\x00\x01\x02\x03");
    }

    #[test]
    fn test_row_checks() {
        let mut writer = PpmWriter::new(Vec::<u8>::new(), 2, 1, 3).unwrap();
        assert!(writer.write_row(&[0; 5]).is_err());
        writer.write_row(&[0; 6]).unwrap();
        assert!(writer.write_row(&[0; 6]).is_err());
        writer.finish().unwrap();

        let writer = PpmWriter::new(Vec::<u8>::new(), 2, 1, 3).unwrap();
        assert!(writer.finish().is_err());
        assert!(PpmWriter::new(Vec::<u8>::new(), 2, 1, 4).is_err());
    }

    #[test]
    fn test_sink_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PpmSink::new(dir.path().join("frame-"));
        assert_eq!(sink.path(7), dir.path().join("frame-7.ppm"));
        sink.write_snapshot(snapshot(3)).unwrap();
        let data = std::fs::read(dir.path().join("frame-2.ppm")).unwrap();
        assert_eq!(data.len(), 11 + 12);
    }

    #[test]
    fn test_sink_reports_output_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PpmSink::new(dir.path().join("missing").join("out"));
        assert!(sink.write_snapshot(snapshot(3)).is_err());
    }
}
