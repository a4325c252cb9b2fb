//! The scan loop: consume a scan, render it, hand it on, repeat.

use crate::{
    error::SplitError,
    handle::{DecoderHandle, ImageInfo},
    ppm::PpmSink,
    scanner::{advance, ScanEvent},
    snapshot::{materialize, SnapshotSink},
    Decoder,
};
use std::{
    fs::File,
    io::{self, ErrorKind},
    path::Path,
};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// First scan to write out. Scans are numbered from 1 in file order;
    /// earlier scans are still decoded but no snapshot is made of them.
    pub first_scan: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions { first_scan: 1 }
    }
}

/// Where an [`Extractor`] is in its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unopened,
    HeaderParsed,
    BufferedModeEnabled,
    /// Reading the data of the scan, up to the start of the next one.
    ConsumingScan(u32),
    /// Rendering `scan`; `next` is the scan whose header was just read.
    MaterializingSnapshot { scan: u32, next: Option<u32> },
    Finished,
    Errored,
}

/// What an extraction produced.
#[derive(Debug)]
pub struct Summary {
    pub info: ImageInfo,
    pub multi_scan: bool,
    /// Scans whose snapshots were written, in order.
    pub written: Vec<u32>,
    /// Snapshots the sink failed to write.
    pub failed: Vec<SplitError>,
    /// Recoverable problems the decoder met.
    pub warnings: u32,
}

/// Drives a decoder scan by scan and sends one snapshot per scan to a sink.
///
/// The extractor owns the decoder; it is released when the extractor is
/// dropped, whether the extraction finished or failed.
pub struct Extractor<D: DecoderHandle> {
    decoder: D,
    options: ExtractOptions,
    state: State,
    info: Option<ImageInfo>,
}

impl Extractor<Decoder<File>> {
    /// Open a JPEG file for extraction.
    pub fn open(path: impl AsRef<Path>, options: ExtractOptions) -> Result<Self, SplitError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SplitError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "opened input");
        Ok(Extractor::new(Decoder::new(file), options))
    }
}

impl<D: DecoderHandle> Extractor<D> {
    pub fn new(decoder: D, options: ExtractOptions) -> Self {
        Extractor {
            decoder,
            options,
            state: State::Unopened,
            info: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The input codes its image in more than one scan.
    pub fn multi_scan(&self) -> bool {
        self.decoder.has_multiple_scans()
    }

    /// Parse the header and put the decoder in buffered-image mode.
    ///
    /// Called by [`Extractor::run`] if needed; calling it first gives access
    /// to the image geometry before any scan is read.
    pub fn start(&mut self) -> Result<ImageInfo, SplitError> {
        if let Some(info) = self.info {
            return Ok(info);
        }
        if self.state != State::Unopened {
            return Err(self.fail(protocol("extraction already ended")));
        }
        let info = (self.decoder.read_header()).map_err(|e| self.fail(SplitError::Header(e)))?;
        self.state = State::HeaderParsed;

        self.decoder.set_buffered_image(true);
        (self.decoder.start_decompress()).map_err(|e| self.fail(SplitError::Header(e)))?;
        self.state = State::BufferedModeEnabled;
        self.info = Some(info);
        debug!(
            width = info.width,
            height = info.height,
            components = info.components,
            multi_scan = self.multi_scan(),
            "started decompression"
        );
        Ok(info)
    }

    /// Write a snapshot of every scan to `sink`.
    ///
    /// A snapshot the sink cannot take is recorded in [`Summary::failed`] and
    /// the next scan is read. Any other error ends the extraction; snapshots
    /// already written stay written.
    pub fn run<S: SnapshotSink + ?Sized>(&mut self, sink: &mut S) -> Result<Summary, SplitError> {
        let image = self.start()?;
        if self.state != State::BufferedModeEnabled {
            return Err(self.fail(protocol("extraction already ran")));
        }
        let multi_scan = self.multi_scan();
        let mut written = vec![];
        let mut failed = vec![];
        self.state = State::ConsumingScan(self.decoder.input_scan_number());

        loop {
            match self.state {
                State::ConsumingScan(scan) => {
                    (self.decoder.start_output(scan)).map_err(|e| self.fail(SplitError::Decode(e)))?;
                    let event = advance(&mut self.decoder).map_err(|e| self.fail(SplitError::Decode(e)))?;
                    let next = match event {
                        ScanEvent::ScanStarted(n) if n <= scan => {
                            return Err(self.fail(protocol(format!(
                                "scan {n} started after scan {scan}"
                            ))));
                        }
                        ScanEvent::ScanStarted(n) => Some(n),
                        ScanEvent::EndOfImage => None,
                    };
                    self.state = State::MaterializingSnapshot { scan, next };
                }
                State::MaterializingSnapshot { scan, next } => {
                    if scan >= self.options.first_scan {
                        let snapshot = materialize(&mut self.decoder, &image, scan)
                            .map_err(|e| self.fail(SplitError::Decode(e)))?;
                        match sink.write_snapshot(snapshot) {
                            Ok(()) => {
                                info!(scan, "wrote snapshot");
                                written.push(scan);
                            }
                            Err(source) => {
                                let err = SplitError::Output { scan, source };
                                error!("{err}");
                                failed.push(err);
                            }
                        }
                    } else {
                        debug!(scan, first_scan = self.options.first_scan, "skipped scan");
                    }
                    (self.decoder.finish_output()).map_err(|e| self.fail(SplitError::Decode(e)))?;
                    self.state = match next {
                        Some(n) => State::ConsumingScan(n),
                        None => State::Finished,
                    };
                }
                State::Finished => {
                    (self.decoder.finish_decompress())
                        .map_err(|e| self.fail(SplitError::Decode(e)))?;
                    let warnings = self.decoder.warning_count();
                    debug!(scans = ?written, warnings, "finished");
                    return Ok(Summary {
                        info: image,
                        multi_scan,
                        written,
                        failed,
                        warnings,
                    });
                }
                state => return Err(self.fail(protocol(format!("unexpected state {state:?}")))),
            }
        }
    }

    fn fail(&mut self, err: SplitError) -> SplitError {
        self.state = State::Errored;
        err
    }
}

fn protocol(msg: impl Into<String>) -> SplitError {
    SplitError::Decode(io::Error::new(ErrorKind::InvalidData, msg.into()))
}

/// Write every scan of the JPEG file at `input` to `<base><scan>.ppm`.
pub fn split_file(
    input: impl AsRef<Path>,
    base: impl AsRef<Path>,
    options: ExtractOptions,
) -> Result<Summary, SplitError> {
    let mut extractor = Extractor::open(input, options)?;
    extractor.run(&mut PpmSink::new(base))
}
