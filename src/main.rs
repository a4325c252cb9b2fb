use clap::{error::ErrorKind, CommandFactory, Parser};
use jpeg_split::{ppm::PpmSink, ExtractOptions, Extractor, SplitError, Summary};
use std::{path::PathBuf, process::ExitCode};
use tracing::Level;

/// Write every scan of a progressive JPEG as its own PPM image.
///
/// A progressive JPEG codes its picture in several scans, each one refining
/// the previous ones. After every scan the picture decoded so far is written
/// to `<BASENAME><scan>.ppm`, scans counting from 1, so the files show the
/// image building up the way a slow download would. A baseline JPEG yields a
/// single file.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// The JPEG file to read.
    #[clap()]
    input: PathBuf,

    /// Prefix of the output files.
    #[clap()]
    basename: PathBuf,

    /// First scan to write out; earlier scans are decoded but not written.
    #[clap(long, default_value_t = 1)]
    first_scan: u32,

    /// Log decoder progress to standard error.
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
            print!("{}", Args::command().render_long_help());
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .init();

    match split(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jpeg-split: {e}");
            ExitCode::FAILURE
        }
    }
}

fn split(args: &Args) -> Result<Summary, SplitError> {
    let options = ExtractOptions {
        first_scan: args.first_scan,
    };
    let mut extractor = Extractor::open(&args.input, options)?;
    let info = extractor.start()?;
    if extractor.multi_scan() {
        println!("JPEG is multi-scan");
    } else {
        println!("JPEG is single-scan");
    }
    println!("Outputting {}x{}", info.width, info.height);

    let summary = extractor.run(&mut PpmSink::new(&args.basename))?;
    if summary.warnings != 0 {
        println!("decoder reported {} warnings", summary.warnings);
    }
    Ok(summary)
}
