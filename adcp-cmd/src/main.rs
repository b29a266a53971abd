mod decode;
mod stream;
mod summary;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stream::Selection;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode ensembles from a recorded ADCP stream.
    ///
    /// The input is read in chunks and fed to the decoders exactly as a live stream would
    /// be. With --format auto every supported format is tried at once and the first to
    /// dominate the stream wins.
    Decode {
        /// Input stream file.
        input: PathBuf,

        /// Stream format.
        #[arg(short, long, default_value = "auto")]
        format: Selection,

        /// Number of bytes handed to the decoders at a time.
        #[arg(short, long, default_value_t = 4096, value_name = "bytes")]
        chunk_size: usize,

        /// File of NMEA sentences to merge into the first decoded ensemble.
        ///
        /// Only sentences with a valid checksum are used.
        #[arg(short, long, value_name = "path")]
        nmea: Option<PathBuf>,

        /// Write one JSON object per ensemble instead of a line of text.
        #[arg(long, action)]
        json: bool,
    },
    /// Show per-format decode counts for a recorded ADCP stream.
    Summary {
        /// Input stream file.
        input: PathBuf,

        /// Number of bytes handed to the decoders at a time.
        #[arg(short, long, default_value_t = 4096, value_name = "bytes")]
        chunk_size: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: summary::Output,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("ADCP_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Decode {
            input,
            format,
            chunk_size,
            nmea,
            json,
        } => decode::decode(input, *format, *chunk_size, nmea.as_deref(), *json),
        Commands::Summary {
            input,
            chunk_size,
            format,
        } => summary::summary(input, *chunk_size, format),
    }
}
