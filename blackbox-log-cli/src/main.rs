//! Blackbox Log CLI
//!
//! Command-line frontend for the blackbox-log-decoder library. It adds the
//! pieces the library deliberately leaves out:
//! - CSV export of main frame data
//! - GPX track export of GPS frames
//! - Splitting merged logs into per-session files

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod csv_export;
mod gpx_export;
mod split;

/// Decode, export and split Cleanflight/Betaflight blackbox logs
#[derive(Parser, Debug)]
#[command(name = "blackbox-log")]
#[command(about = "Decode, export and split Cleanflight/Betaflight blackbox logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export main (I/P) frames as CSV
    Csv(ExportArgs),
    /// Export GPS frames as a GPX track
    Gpx(ExportArgs),
    /// Split a merged log into one file per session
    Split(SplitArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Path to a blackbox log file
    path: PathBuf,

    /// 1-based session index (gpx accepts 0 for all sessions)
    #[arg(short = 'i', long = "index", default_value_t = 1)]
    index: usize,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Tolerate a missing or damaged header
    #[arg(short = 'a', long)]
    allow_invalid_header: bool,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// Path to a merged blackbox log file
    path: PathBuf,

    /// 1-based session index to extract (default: all sessions)
    #[arg(short = 'i', long = "index", default_value_t = 0)]
    index: usize,

    /// Output directory (default: next to the input file)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Tolerate a missing or damaged header
    #[arg(short = 'a', long)]
    allow_invalid_header: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("blackbox-log v{}", env!("CARGO_PKG_VERSION"));
    log::info!("using decoder library v{}", blackbox_log_decoder::VERSION);

    match cli.command {
        Command::Csv(args) => csv_export::run(&args.path, args.index, args.output.as_deref(), args.allow_invalid_header),
        Command::Gpx(args) => gpx_export::run(&args.path, args.index, args.output.as_deref(), args.allow_invalid_header),
        Command::Split(args) => split::run(&args.path, args.index, args.output.as_deref(), args.allow_invalid_header),
    }
}

/// Initialize logging based on the repeatable -v flag
fn init_logging(verbose: u8) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
