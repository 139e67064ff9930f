use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use std::error::Error;
use std::path::PathBuf;

mod commands;

use commands::play::PlayArgs;

#[derive(Parser)]
#[command(
    name = "ridetrack",
    version,
    about = "A CLI tool for enriching and replaying GPX/TCX ride tracks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    verbose: Verbosity,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the statistics of a .gpx or .tcx file")]
    Stats {
        /// Track file, format chosen by extension
        file: PathBuf,
    },
    #[command(about = "Emit statistics and every enriched point as JSON")]
    Ingest {
        file: PathBuf,
        /// Single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    #[command(about = "Emit the speed-colored route segments as JSON")]
    Segments { file: PathBuf },
    #[command(about = "Replay the track on the autoplay clock")]
    Play(PlayArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbose.tracing_level_filter())
        .with_writer(std::io::stderr)
        .compact()
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Stats { file } => commands::stats::stats_command(&file),
        Commands::Ingest { file, compact } => commands::ingest::ingest_command(&file, compact),
        Commands::Segments { file } => commands::segments::segments_command(&file),
        Commands::Play(args) => commands::play::play_command(&args),
    }
}
