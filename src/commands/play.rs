use super::read_track;
use clap::Args;
use ridetrack::{EnrichedSample, PlaybackObserver, Player, TransportReadout};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::debug;

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Input GPX or TCX file
    pub file: PathBuf,

    /// Playback rate multiplier; 1.0 advances one point every 100 ms
    #[arg(long, default_value_t = 1.0)]
    pub rate: f64,

    /// Number of timer ticks to play before stopping
    #[arg(long, default_value_t = 10)]
    pub ticks: usize,

    /// Point index to start from
    #[arg(long, default_value_t = 0)]
    pub start: usize,
}

struct CursorFeed(UnboundedSender<usize>);

impl PlaybackObserver for CursorFeed {
    fn cursor_changed(&mut self, cursor: usize, _sample: &EnrichedSample) {
        // The receiver only goes away once playback is over.
        let _ = self.0.send(cursor);
    }
}

/// Plays the track on a timer and prints one transport line per advanced point.
pub fn play_command(args: &PlayArgs) -> Result<(), Box<dyn Error>> {
    let track = read_track(&args.file)?;
    let samples: Arc<[EnrichedSample]> = track.samples.into();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let mut player = Player::with_samples(Arc::clone(&samples), runtime.handle().clone())?;
    player.set_rate(args.rate)?;
    player.seek(args.start)?;
    println!("{}", player.readout());

    let (tx, mut rx) = unbounded_channel();
    player.subscribe(Box::new(CursorFeed(tx)));

    debug!(rate = args.rate, ticks = args.ticks, "starting playback");
    player.play();

    runtime.block_on(async {
        for _ in 0..args.ticks {
            let Some(cursor) = rx.recv().await else {
                break;
            };
            if let Some(readout) = TransportReadout::at(&samples, cursor) {
                println!("{readout}");
            }
        }
    });

    player.pause();
    Ok(())
}
