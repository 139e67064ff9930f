use ridetrack::{EnrichedTrack, TrackFormat};
use std::error::Error;
use std::path::Path;

pub mod ingest;
pub mod play;
pub mod segments;
pub mod stats;

pub fn read_track(path: &Path) -> Result<EnrichedTrack, Box<dyn Error>> {
    let format = TrackFormat::from_path(path)?;
    let input = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), %format, bytes = input.len(), "reading track file");

    Ok(format.parse(&input)?.enrich()?)
}
