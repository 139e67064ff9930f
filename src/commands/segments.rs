use super::read_track;
use ridetrack::RouteOverlay;
use std::error::Error;
use std::path::Path;

pub fn segments_command(path: &Path) -> Result<(), Box<dyn Error>> {
    let track = read_track(path)?;
    let overlay = RouteOverlay::from_samples(&track.samples).ok_or("Track has no points")?;

    println!("{}", serde_json::to_string_pretty(&overlay)?);
    Ok(())
}
