use super::read_track;
use std::error::Error;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn stats_command(path: &Path) -> Result<(), Box<dyn Error>> {
    let track = read_track(path)?;
    let stats = &track.statistics;

    println!("Title:          {}", stats.title);
    println!("Points:         {}", track.samples.len());
    println!("Started:        {}", timestamp(stats.started_at)?);
    println!("Finished:       {}", timestamp(stats.finished_at)?);
    match stats.duration() {
        Some(duration) => println!("Duration:       {}s", duration.whole_seconds()),
        None => println!("Duration:       unknown"),
    }
    println!("Distance:       {:.2} km", stats.total_distance_m / 1000.0);
    println!("Elevation gain: {:.0} m", stats.elevation_gain_m);
    println!("Max speed:      {:.1} km/h", stats.max_speed_m_s * 3.6);
    println!("Avg speed:      {:.1} km/h", stats.avg_speed_m_s * 3.6);

    Ok(())
}

fn timestamp(time: Option<OffsetDateTime>) -> Result<String, Box<dyn Error>> {
    match time {
        Some(time) => Ok(time.format(&Rfc3339)?),
        None => Ok("unknown".to_string()),
    }
}
