use super::read_track;
use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

/// Writes the persistence handoff (statistics plus all enriched points) to stdout.
pub fn ingest_command(path: &Path, compact: bool) -> Result<(), Box<dyn Error>> {
    let track = read_track(path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if compact {
        serde_json::to_writer(&mut out, &track)?;
    } else {
        serde_json::to_writer_pretty(&mut out, &track)?;
    }
    writeln!(out)?;

    Ok(())
}
