use thiserror::Error;

/// Rejection of an uploaded track file. Nothing is persisted when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unsupported file format {0:?}, expected a .gpx or .tcx file")]
    UnsupportedFormat(String),
    #[error("No track data found in GPX file")]
    NoTrackData,
    #[error("No activity data found in TCX file")]
    NoActivityData,
    #[error("No trackpoints found in TCX file")]
    NoTrackpoints,
    #[error("Malformed XML at position {position}: {message}")]
    Malformed { position: u64, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("Cannot enrich a track with no samples")]
    EmptyTrack,
}

/// Guard failures of the playback controller. A rejected call leaves the state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Index {index} is out of range for a sequence of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Playback rate must be a positive finite number, got {0}")]
    InvalidRate(f64),
    #[error("Cannot play back an empty sequence")]
    EmptySequence,
}

#[derive(Error, Debug)]
pub enum IngestError<E> {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Enrichment error: {0}")]
    Enrich(#[from] EnrichmentError),
    #[error("Store error: {0}")]
    Store(E),
}
