use crate::{EnrichedSample, EnrichedTrack, IngestError, parse};
use tracing::info;

/// Durable storage for enriched tracks, provided by the embedding application.
///
/// Implementations must hand back samples in the order they were saved.
pub trait TrackStore {
    type Id;
    type Error;

    fn save(&mut self, track: &EnrichedTrack) -> Result<Self::Id, Self::Error>;

    fn load(&self, id: &Self::Id) -> Result<Vec<EnrichedSample>, Self::Error>;
}

/// Parses, enriches and stores one uploaded file.
///
/// All or nothing: the store is only called once parsing and enrichment have
/// both succeeded, and it receives the complete sample set in one call.
pub fn ingest<S: TrackStore>(
    input: &[u8],
    file_name: &str,
    store: &mut S,
) -> Result<S::Id, IngestError<S::Error>> {
    let track = parse(input, file_name)?.enrich()?;

    info!(
        file = file_name,
        title = %track.statistics.title,
        points = track.samples.len(),
        "ingesting track"
    );

    store.save(&track).map_err(IngestError::Store)
}
