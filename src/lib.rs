use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub mod autoplay;
pub mod enrich;
pub mod error;
pub mod format;
pub mod gpxxml;
pub mod ingest;
pub mod playback;
pub mod speed_band;
pub mod tcxxml;

pub use crate::autoplay::Player;
pub use crate::enrich::enrich;
pub use crate::error::{EnrichmentError, IngestError, ParseError, PlaybackError};
pub use crate::format::{TrackFormat, parse};
pub use crate::ingest::{TrackStore, ingest};
pub use crate::playback::{Playback, PlaybackObserver, TransportReadout};
pub use crate::speed_band::{Band, ColoredSegment, RouteOverlay, classify};

/// Mean Earth radius in meters used by every distance computation in the crate.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Title used when a file carries no track name (GPX) or sport (TCX).
pub const DEFAULT_TITLE: &str = "Untitled Ride";

/// One position read from a track file, before any derived kinematics.
///
/// Coordinates are not range-checked: a garbled `lat`/`lon` in the source file
/// comes through as `NaN` and propagates into every derived value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub time: Option<OffsetDateTime>,
}

impl RawSample {
    pub fn new(lat: f64, lon: f64) -> Self {
        RawSample {
            lat,
            lon,
            elevation: None,
            time: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn distance_to(&self, other: &RawSample) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }
}

/// A [`RawSample`] plus the kinematics derived from its predecessor.
///
/// Only the enrichment engine builds these. The first sample of a sequence
/// always has zero speed and zero cumulative distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSample {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub time: Option<OffsetDateTime>,
    pub speed_m_s: f64,
    pub cumulative_distance_m: f64,
}

impl EnrichedSample {
    pub fn from_raw(raw: RawSample, speed_m_s: f64, cumulative_distance_m: f64) -> Self {
        EnrichedSample {
            lat: raw.lat,
            lon: raw.lon,
            elevation: raw.elevation,
            time: raw.time,
            speed_m_s,
            cumulative_distance_m,
        }
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_m_s * 3.6
    }
}

/// Summary computed once at ingestion time and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStatistics {
    pub title: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    pub total_distance_m: f64,
    pub elevation_gain_m: f64,
    pub max_speed_m_s: f64,
    pub avg_speed_m_s: f64,
}

impl TrackStatistics {
    /// Elapsed time between first and last sample, `None` when either end lacks a timestamp.
    pub fn duration(&self) -> Option<time::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Output of the format parser: a title and the raw samples in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrack {
    pub title: String,
    pub samples: Vec<RawSample>,
}

impl ParsedTrack {
    pub fn enrich(self) -> Result<EnrichedTrack, EnrichmentError> {
        enrich(self.title, self.samples)
    }
}

/// What gets handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrack {
    pub statistics: TrackStatistics,
    pub samples: Vec<EnrichedSample>,
}

/// Great circle distance in meters between two coordinates, by the haversine formula.
///
/// Uses a spherical Earth of radius [`EARTH_RADIUS_M`]. A flat-earth shortcut
/// drifts visibly once thousands of segments are summed, the haversine form
/// does not.
///
/// Identical coordinates give `0.0`; `NaN` inputs give `NaN`.
///
/// References:
/// - R.W. Sinnott, "Virtues of the Haversine", Sky and Telescope, vol. 68, no. 2, 1984, p. 159
/// - https://en.wikipedia.org/wiki/Haversine_formula
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let half_dphi = (lat2 - lat1).to_radians() / 2.0;
    let half_dlambda = (lon2 - lon1).to_radians() / 2.0;

    // a = sin²(Δφ/2) + cos φ1 ⋅ cos φ2 ⋅ sin²(Δλ/2)
    let a = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);

    // c = 2 ⋅ atan2(√a, √(1−a))
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
