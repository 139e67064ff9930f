use crate::EnrichedSample;
use serde::Serialize;

/// Speed bands used to color the drawn route, slowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Moderate,
    Elevated,
    High,
    VeryHigh,
}

impl Band {
    pub const ALL: [Band; 5] = [
        Band::Low,
        Band::Moderate,
        Band::Elevated,
        Band::High,
        Band::VeryHigh,
    ];

    /// Hex color the rendering surface draws this band with.
    pub fn color(self) -> &'static str {
        match self {
            Band::Low => "#3b82f6",
            Band::Moderate => "#10b981",
            Band::Elevated => "#fbbf24",
            Band::High => "#f59e0b",
            Band::VeryHigh => "#ef4444",
        }
    }

    /// Legend text for the band.
    pub fn label(self) -> &'static str {
        match self {
            Band::Low => "< 10 km/h",
            Band::Moderate => "10-20 km/h",
            Band::Elevated => "20-30 km/h",
            Band::High => "30-40 km/h",
            Band::VeryHigh => "> 40 km/h",
        }
    }
}

/// Classifies a speed in m/s.
///
/// Each threshold belongs to the band above it. `NaN` and negative speeds
/// classify as [`Band::Low`].
pub fn classify(speed_m_s: f64) -> Band {
    classify_kmh(speed_m_s * 3.6)
}

pub fn classify_kmh(speed_kmh: f64) -> Band {
    if speed_kmh >= 40.0 {
        Band::VeryHigh
    } else if speed_kmh >= 30.0 {
        Band::High
    } else if speed_kmh >= 20.0 {
        Band::Elevated
    } else if speed_kmh >= 10.0 {
        Band::Moderate
    } else {
        Band::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl From<&EnrichedSample> for LatLon {
    fn from(sample: &EnrichedSample) -> Self {
        LatLon {
            lat: sample.lat,
            lon: sample.lon,
        }
    }
}

/// One drawable piece of the route between two consecutive samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColoredSegment {
    pub start: LatLon,
    pub end: LatLon,
    /// Mean of the two endpoint speeds, in m/s.
    pub speed_m_s: f64,
    pub band: Band,
    pub color: &'static str,
}

impl ColoredSegment {
    pub fn between(a: &EnrichedSample, b: &EnrichedSample) -> Self {
        let speed_m_s = (a.speed_m_s + b.speed_m_s) / 2.0;
        let band = classify(speed_m_s);
        ColoredSegment {
            start: a.into(),
            end: b.into(),
            speed_m_s,
            band,
            color: band.color(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: LatLon,
    pub max: LatLon,
}

/// Everything the map surface needs to draw a loaded track once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOverlay {
    pub segments: Vec<ColoredSegment>,
    pub start: LatLon,
    pub finish: LatLon,
    pub bounds: Bounds,
}

impl RouteOverlay {
    /// `None` for an empty sequence. A single sample yields no segments.
    pub fn from_samples(samples: &[EnrichedSample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let segments = samples
            .windows(2)
            .map(|pair| ColoredSegment::between(&pair[0], &pair[1]))
            .collect();

        let mut bounds = Bounds {
            min: first.into(),
            max: first.into(),
        };
        for sample in &samples[1..] {
            bounds.min.lat = bounds.min.lat.min(sample.lat);
            bounds.min.lon = bounds.min.lon.min(sample.lon);
            bounds.max.lat = bounds.max.lat.max(sample.lat);
            bounds.max.lon = bounds.max.lon.max(sample.lon);
        }

        Some(RouteOverlay {
            segments,
            start: first.into(),
            finish: last.into(),
            bounds,
        })
    }
}
