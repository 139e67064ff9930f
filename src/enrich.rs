use crate::{EnrichedSample, EnrichedTrack, EnrichmentError, RawSample, TrackStatistics};
use tracing::debug;

/// Derives per-sample speed and cumulative distance, then the track statistics.
///
/// A single in-order pass with one sample of lookback. Speed is zero whenever
/// either timestamp is missing or the elapsed time is not positive, so
/// duplicated or out-of-order timestamps never abort ingestion.
pub fn enrich(
    title: impl Into<String>,
    samples: Vec<RawSample>,
) -> Result<EnrichedTrack, EnrichmentError> {
    if samples.is_empty() {
        return Err(EnrichmentError::EmptyTrack);
    }

    let mut enriched: Vec<EnrichedSample> = Vec::with_capacity(samples.len());
    let mut elevation_gain_m = 0.0;
    let mut previous: Option<RawSample> = None;
    let mut cumulative_distance_m = 0.0;

    for sample in samples {
        let speed_m_s = match &previous {
            None => 0.0,
            Some(prev) => {
                let distance = prev.distance_to(&sample);
                cumulative_distance_m += distance;
                elevation_gain_m += elevation_rise(prev, &sample);
                segment_speed(prev, &sample, distance)
            }
        };

        enriched.push(EnrichedSample::from_raw(
            sample.clone(),
            speed_m_s,
            cumulative_distance_m,
        ));
        previous = Some(sample);
    }

    let (max_speed_m_s, avg_speed_m_s) = summarize_speeds(enriched.iter().map(|s| s.speed_m_s));
    let first = &enriched[0];
    let last = &enriched[enriched.len() - 1];

    let statistics = TrackStatistics {
        title: title.into(),
        started_at: first.time,
        finished_at: last.time,
        total_distance_m: last.cumulative_distance_m,
        elevation_gain_m,
        max_speed_m_s,
        avg_speed_m_s,
    };

    debug!(
        points = enriched.len(),
        distance_m = statistics.total_distance_m,
        gain_m = statistics.elevation_gain_m,
        "enriched track"
    );

    Ok(EnrichedTrack {
        statistics,
        samples: enriched,
    })
}

/// Seconds from `from` to `to`, when both carry a timestamp.
pub fn elapsed_seconds(from: &RawSample, to: &RawSample) -> Option<f64> {
    match (from.time, to.time) {
        (Some(start), Some(end)) => Some((end - start).as_seconds_f64()),
        _ => None,
    }
}

pub fn segment_speed(from: &RawSample, to: &RawSample, distance_m: f64) -> f64 {
    match elapsed_seconds(from, to) {
        Some(dt) if dt > 0.0 => distance_m / dt,
        _ => 0.0,
    }
}

// A missing elevation counts as 0 m, so a gap followed by a reading registers as a climb.
fn elevation_rise(from: &RawSample, to: &RawSample) -> f64 {
    let delta = to.elevation.unwrap_or(0.0) - from.elevation.unwrap_or(0.0);
    if delta > 0.0 { delta } else { 0.0 }
}

/// Max and mean over the strictly positive speeds only; `(0, 0)` when there are none.
pub fn summarize_speeds(speeds: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let mut max = 0.0f64;
    let mut sum = 0.0;
    let mut count = 0usize;

    for speed in speeds.into_iter().filter(|s| *s > 0.0) {
        max = max.max(speed);
        sum += speed;
        count += 1;
    }

    if count == 0 {
        (0.0, 0.0)
    } else {
        (max, sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    // 10 m along a meridian, in degrees of latitude
    const TEN_METERS_DEG: f64 = 0.0000899321606;

    fn at(seconds: i64) -> OffsetDateTime {
        time::macros::datetime!(2023-01-01 10:00:00 UTC) + Duration::seconds(seconds)
    }

    fn make_sample(lat: f64, lon: f64, seconds: i64) -> RawSample {
        RawSample::new(lat, lon).with_time(at(seconds))
    }

    #[test]
    fn test_enrich_empty_track() {
        assert_eq!(enrich("x", vec![]), Err(EnrichmentError::EmptyTrack));
    }

    #[test]
    fn test_enrich_single_sample() {
        let track = enrich("Solo", vec![make_sample(37.7749, -122.4194, 0)]).unwrap();
        assert_eq!(track.samples.len(), 1);
        assert_eq!(track.samples[0].speed_m_s, 0.0);
        assert_eq!(track.samples[0].cumulative_distance_m, 0.0);
        assert_eq!(track.statistics.total_distance_m, 0.0);
        assert_eq!(track.statistics.max_speed_m_s, 0.0);
        assert_eq!(track.statistics.avg_speed_m_s, 0.0);
        assert_eq!(track.statistics.started_at, track.statistics.finished_at);
    }

    /// Tests three points one second and ten meters apart.
    #[test]
    fn test_enrich_ten_meters_per_second() {
        let samples = vec![
            make_sample(0.0, 0.0, 0),
            make_sample(TEN_METERS_DEG, 0.0, 1),
            make_sample(2.0 * TEN_METERS_DEG, 0.0, 2),
        ];
        let track = enrich("Sprint", samples).unwrap();

        assert_eq!(track.samples[0].speed_m_s, 0.0);
        assert!((track.samples[1].speed_m_s - 10.0).abs() < 1e-3);
        assert!((track.samples[2].speed_m_s - 10.0).abs() < 1e-3);
        assert!((track.samples[1].cumulative_distance_m - 10.0).abs() < 1e-3);
        assert!((track.statistics.total_distance_m - 20.0).abs() < 1e-3);
        assert!((track.statistics.avg_speed_m_s - 10.0).abs() < 1e-3);
        assert!((track.statistics.max_speed_m_s - 10.0).abs() < 1e-3);
        assert_eq!(track.statistics.title, "Sprint");
        assert_eq!(track.statistics.started_at, Some(at(0)));
        assert_eq!(track.statistics.finished_at, Some(at(2)));
    }

    /// Tests the same ride end to end, starting from GPX text.
    #[test]
    fn test_enrich_parsed_gpx_ten_meters_per_second() {
        let gpx = format!(
            r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test"><trk><name>Sprint</name><trkseg>
  <trkpt lat="0" lon="0"><time>2023-01-01T10:00:00Z</time></trkpt>
  <trkpt lat="{one}" lon="0"><time>2023-01-01T10:00:01Z</time></trkpt>
  <trkpt lat="{two}" lon="0"><time>2023-01-01T10:00:02Z</time></trkpt>
</trkseg></trk></gpx>"#,
            one = TEN_METERS_DEG,
            two = 2.0 * TEN_METERS_DEG,
        );
        let track = crate::parse(gpx.as_bytes(), "sprint.gpx")
            .unwrap()
            .enrich()
            .unwrap();

        assert_eq!(track.samples.len(), 3);
        assert!((track.samples[1].speed_m_s - 10.0).abs() < 1e-3);
        assert!((track.samples[2].speed_m_s - 10.0).abs() < 1e-3);
        assert!((track.statistics.total_distance_m - 20.0).abs() < 1e-3);
        assert!((track.statistics.avg_speed_m_s - 10.0).abs() < 1e-3);
        assert_eq!(track.statistics.duration(), Some(Duration::seconds(2)));
    }

    #[test]
    fn test_enrich_preserves_length_and_order() {
        let samples: Vec<RawSample> = (0..50)
            .map(|i| make_sample(37.0 + (i % 7) as f64 * 0.001, -122.0 - i as f64 * 0.0005, i))
            .collect();
        let track = enrich("Zigzag", samples.clone()).unwrap();

        assert_eq!(track.samples.len(), samples.len());
        assert_eq!(track.samples[0].cumulative_distance_m, 0.0);
        for (raw, enriched) in samples.iter().zip(&track.samples) {
            assert_eq!(raw.lat, enriched.lat);
            assert_eq!(raw.time, enriched.time);
        }
        for pair in track.samples.windows(2) {
            assert!(pair[1].cumulative_distance_m >= pair[0].cumulative_distance_m);
            assert!(pair[1].speed_m_s >= 0.0);
        }
    }

    /// Tests that duplicated, reversed and missing timestamps give zero speed but still add distance.
    #[test]
    fn test_enrich_zero_speed_without_usable_time() {
        let samples = vec![
            make_sample(37.7749, -122.4194, 10),
            make_sample(37.7750, -122.4194, 10),
            make_sample(37.7751, -122.4194, 5),
            RawSample::new(37.7752, -122.4194),
            make_sample(37.7753, -122.4194, 20),
        ];
        let track = enrich("Glitchy", samples).unwrap();

        for sample in &track.samples {
            assert_eq!(sample.speed_m_s, 0.0);
        }
        assert!(track.samples[4].cumulative_distance_m > 40.0);
        assert_eq!(track.statistics.avg_speed_m_s, 0.0);
        assert_eq!(track.statistics.max_speed_m_s, 0.0);
    }

    #[test]
    fn test_summarize_speeds_ignores_zero_speeds() {
        let (max, avg) = summarize_speeds([0.0, 5.0, 0.0, 10.0]);
        assert_eq!(max, 10.0);
        assert_eq!(avg, 7.5);
        assert_eq!(summarize_speeds([0.0, 0.0]), (0.0, 0.0));
        assert_eq!(summarize_speeds(Vec::new()), (0.0, 0.0));
    }

    /// Tests the averaging rule end to end: a stationary segment does not dilute the mean.
    #[test]
    fn test_enrich_average_skips_stationary_segments() {
        let samples = vec![
            make_sample(0.0, 0.0, 0),
            make_sample(TEN_METERS_DEG, 0.0, 2),
            make_sample(TEN_METERS_DEG, 0.0, 3),
            make_sample(2.0 * TEN_METERS_DEG, 0.0, 4),
        ];
        let track = enrich("Stop and go", samples).unwrap();
        let speeds: Vec<f64> = track.samples.iter().map(|s| s.speed_m_s).collect();

        assert!((speeds[1] - 5.0).abs() < 1e-3);
        assert_eq!(speeds[2], 0.0);
        assert!((speeds[3] - 10.0).abs() < 1e-3);
        assert!((track.statistics.avg_speed_m_s - 7.5).abs() < 1e-3);
    }

    #[test]
    fn test_enrich_elevation_gain_counts_rises_only() {
        let samples: Vec<RawSample> = [100.0, 90.0, 95.0, 95.0, 80.0]
            .iter()
            .enumerate()
            .map(|(i, ele)| make_sample(0.0, i as f64 * 0.0001, i as i64).with_elevation(*ele))
            .collect();
        let track = enrich("Hills", samples).unwrap();
        assert_eq!(track.statistics.elevation_gain_m, 5.0);
    }

    /// Tests that an absent elevation reads as 0 m when computing the gain.
    #[test]
    fn test_enrich_missing_elevation_counts_as_sea_level() {
        let samples = vec![
            make_sample(0.0, 0.0, 0).with_elevation(50.0),
            make_sample(0.0, 0.0001, 1),
            make_sample(0.0, 0.0002, 2).with_elevation(40.0),
        ];
        let track = enrich("Gap", samples).unwrap();
        assert_eq!(track.statistics.elevation_gain_m, 40.0);
    }

    #[test]
    fn test_enrich_without_timestamps() {
        let samples = vec![RawSample::new(1.0, 1.0), RawSample::new(1.001, 1.0)];
        let track = enrich("Timeless", samples).unwrap();
        assert_eq!(track.statistics.started_at, None);
        assert_eq!(track.statistics.finished_at, None);
        assert_eq!(track.statistics.duration(), None);
        assert!(track.statistics.total_distance_m > 100.0);
    }

    #[test]
    fn test_segment_speed_very_small_time_diff() {
        let p1 = RawSample::new(37.7749, -122.4194).with_time(at(0));
        let p2 = RawSample::new(37.7750, -122.4195).with_time(at(0) + Duration::milliseconds(100));

        let speed = segment_speed(&p1, &p2, p1.distance_to(&p2));
        assert!(speed > 0.0, "Speed should be positive for small time diff");
        assert!(speed.is_finite(), "Speed should be finite");
    }

    #[test]
    fn test_segment_speed_simultaneous_timestamps() {
        let p1 = make_sample(37.7749, -122.4194, 0);
        let p2 = make_sample(37.7849, -122.4094, 0);
        assert_eq!(segment_speed(&p1, &p2, p1.distance_to(&p2)), 0.0);
    }

    #[test]
    fn test_enrich_propagates_nan_coordinates() {
        let samples = vec![
            make_sample(1.0, 1.0, 0),
            make_sample(f64::NAN, 1.0, 1),
        ];
        let track = enrich("Garbage", samples).unwrap();
        assert!(track.samples[1].cumulative_distance_m.is_nan());
        assert!(track.statistics.total_distance_m.is_nan());
    }
}
