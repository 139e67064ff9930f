use crate::format::{attribute, malformed, parse_time, push_reference, push_text, title_or_default};
use crate::{ParseError, ParsedTrack, RawSample};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Latitude,
    Longitude,
    Altitude,
    Time,
}

#[derive(Default)]
struct Trackpoint {
    lat: Option<f64>,
    lon: Option<f64>,
    has_position: bool,
    elevation: Option<f64>,
    time: Option<time::OffsetDateTime>,
}

impl Trackpoint {
    fn into_sample(self) -> Option<RawSample> {
        if !self.has_position {
            return None;
        }
        Some(RawSample {
            lat: self.lat.unwrap_or(f64::NAN),
            lon: self.lon.unwrap_or(f64::NAN),
            elevation: self.elevation,
            time: self.time,
        })
    }
}

/// Walks `Activities/Activity[0]/Lap*/Track*/Trackpoint*` of a TCX document.
///
/// Laps and tracks are concatenated in document order. Trackpoints without a
/// `<Position>` are dropped; later activities are ignored.
pub fn parse_tcx(input: &[u8]) -> Result<ParsedTrack, ParseError> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut in_activities = false;
    let mut activities_seen = 0usize;
    let mut in_first_activity = false;
    let mut sport: Option<String> = None;
    let mut in_track = false;
    let mut in_position = false;

    let mut current: Option<Trackpoint> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    let mut samples = Vec::new();
    let mut dropped = 0usize;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => return Err(malformed(reader.buffer_position() as u64, e)),
            Ok(Event::Eof) => break,
            Ok(event) => event.into_owned(),
        };

        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"Activities" => in_activities = true,
                b"Activity" if in_activities => {
                    activities_seen += 1;
                    in_first_activity = activities_seen == 1;
                    if in_first_activity {
                        sport = attribute(e, b"Sport");
                    }
                }
                b"Track" if in_first_activity => in_track = true,
                b"Trackpoint" if in_track => current = Some(Trackpoint::default()),
                name if current.is_some() => {
                    field = match name {
                        b"Position" => {
                            in_position = true;
                            if let Some(point) = current.as_mut() {
                                point.has_position = true;
                            }
                            None
                        }
                        b"LatitudeDegrees" if in_position => Some(Field::Latitude),
                        b"LongitudeDegrees" if in_position => Some(Field::Longitude),
                        b"AltitudeMeters" => Some(Field::Altitude),
                        b"Time" => Some(Field::Time),
                        _ => None,
                    };
                    text.clear();
                }
                _ => {}
            },

            Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"Activity" && in_activities {
                    activities_seen += 1;
                }
            }

            Event::End(ref e) => match e.local_name().as_ref() {
                b"Activities" => in_activities = false,
                b"Activity" => in_first_activity = false,
                b"Track" => in_track = false,
                b"Trackpoint" => {
                    if let Some(point) = current.take() {
                        match point.into_sample() {
                            Some(sample) => samples.push(sample),
                            None => dropped += 1,
                        }
                    }
                    in_position = false;
                    field = None;
                }
                b"Position" => in_position = false,
                _ => {
                    if let (Some(point), Some(kind)) = (current.as_mut(), field.take()) {
                        match kind {
                            Field::Latitude => point.lat = text.trim().parse().ok(),
                            Field::Longitude => point.lon = text.trim().parse().ok(),
                            Field::Altitude => point.elevation = text.trim().parse().ok(),
                            Field::Time => point.time = parse_time(&text),
                        }
                    }
                }
            },

            Event::Text(ref e) => {
                if field.is_some() {
                    push_text(&mut text, e);
                }
            }

            Event::GeneralRef(ref e) => {
                if field.is_some() {
                    push_reference(&mut text, e);
                }
            }

            _ => {}
        }

        buf.clear();
    }

    if activities_seen == 0 {
        return Err(ParseError::NoActivityData);
    }
    if activities_seen > 1 {
        debug!(ignored = activities_seen - 1, "TCX file has extra activities, only the first is read");
    }
    if dropped > 0 {
        debug!(dropped, "dropped TCX trackpoints without a position");
    }
    if samples.is_empty() {
        return Err(ParseError::NoTrackpoints);
    }

    debug!(points = samples.len(), "parsed TCX activity");

    Ok(ParsedTrack {
        title: title_or_default(sport.as_deref()),
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Biking">
      <Id>2024-01-01T00:00:00Z</Id>
      <Lap StartTime="2024-01-01T00:00:00Z">
        <TotalTimeSeconds>60</TotalTimeSeconds>
        <Track>
          <Trackpoint>
            <Time>2024-01-01T00:00:00Z</Time>
            <Position>
              <LatitudeDegrees>45.5</LatitudeDegrees>
              <LongitudeDegrees>-122.5</LongitudeDegrees>
            </Position>
            <AltitudeMeters>100</AltitudeMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-01-01T00:00:30Z</Time>
            <HeartRateBpm><Value>120</Value></HeartRateBpm>
          </Trackpoint>
        </Track>
      </Lap>
      <Lap StartTime="2024-01-01T00:01:00Z">
        <Track>
          <Trackpoint>
            <Time>2024-01-01T00:01:00Z</Time>
            <Position>
              <LatitudeDegrees>45.51</LatitudeDegrees>
              <LongitudeDegrees>-122.51</LongitudeDegrees>
            </Position>
            <AltitudeMeters>110</AltitudeMeters>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    #[test]
    fn test_parse_tcx_walks_all_laps() {
        let track = parse_tcx(SAMPLE_TCX.as_bytes()).unwrap();
        assert_eq!(track.title, "Biking");
        assert_eq!(track.samples.len(), 2);

        assert_eq!(track.samples[0].lat, 45.5);
        assert_eq!(track.samples[0].lon, -122.5);
        assert_eq!(track.samples[0].elevation, Some(100.0));
        assert_eq!(track.samples[1].lat, 45.51);
        assert_eq!(track.samples[1].elevation, Some(110.0));
        assert_eq!(
            track.samples[1].time,
            Some(time::macros::datetime!(2024-01-01 00:01:00 UTC))
        );
    }

    /// Tests that a lone lap with a lone trackpoint is read the same as the list shape.
    #[test]
    fn test_parse_tcx_single_lap_single_point() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity Sport="Running"><Lap><Track>
  <Trackpoint><Position><LatitudeDegrees>1.5</LatitudeDegrees><LongitudeDegrees>2.5</LongitudeDegrees></Position></Trackpoint>
</Track></Lap></Activity></Activities></TrainingCenterDatabase>"#;
        let track = parse_tcx(tcx.as_bytes()).unwrap();
        assert_eq!(track.title, "Running");
        assert_eq!(track.samples, vec![RawSample::new(1.5, 2.5)]);
    }

    #[test]
    fn test_parse_tcx_without_positions_fails() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity Sport="Biking"><Lap><Track>
  <Trackpoint><Time>2024-01-01T00:00:00Z</Time></Trackpoint>
  <Trackpoint><Time>2024-01-01T00:00:01Z</Time><Position/></Trackpoint>
</Track></Lap></Activity></Activities></TrainingCenterDatabase>"#;
        assert_eq!(parse_tcx(tcx.as_bytes()), Err(ParseError::NoTrackpoints));
    }

    #[test]
    fn test_parse_tcx_activity_without_laps_fails() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity Sport="Biking"/></Activities></TrainingCenterDatabase>"#;
        assert_eq!(parse_tcx(tcx.as_bytes()), Err(ParseError::NoTrackpoints));
    }

    #[test]
    fn test_parse_tcx_without_activities_fails() {
        let courses_only = r#"<TrainingCenterDatabase><Courses><Course><Name>Loop</Name><Track>
  <Trackpoint><Position><LatitudeDegrees>1</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position></Trackpoint>
</Track></Course></Courses></TrainingCenterDatabase>"#;
        assert_eq!(
            parse_tcx(courses_only.as_bytes()),
            Err(ParseError::NoActivityData)
        );

        let empty = r#"<TrainingCenterDatabase><Activities/></TrainingCenterDatabase>"#;
        assert_eq!(parse_tcx(empty.as_bytes()), Err(ParseError::NoActivityData));

        assert_eq!(parse_tcx(b""), Err(ParseError::NoActivityData));
    }

    #[test]
    fn test_parse_tcx_reads_first_activity_only() {
        let tcx = r#"<TrainingCenterDatabase><Activities>
  <Activity Sport="Biking"><Lap><Track>
    <Trackpoint><Position><LatitudeDegrees>1</LatitudeDegrees><LongitudeDegrees>1</LongitudeDegrees></Position></Trackpoint>
  </Track></Lap></Activity>
  <Activity Sport="Running"><Lap><Track>
    <Trackpoint><Position><LatitudeDegrees>2</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position></Trackpoint>
  </Track></Lap></Activity>
</Activities></TrainingCenterDatabase>"#;
        let track = parse_tcx(tcx.as_bytes()).unwrap();
        assert_eq!(track.title, "Biking");
        assert_eq!(track.samples.len(), 1);
        assert_eq!(track.samples[0].lat, 1.0);
    }

    #[test]
    fn test_parse_tcx_sport_entities() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity Sport="Bik&amp;ing"><Lap><Track>
  <Trackpoint><Time>2024-01-01T00:00:00</Time><Position><LatitudeDegrees>1</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position></Trackpoint>
</Track></Lap></Activity></Activities></TrainingCenterDatabase>"#;
        let track = parse_tcx(tcx.as_bytes()).unwrap();
        assert_eq!(track.title, "Bik&ing");
        assert_eq!(
            track.samples[0].time,
            Some(time::macros::datetime!(2024-01-01 00:00:00 UTC))
        );
    }

    #[test]
    fn test_parse_tcx_default_title() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity><Lap><Track>
  <Trackpoint><Position><LatitudeDegrees>1</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position></Trackpoint>
</Track></Lap></Activity></Activities></TrainingCenterDatabase>"#;
        assert_eq!(parse_tcx(tcx.as_bytes()).unwrap().title, "Untitled Ride");
    }

    /// Tests that a position with a garbled coordinate is kept, carrying `NaN`.
    #[test]
    fn test_parse_tcx_malformed_coordinate() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity Sport="Biking"><Lap><Track>
  <Trackpoint><Position><LatitudeDegrees>n/a</LatitudeDegrees><LongitudeDegrees>2</LongitudeDegrees></Position><AltitudeMeters>?</AltitudeMeters></Trackpoint>
</Track></Lap></Activity></Activities></TrainingCenterDatabase>"#;
        let track = parse_tcx(tcx.as_bytes()).unwrap();
        assert!(track.samples[0].lat.is_nan());
        assert_eq!(track.samples[0].lon, 2.0);
        assert_eq!(track.samples[0].elevation, None);
    }

    #[test]
    fn test_parse_tcx_broken_xml() {
        let tcx = r#"<TrainingCenterDatabase><Activities><Activity></Activities>"#;
        assert!(matches!(
            parse_tcx(tcx.as_bytes()),
            Err(ParseError::Malformed { .. })
        ));
    }
}
