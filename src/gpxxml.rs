use crate::format::{attribute_f64, malformed, parse_time, push_reference, push_text, title_or_default};
use crate::{ParseError, ParsedTrack, RawSample};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Name,
    Elevation,
    Time,
}

/// Reads the first `<trk>` of a GPX document.
///
/// Every `<trkseg>` of that track is concatenated in document order. Any
/// further `<trk>` elements are skipped.
pub fn parse_gpx(input: &[u8]) -> Result<ParsedTrack, ParseError> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();

    let mut tracks_seen = 0usize;
    let mut in_first_trk = false;
    let mut depth = 0usize;
    let mut name: Option<String> = None;
    let mut samples = Vec::new();

    let mut current: Option<RawSample> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Err(e) => return Err(malformed(reader.buffer_position() as u64, e)),
            Ok(Event::Eof) => break,
            Ok(event) => event.into_owned(),
        };

        match event {
            Event::Start(ref e) => {
                if e.local_name().as_ref() == b"trk" && !in_first_trk {
                    tracks_seen += 1;
                    in_first_trk = tracks_seen == 1;
                    depth = 0;
                    buf.clear();
                    continue;
                }
                if !in_first_trk {
                    buf.clear();
                    continue;
                }

                depth += 1;
                match e.local_name().as_ref() {
                    b"name" if depth == 1 => field = Some(Field::Name),
                    b"trkpt" => current = Some(start_point(e)),
                    b"ele" if current.is_some() => field = Some(Field::Elevation),
                    b"time" if current.is_some() => field = Some(Field::Time),
                    _ => {}
                }
                text.clear();
            }

            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"trk" if !in_first_trk => tracks_seen += 1,
                b"trkpt" if in_first_trk => samples.push(start_point(e)),
                _ => {}
            },

            Event::End(ref e) => {
                if !in_first_trk {
                    buf.clear();
                    continue;
                }
                if e.local_name().as_ref() == b"trk" && depth == 0 {
                    in_first_trk = false;
                    buf.clear();
                    continue;
                }

                depth = depth.saturating_sub(1);
                match (e.local_name().as_ref(), field) {
                    (b"name", Some(Field::Name)) => name = Some(text.clone()),
                    (b"ele", Some(Field::Elevation)) => {
                        if let Some(point) = current.as_mut() {
                            point.elevation = text.trim().parse().ok();
                        }
                    }
                    (b"time", Some(Field::Time)) => {
                        if let Some(point) = current.as_mut() {
                            point.time = parse_time(&text);
                        }
                    }
                    (b"trkpt", _) => {
                        if let Some(point) = current.take() {
                            samples.push(point);
                        }
                    }
                    _ => {}
                }
                field = None;
            }

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

            Event::CData(ref e) => {
                if field.is_some()
                    && let Ok(chunk) = std::str::from_utf8(e)
                {
                    text.push_str(chunk);
                }
            }

            _ => {}
        }

        buf.clear();
    }

    if tracks_seen > 1 {
        debug!(ignored = tracks_seen - 1, "GPX file has extra tracks, only the first is read");
    }

    if samples.is_empty() {
        return Err(ParseError::NoTrackData);
    }

    debug!(points = samples.len(), "parsed GPX track");

    Ok(ParsedTrack {
        title: title_or_default(name.as_deref()),
        samples,
    })
}

fn start_point(e: &BytesStart) -> RawSample {
    RawSample::new(attribute_f64(e, b"lat"), attribute_f64(e, b"lon"))
}
