use crate::gpxxml::parse_gpx;
use crate::tcxxml::parse_tcx;
use crate::{DEFAULT_TITLE, ParseError, ParsedTrack};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, BytesText};
use std::fmt;
use std::path::Path;
use time::format_description::well_known::Iso8601;
use time::{OffsetDateTime, PrimitiveDateTime};

/// The two supported XML dialects, picked once from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Tcx,
}

impl TrackFormat {
    /// Resolves a file name or bare extension (`"ride.GPX"`, `"tcx"`), case-insensitively.
    pub fn from_hint(hint: &str) -> Result<Self, ParseError> {
        let extension = hint.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        match extension.as_str() {
            "gpx" => Ok(TrackFormat::Gpx),
            "tcx" => Ok(TrackFormat::Tcx),
            _ => Err(ParseError::UnsupportedFormat(extension)),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        match path.extension() {
            Some(extension) => Self::from_hint(&extension.to_string_lossy()),
            None => Err(ParseError::UnsupportedFormat(String::new())),
        }
    }

    pub fn parse(self, input: &[u8]) -> Result<ParsedTrack, ParseError> {
        match self {
            TrackFormat::Gpx => parse_gpx(input),
            TrackFormat::Tcx => parse_tcx(input),
        }
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackFormat::Gpx => write!(f, "GPX"),
            TrackFormat::Tcx => write!(f, "TCX"),
        }
    }
}

/// Parses raw file bytes, choosing the dialect from `hint` (a file name or extension).
pub fn parse(input: &[u8], hint: &str) -> Result<ParsedTrack, ParseError> {
    TrackFormat::from_hint(hint)?.parse(input)
}

pub(crate) fn malformed(position: u64, error: quick_xml::Error) -> ParseError {
    ParseError::Malformed {
        position,
        message: error.to_string(),
    }
}

/// Unparsable timestamps are treated as missing. A timestamp without an offset is read as UTC.
pub(crate) fn parse_time(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    OffsetDateTime::parse(text, &Iso8601::DEFAULT)
        .or_else(|_| PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).map(|t| t.assume_utc()))
        .ok()
}

pub(crate) fn push_text(text: &mut String, e: &BytesText) {
    text.push_str(&e.decode().unwrap_or_default());
}

/// Appends what an entity or character reference stands for. Unknown entities are dropped.
pub(crate) fn push_reference(text: &mut String, e: &BytesRef) {
    if let Ok(Some(ch)) = e.resolve_char_ref() {
        text.push(ch);
    } else if let Ok(name) = e.decode()
        && let Some(value) = resolve_predefined_entity(&name)
    {
        text.push_str(value);
    }
}

/// Unescaped value of the attribute named `key`, matched on its local name.
pub(crate) fn attribute(element: &BytesStart, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

/// A missing or unparsable coordinate attribute reads as `NaN`.
pub(crate) fn attribute_f64(element: &BytesStart, key: &[u8]) -> f64 {
    attribute(element, key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(f64::NAN)
}

pub(crate) fn title_or_default(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => DEFAULT_TITLE.to_string(),
    }
}
