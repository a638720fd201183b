use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use super::{BLANK, RawPoint, TrackFormat, TrackMetadata, encode_time, fixed, non_blank, summary_lines};
use crate::error::DecodeError;
use crate::point::Point;
use crate::statistics::TripStatistics;
use crate::units::utc_ms_to_gpx_time;

pub(crate) const FOOTER: &str = " </trkseg>\n</trk>\n</gpx>\n";

const GARMIN_TPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";

/// Encode a point as a single `<trkpt>` element.
///
/// GPX 1.0 has a first-class `<speed>` element and keeps accuracy in the
/// `custom` namespace; GPX 1.1 moves both into the `gpxtpx` extension.
pub(crate) fn encode_point(format: TrackFormat, point: &Point) -> String {
    let mut xml = String::with_capacity(320);
    match point.position() {
        Some((lat, lon)) => {
            xml.push_str(&format!("<trkpt lat=\"{}\" lon=\"{}\">", fixed(lat), fixed(lon)));
        }
        None => xml.push_str("<trkpt lat=\" \" lon=\" \">"),
    }

    let ele = point.altitude_m.map(fixed);
    let time = encode_time(point.time_ms_utc);
    let speed = point.speed_mps.map(fixed);
    let sat = point.satellites_used_in_fix.map(|s| s.to_string());
    let accuracy = point.accuracy_m.map(fixed);

    push_element(&mut xml, "ele", ele.as_deref());
    push_element(&mut xml, "time", time.as_deref());
    if format == TrackFormat::Gpx11 {
        push_element(&mut xml, "sat", sat.as_deref());
        xml.push_str("<extensions>");
        push_element(&mut xml, "gpxtpx:speed", speed.as_deref());
        push_element(&mut xml, "gpxtpx:accuracy", accuracy.as_deref());
    } else {
        push_element(&mut xml, "speed", speed.as_deref());
        push_element(&mut xml, "sat", sat.as_deref());
        xml.push_str("<extensions>");
        push_element(&mut xml, "custom:accuracy", accuracy.as_deref());
    }
    xml.push_str("</extensions></trkpt>");
    xml
}

fn push_element(xml: &mut String, name: &str, value: Option<&str>) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    xml.push_str(value.unwrap_or(BLANK));
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

/// XML declaration, statistics comments, `<gpx>` root with metadata and the
/// opening of the single track segment.
pub(crate) fn render_header(format: TrackFormat, stats: &TripStatistics, meta: &TrackMetadata) -> String {
    let version = if format == TrackFormat::Gpx11 { "1.1" } else { "1.0" };
    let mut header = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    for line in summary_lines(Some(version), stats, meta) {
        header.push_str(&format!("<!-- {} -->\n", comment_safe(&line)));
    }

    let creator = escape(meta.creator.as_str());
    header.push_str(&format!("<gpx version=\"{version}\"\n"));
    header.push_str(&format!("     creator=\"{creator}\"\n"));
    if format == TrackFormat::Gpx11 {
        header.push_str("     xmlns=\"http://www.topografix.com/GPX/1/1\"\n");
        header.push_str(&format!("     xmlns:gpxtpx=\"{GARMIN_TPX_NS}\"\n"));
        header.push_str("     xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n");
        header.push_str(
            "     xsi:schemaLocation=\"http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd\n",
        );
        header.push_str(&format!(
            "                         {GARMIN_TPX_NS} http://www.garmin.com/xmlschemas/TrackPointExtensionv1.xsd\">\n"
        ));
        header.push_str("<metadata>\n");
        push_metadata(&mut header, "  ", stats, meta);
        header.push_str("</metadata>\n");
    } else {
        header.push_str("     xmlns=\"http://www.topografix.com/GPX/1/0\"\n");
        header.push_str(&format!("     xmlns:custom=\"{}\"\n", escape(meta.link.as_str())));
        header.push_str("     xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n");
        header.push_str(
            "     xsi:schemaLocation=\"http://www.topografix.com/GPX/1/0 http://www.topografix.com/GPX/1/0/gpx.xsd\">\n",
        );
        push_metadata(&mut header, "", stats, meta);
    }

    header.push_str(&format!(
        "<trk>\n <name>{}</name>\n <trkseg>\n",
        escape(meta.track_name.as_str())
    ));
    header
}

fn push_metadata(header: &mut String, indent: &str, stats: &TripStatistics, meta: &TrackMetadata) {
    if !meta.track_name.is_empty() {
        header.push_str(&format!("{indent}<name>{}</name>\n", escape(meta.track_name.as_str())));
    }
    if let Some(time) = meta.start_time_ms.and_then(utc_ms_to_gpx_time) {
        header.push_str(&format!("{indent}<time>{time}</time>\n"));
    }
    if let Some(activity) = meta.activity.as_deref().filter(|a| !a.is_empty()) {
        header.push_str(&format!("{indent}<keywords>{}</keywords>\n", escape(activity)));
    }
    if let Some(b) = stats.bounds() {
        header.push_str(&format!(
            "{indent}<bounds minlat=\"{}\" minlon=\"{}\" maxlat=\"{}\" maxlon=\"{}\" />\n",
            fixed(b.min_lat),
            fixed(b.min_lon),
            fixed(b.max_lat),
            fixed(b.max_lon)
        ));
    }
}

/// `--` is not allowed inside an XML comment.
fn comment_safe(text: &str) -> String {
    text.replace("--", "- -")
}

/// Collect every `<trkpt>` in document order. Works on temporary files
/// (one element per line, no root) as well as finished GPX 1.0/1.1 files.
pub(crate) fn raw_points(content: &str) -> Result<Vec<RawPoint>, DecodeError> {
    let mut reader = Reader::from_str(content);
    let mut points = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"trkpt" => {
                let mut raw = parse_lat_lon(&e)?;
                parse_children(&mut reader, &mut raw)?;
                points.push(raw);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"trkpt" => {
                points.push(parse_lat_lon(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(points)
}

/// Read lat/lon attributes from a point's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<RawPoint, DecodeError> {
    let mut raw = RawPoint::default();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(quick_xml::Error::from)?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match attr.key.local_name().as_ref() {
            b"lat" => raw.lat = non_blank(val),
            b"lon" => raw.lon = non_blank(val),
            _ => {}
        }
    }
    Ok(raw)
}

/// Read the children of a `<trkpt>` up to its end tag. Extension elements
/// are matched by local name so both `custom:` and `gpxtpx:` prefixes work.
fn parse_children<'a>(reader: &mut Reader<&'a [u8]>, raw: &mut RawPoint) -> Result<(), DecodeError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ele" => raw.ele = non_blank(&read_text_owned(reader, &e)?),
                b"time" => raw.time = non_blank(&read_text_owned(reader, &e)?),
                b"sat" => raw.sat = non_blank(&read_text_owned(reader, &e)?),
                b"speed" => raw.speed = non_blank(&read_text_owned(reader, &e)?),
                b"accuracy" => raw.accuracy = non_blank(&read_text_owned(reader, &e)?),
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"trkpt" => return Ok(()),
            Event::Eof => return Err(DecodeError::Truncated),
            _ => {}
        }
    }
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String, DecodeError> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Event::CData(e) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Event::GeneralRef(e) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Event::End(e) if e.name().0 == end_name.as_slice() => break,
            Event::Eof => return Err(DecodeError::Truncated),
            _ => {}
        }
    }

    Ok(text)
}
