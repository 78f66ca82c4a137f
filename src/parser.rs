use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Gpx2CsvError, Result};
use crate::gpx_types::*;

/// Parse a GPX XML string into GpxData.
pub fn parse_gpx(xml: &str) -> Result<GpxData> {
    let mut reader = Reader::from_str(xml);
    let mut data = GpxData::default();
    let mut open_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trk" => data.tracks.push(parse_track(&mut reader)?),
                b"gpx" => open_root = true,
                _ => {
                    // Waypoints, routes and metadata carry nothing we tabulate
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"gpx" => open_root = false,
            Ok(Event::Eof) if open_root => return Err(unexpected_eof(b"gpx")),
            Ok(Event::Eof) => break,
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(data)
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| Gpx2CsvError::XmlParse(e.into()))?;
        let key = attr.key.local_name();
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match key.as_ref() {
            b"lat" => lat = Some(parse_coordinate("lat", val)?),
            b"lon" => lon = Some(parse_coordinate("lon", val)?),
            _ => {}
        }
    }

    let lat = lat.ok_or(Gpx2CsvError::MissingAttribute {
        element: "trkpt",
        attribute: "lat",
    })?;
    let lon = lon.ok_or(Gpx2CsvError::MissingAttribute {
        element: "trkpt",
        attribute: "lon",
    })?;

    Ok((lat, lon))
}

fn parse_coordinate(attribute: &'static str, val: &str) -> Result<f64> {
    val.trim()
        .parse::<f64>()
        .map_err(|_| Gpx2CsvError::InvalidAttribute {
            element: "trkpt",
            attribute,
            value: val.to_string(),
        })
}

/// Parse a <trkpt> element and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(start: &BytesStart<'a>, reader: &mut Reader<&'a [u8]>) -> Result<GpxPoint> {
    let (lat, lon) = parse_lat_lon(start)?;
    let mut point = GpxPoint::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    point.ele = text.trim().parse::<f64>().ok();
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    point.time = Some(parse_time(&text)?);
                }
                b"extensions" => {
                    point.extensions = parse_extensions(&e, reader)?;
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&end_name)),
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(point)
}

/// Parse the children of a point's <extensions> element.
fn parse_extensions<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Vec<ExtensionElement>> {
    let end_name = start.name().0.to_vec();
    let mut elements = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => elements.push(parse_extension_element(&e, reader)?),
            Ok(Event::Empty(e)) => elements.push(empty_extension_element(&e)),
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&end_name)),
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(elements)
}

/// Parse an arbitrary extension element into a tree, keeping its text and
/// child elements.
fn parse_extension_element<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<ExtensionElement> {
    let mut element = empty_extension_element(start);
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => element.children.push(parse_extension_element(&e, reader)?),
            Ok(Event::Empty(e)) => element.children.push(empty_extension_element(&e)),
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&end_name)),
            Ok(event) => push_text(&mut text, &event),
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
        }
    }

    let text = text.trim();
    if !text.is_empty() {
        element.text = Some(text.to_string());
    }

    Ok(element)
}

/// Extension names keep their namespace prefix, e.g. `gpxtpx:hr`.
fn empty_extension_element(e: &BytesStart<'_>) -> ExtensionElement {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    ExtensionElement {
        name,
        text: None,
        children: Vec::new(),
    }
}

/// Parse a <trk> element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"trkseg" => {
                    let seg = parse_segment(reader)?;
                    if !seg.points.is_empty() {
                        track.segments.push(seg);
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => return Err(unexpected_eof(b"trk")),
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxSegment> {
    let mut segment = GpxSegment::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => segment.points.push(parse_point(&e, reader)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    let (lat, lon) = parse_lat_lon(&e)?;
                    segment.points.push(GpxPoint::new(lat, lon));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => return Err(unexpected_eof(b"trkseg")),
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// The document ended while `element` was still open.
fn unexpected_eof(element: &[u8]) -> Gpx2CsvError {
    Gpx2CsvError::UnexpectedEof {
        element: String::from_utf8_lossy(element).into_owned(),
    }
}

/// Read text content of an element as an owned String.
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(unexpected_eof(&end_name)),
            Ok(event) => push_text(&mut text, &event),
            Err(e) => return Err(Gpx2CsvError::XmlParse(e)),
        }
    }

    Ok(text)
}

/// Append the character content of a text-like event.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn push_text(text: &mut String, event: &Event<'_>) {
    match event {
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
        _ => {}
    }
}
